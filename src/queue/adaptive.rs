use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::queue::task_queue::{FailureRecord, QueueStats, TaskQueue};

/// Error rate below which the pool is considered healthy enough to grow.
/// Deliberately separate from the configured shrink threshold.
const SCALE_UP_RATE: f64 = 0.01;

const SCALE_DOWN_FACTOR: f64 = 0.8;
const SCALE_UP_FACTOR: f64 = 1.2;

/// Observable tuning state of an adaptive queue
#[derive(Debug, Clone, PartialEq)]
pub struct TuningState {
    /// Worker count the next run will use
    pub current_workers: usize,
    /// Error rate of the most recent run
    pub error_rate: f64,
    /// How many times the worker count has been adjusted
    pub adjustments_count: usize,
    /// When the worker count last changed
    pub last_adjustment: Option<DateTime<Utc>>,
}

/// Task queue that retunes its worker count between runs
///
/// Adjustment happens only at run boundaries, never mid-run. After each batch
/// the error rate decides the next batch's pool size: above the configured
/// threshold the pool shrinks by 20% (floored), under [`SCALE_UP_RATE`] it
/// grows by 20% (ceiled). Both directions clamp to the configured bounds.
pub struct AdaptiveTaskQueue {
    capacity: usize,
    idle_timeout: Duration,
    error_threshold: f64,
    min_workers: usize,
    max_workers: usize,
    tuning: TuningState,
    last_failures: Vec<FailureRecord>,
}

impl AdaptiveTaskQueue {
    /// Creates an adaptive queue
    ///
    /// # Arguments
    ///
    /// * `initial_workers` - Pool size for the first run (clamped to bounds)
    /// * `min_workers` / `max_workers` - Hard bounds on the pool size
    /// * `capacity` - Bounded channel capacity per run
    /// * `idle_timeout` - Worker idle timeout per run
    /// * `error_threshold` - Error rate above which the pool shrinks
    pub fn new(
        initial_workers: usize,
        min_workers: usize,
        max_workers: usize,
        capacity: usize,
        idle_timeout: Duration,
        error_threshold: f64,
    ) -> Self {
        let min_workers = min_workers.max(1);
        let max_workers = max_workers.max(min_workers);
        Self {
            capacity,
            idle_timeout,
            error_threshold,
            min_workers,
            max_workers,
            tuning: TuningState {
                current_workers: initial_workers.clamp(min_workers, max_workers),
                error_rate: 0.0,
                adjustments_count: 0,
                last_adjustment: None,
            },
            last_failures: Vec::new(),
        }
    }

    /// Builds an adaptive queue from queue configuration
    pub fn from_config(config: &crate::config::QueueConfig) -> Self {
        Self::new(
            config.initial_workers,
            config.min_workers,
            config.max_workers,
            config.queue_capacity,
            Duration::from_millis(config.idle_timeout_ms),
            config.error_threshold,
        )
    }

    /// Current tuning state
    pub fn tuning(&self) -> &TuningState {
        &self.tuning
    }

    /// Failures recorded during the most recent run, oldest first
    pub fn last_failures(&self) -> &[FailureRecord] {
        &self.last_failures
    }

    /// Runs one batch at the current pool size, then retunes for the next
    pub async fn run<T, F, Fut>(&mut self, tasks: Vec<T>, worker_fn: F) -> QueueStats
    where
        T: Send + Debug + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let queue = TaskQueue::new(self.tuning.current_workers, self.capacity, self.idle_timeout);
        let stats = queue.run(tasks, worker_fn).await;
        self.last_failures = queue.recent_failures();
        self.adjust(&stats);
        stats
    }

    /// Applies the between-runs tuning rule to a finished run's counters
    pub fn adjust(&mut self, stats: &QueueStats) {
        let rate = stats.error_rate();
        self.tuning.error_rate = rate;

        let current = self.tuning.current_workers;
        let next = if rate > self.error_threshold {
            ((current as f64 * SCALE_DOWN_FACTOR).floor() as usize)
                .clamp(self.min_workers, self.max_workers)
        } else if rate < SCALE_UP_RATE && current < self.max_workers {
            ((current as f64 * SCALE_UP_FACTOR).ceil() as usize)
                .clamp(self.min_workers, self.max_workers)
        } else {
            current
        };

        if next != current {
            info!(
                from = current,
                to = next,
                error_rate = rate,
                "adjusting worker count"
            );
            self.tuning.current_workers = next;
            self.tuning.adjustments_count += 1;
            self.tuning.last_adjustment = Some(Utc::now());
        }
    }
}
