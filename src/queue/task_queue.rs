use std::collections::VecDeque;
use std::fmt::Debug;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, warn};

/// How many recent failures the queue remembers per run
const FAILURE_HISTORY_LIMIT: usize = 100;

/// How much of a failed task's debug representation is kept
const TASK_REPR_LIMIT: usize = 100;

/// Counters describing one completed queue run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// Tasks handed to the queue
    pub total: usize,
    /// Tasks whose worker invocation returned Ok
    pub completed: usize,
    /// Tasks whose worker invocation returned Err
    pub failed: usize,
    /// Workers still alive (0 once a run has drained)
    pub active_workers: usize,
}

impl QueueStats {
    /// Fraction of finished tasks that failed, 0.0 when nothing finished yet
    pub fn error_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            return 0.0;
        }
        self.failed as f64 / finished as f64
    }
}

/// One recorded task failure
#[derive(Debug, Clone)]
pub struct FailureRecord {
    /// Truncated debug representation of the failed task
    pub task: String,
    /// Worker error message
    pub error: String,
    /// Index of the worker that ran the task
    pub worker_id: usize,
}

struct QueueState {
    stats: QueueStats,
    failures: VecDeque<FailureRecord>,
}

/// Bounded producer/consumer task queue
///
/// Tasks flow through a bounded channel so a fast producer cannot outrun slow
/// workers; enqueueing blocks once `capacity` tasks are in flight. Each run
/// spawns a fresh worker set, feeds it the batch, and drains completely before
/// returning. A failing task never aborts the run: the error is counted,
/// recorded, and the worker moves on.
pub struct TaskQueue {
    workers: usize,
    capacity: usize,
    idle_timeout: Duration,
    state: Arc<Mutex<QueueState>>,
}

impl TaskQueue {
    /// Creates a queue with the given worker count, channel capacity, and
    /// worker idle timeout
    pub fn new(workers: usize, capacity: usize, idle_timeout: Duration) -> Self {
        Self {
            workers: workers.max(1),
            capacity: capacity.max(1),
            idle_timeout,
            state: Arc::new(Mutex::new(QueueState {
                stats: QueueStats::default(),
                failures: VecDeque::new(),
            })),
        }
    }

    /// Number of workers a run will spawn
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Snapshot of the current run counters
    pub fn stats(&self) -> QueueStats {
        self.state.lock().map(|s| s.stats.clone()).unwrap_or_default()
    }

    /// The most recent failures, oldest first (bounded history)
    pub fn recent_failures(&self) -> Vec<FailureRecord> {
        self.state
            .lock()
            .map(|s| s.failures.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Runs a batch of tasks to completion
    ///
    /// The producer side closes the channel once every task has been handed
    /// over, which is what tells idle workers to exit. The idle timeout is a
    /// backstop for workers waiting on a channel that has stalled.
    ///
    /// # Arguments
    ///
    /// * `tasks` - The batch to process
    /// * `worker_fn` - Invoked once per task; an `Err` marks that task failed
    ///
    /// # Returns
    ///
    /// Final counters for the batch. This method never fails; task errors are
    /// absorbed into `QueueStats::failed`.
    pub async fn run<T, F, Fut>(&self, tasks: Vec<T>, worker_fn: F) -> QueueStats
    where
        T: Send + Debug + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let total = tasks.len();
        {
            let mut state = match self.state.lock() {
                Ok(s) => s,
                Err(poisoned) => poisoned.into_inner(),
            };
            state.stats = QueueStats {
                total,
                completed: 0,
                failed: 0,
                active_workers: 0,
            };
            state.failures.clear();
        }

        if total == 0 {
            return self.stats();
        }

        let (tx, rx) = mpsc::channel::<T>(self.capacity);
        let rx = Arc::new(tokio::sync::Mutex::new(rx));
        let worker_fn = Arc::new(worker_fn);

        // Producer: blocks on send once the channel is full, and closes the
        // channel by dropping the sender when the batch is fully enqueued.
        let producer = tokio::spawn(async move {
            for task in tasks {
                if tx.send(task).await.is_err() {
                    break;
                }
            }
        });

        let mut handles = Vec::with_capacity(self.workers);
        for worker_id in 0..self.workers {
            let rx = Arc::clone(&rx);
            let worker_fn = Arc::clone(&worker_fn);
            let state = Arc::clone(&self.state);
            let idle_timeout = self.idle_timeout;

            handles.push(tokio::spawn(async move {
                if let Ok(mut s) = state.lock() {
                    s.stats.active_workers += 1;
                }
                debug!(worker_id, "worker started");

                loop {
                    // Hold the receiver lock only while waiting for a task so
                    // other workers can pick up work while this one runs.
                    let next = {
                        let mut rx = rx.lock().await;
                        timeout(idle_timeout, rx.recv()).await
                    };

                    let task = match next {
                        Ok(Some(task)) => task,
                        Ok(None) => {
                            debug!(worker_id, "queue drained, worker exiting");
                            break;
                        }
                        Err(_) => {
                            debug!(worker_id, "idle timeout, worker exiting");
                            break;
                        }
                    };

                    let repr = truncate_repr(&task);
                    match worker_fn(task).await {
                        Ok(()) => {
                            if let Ok(mut s) = state.lock() {
                                s.stats.completed += 1;
                            }
                        }
                        Err(e) => {
                            warn!(worker_id, task = %repr, error = %e, "task failed");
                            if let Ok(mut s) = state.lock() {
                                s.stats.failed += 1;
                                if s.failures.len() == FAILURE_HISTORY_LIMIT {
                                    s.failures.pop_front();
                                }
                                s.failures.push_back(FailureRecord {
                                    task: repr,
                                    error: e.to_string(),
                                    worker_id,
                                });
                            }
                        }
                    }
                }

                if let Ok(mut s) = state.lock() {
                    s.stats.active_workers = s.stats.active_workers.saturating_sub(1);
                }
            }));
        }

        let _ = producer.await;
        for handle in handles {
            let _ = handle.await;
        }

        self.stats()
    }
}

fn truncate_repr<T: Debug>(task: &T) -> String {
    let mut repr = format!("{:?}", task);
    if repr.len() > TASK_REPR_LIMIT {
        // Back off to a char boundary so multi-byte text cannot split
        let mut end = TASK_REPR_LIMIT;
        while !repr.is_char_boundary(end) {
            end -= 1;
        }
        repr.truncate(end);
    }
    repr
}
