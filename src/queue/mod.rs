//! Bounded concurrent task queue with adaptive worker-count control
//!
//! The queue owns nothing about crawling itself. It takes a batch of tasks,
//! fans them out over a fixed set of workers through a bounded channel, and
//! reports how the batch went. [`AdaptiveTaskQueue`] layers a between-runs
//! feedback loop on top: batches with a high failure rate shrink the worker
//! pool for the next batch, quiet batches grow it.

mod adaptive;
mod task_queue;

pub use adaptive::{AdaptiveTaskQueue, TuningState};
pub use task_queue::{FailureRecord, QueueStats, TaskQueue};
