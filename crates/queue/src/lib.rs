//! Priority task queue and worker pool (spec.md §4.5 / C5).
//!
//! Grounded on `original_source/worker_manager.py`'s Celery-backed
//! `WorkerManager`, reimplemented as an in-process, broker-neutral
//! priority queue: five statically-weighted named queues, a
//! task-name → handler registry, and a worker pool that drains queues in
//! weight order, then by per-task priority.

mod broker;
mod error;
mod models;
mod queue;
mod registry;

pub use broker::{parse_queue, TaskQueue};
pub use error::QueueError;
pub use models::{
    HealthReport, QueueName, QueueStats, QueuedTask, SubmitTaskParams, TaskPriority, TaskRecord,
    TaskRetryPolicy, TaskStatus, WorkerStats,
};
pub use registry::{BoxFuture, TaskHandler, TaskOutcome, TaskRegistry};
