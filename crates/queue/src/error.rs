//! Task queue error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("unknown task name '{0}' — no handler registered")]
    UnknownTask(String),

    #[error("unknown queue '{0}'")]
    UnknownQueue(String),

    #[error("task '{0}' not found")]
    TaskNotFound(uuid::Uuid),

    #[error("worker manager is not running")]
    NotRunning,
}
