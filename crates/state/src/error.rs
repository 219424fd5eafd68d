//! State store error type.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StateError {
    /// The durable tier (via `db`) failed.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    /// `GetWorkflowState` / `GetNodeInput` called before `InitWorkflowState`.
    #[error("workflow state not initialized for run {0}")]
    NotInitialized(Uuid),

    /// A cached or durable value failed to (de)serialize into the expected shape.
    #[error("state serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
