//! Engine-level error types.
//!
//! This is the public error taxonomy (§7 of the design): `ValidationFailed`,
//! `NotFound`, `InvalidState`, `NodeFailed` (covers both `Transient`-exhausted
//! and `Permanent` node failures), `Timeout`, `Cancelled`, `Internal`. The
//! `api` crate maps each variant to an HTTP status via [`EngineError::status_hint`].

use thiserror::Error;

/// Errors produced by the workflow engine (validation + execution).
#[derive(Debug, Error)]
pub enum EngineError {
    /// A workflow definition failed validation; carries the ordered error
    /// messages from the [`ValidationResult`](crate::validator::ValidationResult).
    #[error("workflow definition is invalid: {0:?}")]
    ValidationFailed(Vec<String>),

    /// A referenced entity (workflow, run, node) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not legal in the entity's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A node failed and the run is being aborted (fail-fast).
    ///
    /// `retries_exhausted` distinguishes a `Permanent` failure from a
    /// `Transient` one whose retry budget ran out — both fail the run the
    /// same way, but the distinction is useful for diagnostics.
    #[error("node '{node_id}' failed: {message}")]
    NodeFailed {
        node_id: String,
        message: String,
        retries_exhausted: bool,
    },

    /// A node or run exceeded its deadline.
    #[error("deadline exceeded")]
    Timeout,

    /// The run was cooperatively cancelled.
    #[error("run cancelled")]
    Cancelled,

    /// Persistence error from the `db` crate, or any other infrastructure
    /// failure not attributable to the workflow itself.
    #[error("internal error: {0}")]
    Internal(String),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(#[from] db::DbError),

    /// Error from the two-tier state store.
    #[error("state error: {0}")]
    State(#[from] state::StateError),
}

impl EngineError {
    /// A coarse classification used by the `api` crate to pick an HTTP status.
    pub fn status_hint(&self) -> &'static str {
        match self {
            EngineError::ValidationFailed(_) => "bad_request",
            EngineError::NotFound(_) => "not_found",
            EngineError::InvalidState(_) => "conflict",
            EngineError::NodeFailed { .. } => "unprocessable",
            EngineError::Timeout => "unprocessable",
            EngineError::Cancelled => "unprocessable",
            EngineError::Internal(_) | EngineError::Database(_) | EngineError::State(_) => "internal",
        }
    }
}
