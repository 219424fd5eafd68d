//! Node-level error type.

use thiserror::Error;

/// Errors returned by a node's `execute` method.
///
/// The engine uses the variant to decide retry behaviour:
/// - `Transient` — the node is retried with back-off, up to its retry policy.
/// - `Permanent` — the run is failed immediately, no retry.
#[derive(Debug, Error, Clone)]
pub enum NodeError {
    /// Recoverable failure; the engine should retry the node.
    #[error("transient node error: {0}")]
    Transient(String),

    /// Unrecoverable failure; no retry should be attempted.
    #[error("permanent node error: {0}")]
    Permanent(String),
}

impl NodeError {
    /// `true` if this error is retryable.
    pub fn is_transient(&self) -> bool {
        matches!(self, NodeError::Transient(_))
    }
}
