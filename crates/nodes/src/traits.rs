//! The `ExecutableNode` trait — the contract every node must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::retry::RetryPolicy;
use crate::NodeError;

/// Identity context passed to every node during execution.
///
/// Defined here (in the nodes crate) so both the engine and individual node
/// implementations can import it without a circular dependency. Unlike the
/// data envelope (below), this never changes across nodes within a run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// ID of the parent workflow.
    pub workflow_id: uuid::Uuid,
    /// ID of the current workflow run.
    pub run_id: uuid::Uuid,
    /// Decrypted secrets scoped to this workflow.
    pub secrets: std::collections::HashMap<String, String>,
}

/// The core node trait.
///
/// All built-in nodes and plugin-resolved executors must implement this.
/// `envelope` is the state envelope produced by `state::StateStore::get_node_input`
/// (`{ workflow, nodes, trigger }`); `config` is the node's own `definition.config`.
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Execute the node and return its JSON output, or a classified failure.
    async fn execute(
        &self,
        envelope: Value,
        config: &Value,
        ctx: &ExecutionContext,
    ) -> Result<Value, NodeError>;

    /// Retry tuning for this node type's `Transient` failures.
    ///
    /// Nodes that never fail transiently, or that are happy with the
    /// engine's default, can leave this unimplemented.
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::default()
    }
}
