//! Built-in executors for node types the engine's own routing logic
//! depends on, as opposed to business-logic plugins (`DatabaseWrite`,
//! `APICall`, `ERPExport`, ...) that are genuinely external collaborators
//! resolved by name (spec.md §1).
//!
//! `Conditional` is the one type in that position: the engine's
//! `edge_pruned` routing (see `engine::engine`) decides which outgoing
//! edges fire, consulting the node's `active_edges` output if present and
//! otherwise falling back to each edge's own `condition` string. A
//! `Conditional` node therefore doesn't need bespoke business logic to
//! participate in that routing — it only needs to complete successfully so
//! the engine can evaluate its outgoing edges. `ConditionalNode` is that
//! default: a no-op that always succeeds with an empty output, leaving
//! routing entirely to the edge-level fallback.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::{traits::ExecutionContext, ExecutableNode, NodeError};

/// Default executor registered under `"Conditional"`. Always succeeds with
/// `{}` — it names no `active_edges`, so the engine routes purely on each
/// outgoing edge's own `condition` string.
#[derive(Debug, Default)]
pub struct ConditionalNode;

#[async_trait]
impl ExecutableNode for ConditionalNode {
    async fn execute(&self, _envelope: Value, _config: &Value, _ctx: &ExecutionContext) -> Result<Value, NodeError> {
        Ok(json!({}))
    }
}
