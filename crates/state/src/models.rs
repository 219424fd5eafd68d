//! In-memory shapes for the two-tier state store.
//!
//! These mirror `db::models::WorkflowStateRow`/`NodeStateRow` but carry
//! deserialized, engine-friendly fields instead of raw `serde_json::Value`
//! columns — the store translates between the two at the persistence
//! boundary, the same split `engine::models` draws between domain types and
//! `db::models` row structs.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The three scopes a `StateKey` can address, grounded on
/// `original_source/state_manager.py`'s `StateScope` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateScope {
    Workflow,
    Node,
    Global,
}

impl StateScope {
    fn as_str(self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::Node => "node",
            Self::Global => "global",
        }
    }
}

/// A structured key into either tier of the state store.
///
/// Serializes to the same colon-joined shape
/// (`scope:run_id[:node_id][:sub_key]`) `original_source/state_manager.py`'s
/// `StateKey.__str__` uses, so cache keys and durable natural keys agree.
#[derive(Debug, Clone)]
pub struct StateKey {
    pub scope: StateScope,
    pub run_id: Uuid,
    pub node_id: Option<String>,
    pub sub_key: Option<String>,
}

impl StateKey {
    pub fn workflow(run_id: Uuid) -> Self {
        Self {
            scope: StateScope::Workflow,
            run_id,
            node_id: None,
            sub_key: None,
        }
    }

    pub fn node(run_id: Uuid, node_id: impl Into<String>, sub_key: impl Into<String>) -> Self {
        Self {
            scope: StateScope::Node,
            run_id,
            node_id: Some(node_id.into()),
            sub_key: Some(sub_key.into()),
        }
    }

    /// Global variables aren't run-scoped; `run_id` is a nil placeholder so
    /// the cache key shape stays uniform across scopes.
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            scope: StateScope::Global,
            run_id: Uuid::nil(),
            node_id: None,
            sub_key: Some(name.into()),
        }
    }

    /// The substring every key for a given run shares — used by `CleanupRun`
    /// to find and evict every cache entry for that run.
    ///
    /// Node-scoped keys (`node:{run_id}:{node_id}:{sub_key}`) have a
    /// trailing colon after `run_id`, but the workflow-scope key
    /// (`workflow:{run_id}`) does not — `node_id`/`sub_key` are `None` for
    /// that scope, so `Display` stops right after `run_id`. A prefix
    /// requiring a trailing colon would therefore never match the
    /// workflow-scope entry, leaking one `WorkflowState` cache entry per
    /// completed run. Matching on `:{run_id}` alone (leading colon, no
    /// trailing one) catches both shapes.
    pub fn run_prefix(run_id: Uuid) -> String {
        format!(":{run_id}")
    }
}

impl std::fmt::Display for StateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.scope.as_str(), self.run_id)?;
        if let Some(node_id) = &self.node_id {
            write!(f, ":{node_id}")?;
        }
        if let Some(sub_key) = &self.sub_key {
            write!(f, ":{sub_key}")?;
        }
        Ok(())
    }
}

/// One entry in a run's append-only `executionPath`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionStep {
    pub node_id: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The run-scoped `WorkflowState` held across both tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowStateView {
    pub status: String,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub node_outputs: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub execution_path: Vec<ExecutionStep>,
    #[serde(default)]
    pub trigger_data: serde_json::Value,
}

impl WorkflowStateView {
    pub fn new(started_at: DateTime<Utc>, trigger_data: serde_json::Value) -> Self {
        Self {
            status: "running".to_string(),
            started_at,
            updated_at: None,
            variables: HashMap::new(),
            node_outputs: HashMap::new(),
            execution_path: Vec::new(),
            trigger_data,
        }
    }

    /// Build the canonical node input envelope (`{workflow, nodes, trigger}`)
    /// handed to every executor, per spec.md §4.2's `GetNodeInput`.
    pub fn node_input_envelope(&self, run_id: Uuid) -> serde_json::Value {
        serde_json::json!({
            "workflow": {
                "variables": self.variables,
                "run_id": run_id,
                "status": self.status,
            },
            "nodes": self.node_outputs,
            "trigger": self.trigger_data,
        })
    }
}
