//! Row structs that map 1-to-1 onto database tables.
//!
//! These are *persistence* models — they carry no domain behaviour. Domain
//! types (with richer enums and constructors) live in the `engine` crate;
//! repository functions translate between the two at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// workflows
// ---------------------------------------------------------------------------

/// A persisted workflow row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub version: i32,
    /// Full JSON `{nodes, edges}` definition.
    pub definition: serde_json::Value,
    /// `DRAFT` | `ACTIVE` | `ARCHIVED`.
    pub status: String,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// workflow_runs
// ---------------------------------------------------------------------------

/// A persisted workflow run row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowRunRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// `PENDING` | `RUNNING` | `COMPLETED` | `FAILED` | `CANCELLED`.
    pub status: String,
    pub trigger_data: serde_json::Value,
    pub result_data: Option<serde_json::Value>,
    pub error: Option<serde_json::Value>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub started_by: Option<String>,
    pub priority: i16,
}

// ---------------------------------------------------------------------------
// node_executions
// ---------------------------------------------------------------------------

/// A persisted node execution attempt row.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeExecutionRow {
    pub id: Uuid,
    pub workflow_run_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    /// `PENDING` | `RUNNING` | `COMPLETED` | `FAILED` | `SKIPPED` | `CANCELLED`.
    pub status: String,
    pub input_data: Option<serde_json::Value>,
    pub output_data: Option<serde_json::Value>,
    pub error: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub execution_order: i32,
    pub retry_count: i32,
}

// ---------------------------------------------------------------------------
// workflow_states (1:1 with a run)
// ---------------------------------------------------------------------------

/// The durable mirror of a run's `WorkflowState`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkflowStateRow {
    pub run_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub variables: serde_json::Value,
    pub node_outputs: serde_json::Value,
    pub execution_path: serde_json::Value,
    pub trigger_data: serde_json::Value,
}

// ---------------------------------------------------------------------------
// node_states — keyed by (run_id, node_id, state_type)
// ---------------------------------------------------------------------------

/// A single audit entry in the per-node state sink.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct NodeStateRow {
    pub id: Uuid,
    pub run_id: Uuid,
    pub node_id: String,
    /// `input` | `output` | `intermediate` | `config`.
    pub state_type: String,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// secrets
// ---------------------------------------------------------------------------

/// A persisted secret row, scoped to a single workflow.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SecretRow {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub key: String,
    /// AES-256 encrypted value (base64-encoded ciphertext).
    pub encrypted_value: String,
}

// ---------------------------------------------------------------------------
// global_variables — backing store for the state store's `global` scope
// ---------------------------------------------------------------------------

/// A durable global variable row, with an optional expiry.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GlobalVariableRow {
    pub name: String,
    pub value: serde_json::Value,
    pub expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// job_queue — durable fallback tier for the in-process task broker
// ---------------------------------------------------------------------------

/// A persisted job row. Not wired into `queue`'s in-process broker; kept
/// available for a deployment that needs a durable, cross-process queue
/// (see `db::repository::jobs`).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct JobRow {
    pub id: Uuid,
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    /// `pending` | `processing` | `completed` | `dead_lettered`.
    pub status: String,
    pub attempts: i32,
    pub max_attempts: i32,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
