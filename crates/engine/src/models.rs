//! Core domain models for the workflow engine.
//!
//! These types are the source of truth for what a workflow and a run look
//! like in memory. `WorkflowDefinition` round-trips through the JSONB
//! `definition` column of the `workflows` table; `Workflow` itself carries
//! the lifecycle metadata that lives alongside it.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// WorkflowStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a saved workflow.
///
/// Only `Active` workflows may begin a new run; `Archived` is terminal for
/// new runs but in-flight runs continue to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WorkflowStatus {
    Draft,
    Active,
    Archived,
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "DRAFT"),
            Self::Active => write!(f, "ACTIVE"),
            Self::Archived => write!(f, "ARCHIVED"),
        }
    }
}

impl std::str::FromStr for WorkflowStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(Self::Draft),
            "ACTIVE" => Ok(Self::Active),
            "ARCHIVED" => Ok(Self::Archived),
            other => Err(format!("unknown workflow status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeDefinition / Edge / WorkflowDefinition
// ---------------------------------------------------------------------------

/// A single step in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Maps to a registered `ExecutableNode` implementation.
    #[serde(rename = "type")]
    pub node_type: String,
    /// Arbitrary configuration passed to the node at execution time, schema
    /// per `node_type`.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Layout hint; ignored by the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<serde_json::Value>,
}

/// Directed edge from one node to another.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    /// Expression evaluated against run state to decide whether this edge is
    /// active. Absent means "always active"; present-but-empty is rejected
    /// by the validator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// A workflow's graph: nodes plus the edges connecting them.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkflowDefinition {
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A saved, versioned workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Bumped every time `definition` is replaced.
    pub version: i32,
    pub definition: WorkflowDefinition,
    pub status: WorkflowStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor for a brand-new `DRAFT` workflow.
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        definition: WorkflowDefinition,
        created_by: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description,
            version: 1,
            definition,
            status: WorkflowStatus::Draft,
            created_by,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// RunStatus / WorkflowRun
// ---------------------------------------------------------------------------

/// Lifecycle status of a single execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    /// `true` once the run has reached a terminal status.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown run status: {other}")),
        }
    }
}

/// A structured run-level error summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
}

/// One execution attempt of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub trigger_data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RunError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_by: Option<String>,
    /// Clamped to `1..=10` at construction, default `5`.
    pub priority: u8,
}

impl WorkflowRun {
    /// Create a fresh `PENDING` run for `workflow_id`.
    pub fn new(workflow_id: Uuid, trigger_data: serde_json::Value, started_by: Option<String>) -> Self {
        Self::with_priority(workflow_id, trigger_data, started_by, 5)
    }

    /// Like [`Self::new`] but with an explicit priority, clamped to `1..=10`.
    pub fn with_priority(
        workflow_id: Uuid,
        trigger_data: serde_json::Value,
        started_by: Option<String>,
        priority: u8,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: RunStatus::Pending,
            trigger_data,
            result_data: None,
            error: None,
            started_at: None,
            completed_at: None,
            started_by,
            priority: priority.clamp(1, 10),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeStatus / NodeExecution
// ---------------------------------------------------------------------------

/// Lifecycle status of a single node execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
    Cancelled,
}

impl std::fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::Running => write!(f, "RUNNING"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Skipped => write!(f, "SKIPPED"),
            Self::Cancelled => write!(f, "CANCELLED"),
        }
    }
}

impl std::str::FromStr for NodeStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "COMPLETED" => Ok(Self::Completed),
            "FAILED" => Ok(Self::Failed),
            "SKIPPED" => Ok(Self::Skipped),
            "CANCELLED" => Ok(Self::Cancelled),
            other => Err(format!("unknown node status: {other}")),
        }
    }
}

/// One attempt at running a single node within a run. Retries append new
/// rows; terminal rows are never mutated in place.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeExecution {
    pub id: Uuid,
    pub workflow_run_id: Uuid,
    pub node_id: String,
    pub node_type: String,
    pub status: NodeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Position in the run's topological schedule (0-indexed).
    pub execution_order: i32,
    pub retry_count: i32,
}

// ---------------------------------------------------------------------------
// Progress summary (used to build the run-status API response)
// ---------------------------------------------------------------------------

/// Lightweight progress snapshot over a run's node executions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunProgress {
    pub completed_nodes: usize,
    pub total_nodes: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_node: Option<String>,
}

impl RunProgress {
    pub fn from_executions(total_nodes: usize, executions: &[NodeExecution]) -> Self {
        let completed_nodes = executions
            .iter()
            .filter(|e| e.status == NodeStatus::Completed)
            .count();
        let current_node = executions
            .iter()
            .find(|e| e.status == NodeStatus::Running)
            .map(|e| e.node_id.clone());

        Self {
            completed_nodes,
            total_nodes,
            current_node,
        }
    }
}

/// Parameters threaded through `HashMap`-shaped workflow variables; kept as
/// a type alias so call sites read intentfully rather than passing a bare
/// `serde_json::Value` map everywhere.
pub type Variables = HashMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Row -> domain conversions
// ---------------------------------------------------------------------------
//
// `db::models` row structs carry no business logic (by design — see that
// crate's module doc); the engine translates at the boundary.

impl TryFrom<db::models::WorkflowRow> for Workflow {
    type Error = String;

    fn try_from(row: db::models::WorkflowRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            name: row.name,
            description: row.description,
            version: row.version,
            definition: serde_json::from_value(row.definition).map_err(|e| e.to_string())?,
            status: row.status.parse()?,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

impl TryFrom<db::models::WorkflowRunRow> for WorkflowRun {
    type Error = String;

    fn try_from(row: db::models::WorkflowRunRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            workflow_id: row.workflow_id,
            status: row.status.parse()?,
            trigger_data: row.trigger_data,
            result_data: row.result_data,
            error: row
                .error
                .map(serde_json::from_value)
                .transpose()
                .map_err(|e| e.to_string())?,
            started_at: row.started_at,
            completed_at: row.completed_at,
            started_by: row.started_by,
            priority: row.priority as u8,
        })
    }
}

impl TryFrom<db::models::NodeExecutionRow> for NodeExecution {
    type Error = String;

    fn try_from(row: db::models::NodeExecutionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            workflow_run_id: row.workflow_run_id,
            node_id: row.node_id,
            node_type: row.node_type,
            status: row.status.parse()?,
            input_data: row.input_data,
            output_data: row.output_data,
            error: row.error,
            started_at: row.started_at,
            completed_at: row.completed_at,
            execution_order: row.execution_order,
            retry_count: row.retry_count,
        })
    }
}
