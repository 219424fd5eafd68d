//! `/executions` handlers — workflow run lifecycle (C7 over C4), grounded
//! on `original_source/backend/src/api/routers/execution_router.py`'s
//! endpoint set: start, list, status, stop, retry, state, metrics, batch.

use std::collections::HashMap;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use db::repository::{node_executions as node_repo, workflow_runs as run_repo};
use engine::{EngineError, NodeExecution, NodeStatus, RunStatus, RunStatusView, WorkflowRun};
use state::models::ExecutionStep;

use crate::auth::Principal;
use crate::error::{internal, ApiError};
use crate::AppState;

fn default_priority() -> u8 {
    5
}

#[derive(Deserialize)]
pub struct ExecuteWorkflowRequest {
    pub workflow_id: Uuid,
    #[serde(default)]
    pub trigger_data: Value,
    #[serde(default = "default_priority")]
    pub priority: u8,
}

pub async fn start(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<ExecuteWorkflowRequest>,
) -> Result<(StatusCode, Json<WorkflowRun>), ApiError> {
    let run = state
        .engine
        .execute_workflow(payload.workflow_id, payload.trigger_data, Some(principal.0), payload.priority, None)
        .await?;
    Ok((StatusCode::CREATED, Json(run)))
}

#[derive(Deserialize)]
pub struct ListExecutionsQuery {
    pub workflow_id: Option<Uuid>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListExecutionsQuery>,
) -> Result<Json<Vec<WorkflowRun>>, ApiError> {
    let rows = run_repo::list_all(
        &state.pool,
        query.workflow_id,
        query.status.as_deref(),
        query.limit.unwrap_or(100).clamp(1, 500),
        query.offset.unwrap_or(0).max(0),
    )
    .await?;

    let runs = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<_>, String>>()
        .map_err(internal)?;
    Ok(Json(runs))
}

#[derive(Deserialize, Default)]
pub struct GetExecutionQuery {
    #[serde(default)]
    pub include_nodes: bool,
}

pub async fn get(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Query(query): Query<GetExecutionQuery>,
) -> Result<Json<RunStatusView>, ApiError> {
    let view = state.engine.get_workflow_status(id, query.include_nodes).await?;
    Ok(Json(view))
}

pub async fn stop(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    let stopped = state.engine.stop_workflow(id).await?;
    if stopped {
        Ok(StatusCode::OK)
    } else {
        Err(ApiError(EngineError::NotFound(format!("no in-flight run {id} on this instance"))))
    }
}

#[derive(Serialize)]
pub struct RetryResponse {
    pub original_execution_id: Uuid,
    pub new_execution_id: Uuid,
}

/// Always starts a fresh run from the workflow's current definition —
/// resuming from the failed node is explicitly not supported (SPEC_FULL.md
/// Open Question 1).
pub async fn retry(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    principal: Principal,
) -> Result<(StatusCode, Json<RetryResponse>), ApiError> {
    let row = run_repo::get_by_id(&state.pool, id).await.map_err(|e| match e {
        db::DbError::NotFound => ApiError(EngineError::NotFound(format!("run {id}"))),
        other => ApiError::from(other),
    })?;
    let original: WorkflowRun = row.try_into().map_err(internal)?;

    if !matches!(original.status, RunStatus::Failed | RunStatus::Cancelled) {
        return Err(ApiError(EngineError::InvalidState(format!(
            "run {id} is {} — only FAILED or CANCELLED runs can be retried",
            original.status
        ))));
    }

    let run = state
        .engine
        .execute_workflow(original.workflow_id, original.trigger_data, Some(principal.0), original.priority, None)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RetryResponse {
            original_execution_id: id,
            new_execution_id: run.id,
        }),
    ))
}

#[derive(Serialize)]
pub struct ExecutionStateResponse {
    pub execution_id: Uuid,
    pub status: String,
    pub variables: HashMap<String, Value>,
    pub node_outputs: HashMap<String, Value>,
    pub execution_path: Vec<ExecutionStep>,
    pub updated_at: Option<DateTime<Utc>>,
}

pub async fn state(Path(id): Path<Uuid>, State(app_state): State<AppState>) -> Result<Json<ExecutionStateResponse>, ApiError> {
    let view = app_state
        .state
        .get_workflow_state(id)
        .await?
        .ok_or_else(|| ApiError(EngineError::NotFound(format!("no state recorded for run {id}"))))?;

    Ok(Json(ExecutionStateResponse {
        execution_id: id,
        status: view.status,
        variables: view.variables,
        node_outputs: view.node_outputs,
        execution_path: view.execution_path,
        updated_at: view.updated_at,
    }))
}

#[derive(Serialize)]
pub struct NodeMetric {
    pub node_id: String,
    pub status: NodeStatus,
    pub duration_seconds: Option<f64>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct ExecutionMetricsResponse {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub status: RunStatus,
    pub total_duration_seconds: Option<f64>,
    pub node_count: usize,
    pub completed_nodes: usize,
    pub failed_nodes: usize,
    pub average_node_duration_seconds: Option<f64>,
    pub nodes: Vec<NodeMetric>,
}

fn duration_seconds(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    match (start, end) {
        (Some(start), Some(end)) => Some((end - start).num_milliseconds() as f64 / 1000.0),
        _ => None,
    }
}

pub async fn metrics(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<ExecutionMetricsResponse>, ApiError> {
    let run_row = run_repo::get_by_id(&state.pool, id).await.map_err(|e| match e {
        db::DbError::NotFound => ApiError(EngineError::NotFound(format!("run {id}"))),
        other => ApiError::from(other),
    })?;
    let run: WorkflowRun = run_row.try_into().map_err(internal)?;

    let rows = node_repo::list_by_run(&state.pool, id).await?;
    let executions: Vec<NodeExecution> = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<_>, String>>()
        .map_err(internal)?;

    let nodes: Vec<NodeMetric> = executions
        .iter()
        .map(|exec| NodeMetric {
            node_id: exec.node_id.clone(),
            status: exec.status,
            duration_seconds: duration_seconds(exec.started_at, exec.completed_at),
            started_at: exec.started_at,
            completed_at: exec.completed_at,
        })
        .collect();

    let completed_nodes = nodes.iter().filter(|n| n.status == NodeStatus::Completed).count();
    let failed_nodes = nodes.iter().filter(|n| n.status == NodeStatus::Failed).count();
    let durations: Vec<f64> = nodes.iter().filter_map(|n| n.duration_seconds).collect();
    let average_node_duration_seconds = if durations.is_empty() {
        None
    } else {
        Some(durations.iter().sum::<f64>() / durations.len() as f64)
    };

    Ok(Json(ExecutionMetricsResponse {
        execution_id: id,
        workflow_id: run.workflow_id,
        status: run.status,
        total_duration_seconds: duration_seconds(run.started_at, run.completed_at),
        node_count: nodes.len(),
        completed_nodes,
        failed_nodes,
        average_node_duration_seconds,
        nodes,
    }))
}

/// `POST /executions/batch` — submits each request onto the task queue
/// rather than starting them inline, so a large batch doesn't block the
/// request on `spawn`ing hundreds of runs synchronously. Rejects batches
/// over 100, matching the original router's limit.
pub async fn batch(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<Vec<ExecuteWorkflowRequest>>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if payload.len() > 100 {
        return Err(ApiError(EngineError::ValidationFailed(vec![
            "batch cannot contain more than 100 workflows".to_string(),
        ])));
    }

    let task_ids: Vec<Uuid> = payload
        .into_iter()
        .map(|req| {
            let args = serde_json::json!({
                "workflow_id": req.workflow_id,
                "trigger_data": req.trigger_data,
                "started_by": principal.0,
                "priority": req.priority,
            });
            state.queue.submit_task("workflow.execute", args, req.priority)
        })
        .collect();

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "workflow_count": task_ids.len(),
            "task_ids": task_ids,
        })),
    ))
}
