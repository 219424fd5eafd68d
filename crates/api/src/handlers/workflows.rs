//! `/workflows` handlers — thin wrappers over `engine::Engine` for writes,
//! direct repository reads for listing/fetching (same split the teacher
//! drew between mutation-through-engine and read-through-repository).

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use db::repository::workflows as wf_repo;
use engine::{Workflow, WorkflowDefinition, WorkflowPatch, WorkflowStatus};

use crate::auth::Principal;
use crate::error::{internal, ApiError};
use crate::AppState;

#[derive(Deserialize)]
pub struct CreateWorkflowRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub definition: WorkflowDefinition,
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Json(payload): Json<CreateWorkflowRequest>,
) -> Result<(StatusCode, Json<Workflow>), ApiError> {
    let workflow = state
        .engine
        .create_workflow(payload.name, payload.description, payload.definition, Some(principal.0))
        .await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

#[derive(Deserialize)]
pub struct ListWorkflowsQuery {
    pub status: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListWorkflowsQuery>,
) -> Result<Json<Vec<Workflow>>, ApiError> {
    let rows = wf_repo::list_by_status(&state.pool, query.status.as_deref()).await?;
    let workflows = rows
        .into_iter()
        .map(TryInto::try_into)
        .collect::<Result<Vec<_>, String>>()
        .map_err(internal)?;
    Ok(Json(workflows))
}

pub async fn get(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<Workflow>, ApiError> {
    let row = wf_repo::get_by_id(&state.pool, id).await.map_err(|e| match e {
        db::DbError::NotFound => ApiError(engine::EngineError::NotFound(format!("workflow {id}"))),
        other => ApiError::from(other),
    })?;
    let workflow: Workflow = row.try_into().map_err(internal)?;
    Ok(Json(workflow))
}

#[derive(Deserialize, Default)]
pub struct UpdateWorkflowRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub definition: Option<WorkflowDefinition>,
    #[serde(default)]
    pub status: Option<WorkflowStatus>,
}

pub async fn update(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateWorkflowRequest>,
) -> Result<Json<Workflow>, ApiError> {
    let patch = WorkflowPatch {
        name: payload.name,
        description: payload.description,
        definition: payload.definition,
        status: payload.status,
    };
    let workflow = state.engine.update_workflow(id, patch).await?;
    Ok(Json(workflow))
}

pub async fn delete(Path(id): Path<Uuid>, State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    wf_repo::delete(&state.pool, id).await.map_err(|e| match e {
        db::DbError::NotFound => ApiError(engine::EngineError::NotFound(format!("workflow {id}"))),
        other => ApiError::from(other),
    })?;
    Ok(StatusCode::NO_CONTENT)
}
