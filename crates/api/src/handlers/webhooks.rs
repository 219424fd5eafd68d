//! `POST /webhook/:path` — external trigger entry point.
//!
//! There is no standalone `Trigger` type in the domain model; a webhook
//! trigger is just a `WebhookTrigger` node whose `config.endpoint_path`
//! matches the requested path, on some `ACTIVE` workflow. Scans active
//! workflows rather than indexing by path — fine at the scale an
//! in-process broker is expected to run at (see `queue::Lane::pop_ready`'s
//! equivalent tradeoff).

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde_json::Value;

use db::repository::workflows as wf_repo;
use engine::{EngineError, WorkflowDefinition};

use crate::error::ApiError;
use crate::AppState;

const WEBHOOK_NODE_TYPE: &str = "WebhookTrigger";

pub async fn handle(
    Path(path): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let rows = wf_repo::list_by_status(&state.pool, Some("ACTIVE")).await?;

    let matched = rows.into_iter().find(|row| {
        let definition: Result<WorkflowDefinition, _> = serde_json::from_value(row.definition.clone());
        definition
            .map(|def| {
                def.nodes.iter().any(|node| {
                    node.node_type == WEBHOOK_NODE_TYPE
                        && node.config.get("endpoint_path").and_then(Value::as_str) == Some(path.as_str())
                })
            })
            .unwrap_or(false)
    });

    let Some(workflow_row) = matched else {
        return Err(ApiError(EngineError::NotFound(format!(
            "no active workflow listens on webhook path '{path}'"
        ))));
    };

    let run = state.engine.execute_workflow(workflow_row.id, payload, None, 5, None).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(serde_json::json!({
            "execution_id": run.id,
            "workflow_id": run.workflow_id,
        })),
    ))
}
