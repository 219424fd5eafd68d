//! Workflow run repository functions.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::WorkflowRunRow, DbError};

/// Insert a new run in `PENDING` status.
pub async fn create(
    pool: &PgPool,
    id: Uuid,
    workflow_id: Uuid,
    trigger_data: serde_json::Value,
    started_by: Option<&str>,
    priority: i16,
) -> Result<WorkflowRunRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowRunRow,
        r#"
        INSERT INTO workflow_runs
            (id, workflow_id, status, trigger_data, started_by, priority)
        VALUES ($1, $2, 'PENDING', $3, $4, $5)
        RETURNING id, workflow_id, status, trigger_data, result_data, error,
                  started_at, completed_at, started_by, priority
        "#,
        id,
        workflow_id,
        trigger_data,
        started_by,
        priority,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single run by its primary key.
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<WorkflowRunRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowRunRow,
        r#"
        SELECT id, workflow_id, status, trigger_data, result_data, error,
               started_at, completed_at, started_by, priority
        FROM workflow_runs WHERE id = $1
        "#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Transition a run to `RUNNING`, stamping `started_at`.
pub async fn mark_running(pool: &PgPool, id: Uuid, started_at: DateTime<Utc>) -> Result<(), DbError> {
    sqlx::query!(
        r#"UPDATE workflow_runs SET status = 'RUNNING', started_at = $1 WHERE id = $2"#,
        started_at,
        id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Transition a run to a terminal status (`COMPLETED`/`FAILED`/`CANCELLED`),
/// recording the result or error and stamping `completed_at`, inside the
/// caller's transaction. Terminal rows are never mutated again.
///
/// Always called paired with `workflow_states::upsert_tx` in the same
/// transaction — a run's terminal status and its final `WorkflowState` must
/// commit together or not at all (spec.md §4.6).
pub async fn mark_terminal_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    id: Uuid,
    status: &str,
    result_data: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
    completed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE workflow_runs
        SET status = $1, result_data = $2, error = $3, completed_at = $4
        WHERE id = $5
        "#,
        status,
        result_data,
        error,
        completed_at,
        id,
    )
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// List runs for a workflow, optionally filtered by status, newest first.
pub async fn list_by_workflow(
    pool: &PgPool,
    workflow_id: Uuid,
    status: Option<&str>,
) -> Result<Vec<WorkflowRunRow>, DbError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as!(
                WorkflowRunRow,
                r#"
                SELECT id, workflow_id, status, trigger_data, result_data, error,
                       started_at, completed_at, started_by, priority
                FROM workflow_runs
                WHERE workflow_id = $1 AND status = $2
                ORDER BY id DESC
                "#,
                workflow_id,
                status,
            )
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as!(
                WorkflowRunRow,
                r#"
                SELECT id, workflow_id, status, trigger_data, result_data, error,
                       started_at, completed_at, started_by, priority
                FROM workflow_runs
                WHERE workflow_id = $1
                ORDER BY id DESC
                "#,
                workflow_id,
            )
            .fetch_all(pool)
            .await?
        }
    };
    Ok(rows)
}

/// List runs across every workflow, optionally filtered by `workflow_id`
/// and/or `status`, newest first, paginated — backs `GET /executions`.
pub async fn list_all(
    pool: &PgPool,
    workflow_id: Option<Uuid>,
    status: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<WorkflowRunRow>, DbError> {
    let rows = sqlx::query_as!(
        WorkflowRunRow,
        r#"
        SELECT id, workflow_id, status, trigger_data, result_data, error,
               started_at, completed_at, started_by, priority
        FROM workflow_runs
        WHERE ($1::uuid IS NULL OR workflow_id = $1)
          AND ($2::text IS NULL OR status = $2)
        ORDER BY id DESC
        LIMIT $3 OFFSET $4
        "#,
        workflow_id,
        status,
        limit,
        offset,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// All runs currently `RUNNING` or `PENDING` on any instance — used on
/// process start to detect runs abandoned by a prior crash.
pub async fn list_active(pool: &PgPool) -> Result<Vec<WorkflowRunRow>, DbError> {
    let rows = sqlx::query_as!(
        WorkflowRunRow,
        r#"
        SELECT id, workflow_id, status, trigger_data, result_data, error,
               started_at, completed_at, started_by, priority
        FROM workflow_runs
        WHERE status IN ('PENDING', 'RUNNING')
        ORDER BY id ASC
        "#,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
