//! Node execution repository functions.
//!
//! One row per attempt: a fresh row is inserted for every attempt (`PENDING`
//! → `RUNNING`), then that same row is finalized in place to a terminal
//! status. Retries never mutate a prior terminal row — they insert another
//! one with `retry_count` incremented.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::NodeExecutionRow, DbError};

/// Start a new attempt at running `node_id`, returning the new `RUNNING` row.
#[allow(clippy::too_many_arguments)]
pub async fn start_attempt(
    pool: &PgPool,
    workflow_run_id: Uuid,
    node_id: &str,
    node_type: &str,
    input_data: serde_json::Value,
    execution_order: i32,
    retry_count: i32,
) -> Result<NodeExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        INSERT INTO node_executions
            (id, workflow_run_id, node_id, node_type, status, input_data, started_at, execution_order, retry_count)
        VALUES ($1, $2, $3, $4, 'RUNNING', $5, $6, $7, $8)
        RETURNING id, workflow_run_id, node_id, node_type, status, input_data, output_data,
                  error, started_at, completed_at, execution_order, retry_count
        "#,
        id,
        workflow_run_id,
        node_id,
        node_type,
        input_data,
        now,
        execution_order,
        retry_count,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Finalize an attempt row as `COMPLETED`.
pub async fn complete_attempt(
    pool: &PgPool,
    id: Uuid,
    output_data: serde_json::Value,
    completed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE node_executions
        SET status = 'COMPLETED', output_data = $1, completed_at = $2
        WHERE id = $3
        "#,
        output_data,
        completed_at,
        id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Finalize an attempt row as `FAILED`.
pub async fn fail_attempt(
    pool: &PgPool,
    id: Uuid,
    error: &str,
    completed_at: DateTime<Utc>,
) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        UPDATE node_executions
        SET status = 'FAILED', error = $1, completed_at = $2
        WHERE id = $3
        "#,
        error,
        completed_at,
        id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Insert a `SKIPPED` row directly — used for nodes reached exclusively
/// through pruned conditional edges, which are never invoked.
pub async fn insert_skipped(
    pool: &PgPool,
    workflow_run_id: Uuid,
    node_id: &str,
    node_type: &str,
    execution_order: i32,
) -> Result<NodeExecutionRow, DbError> {
    let id = Uuid::new_v4();
    let now = Utc::now();

    let row = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        INSERT INTO node_executions
            (id, workflow_run_id, node_id, node_type, status, started_at, completed_at, execution_order, retry_count)
        VALUES ($1, $2, $3, $4, 'SKIPPED', $5, $5, $6, 0)
        RETURNING id, workflow_run_id, node_id, node_type, status, input_data, output_data,
                  error, started_at, completed_at, execution_order, retry_count
        "#,
        id,
        workflow_run_id,
        node_id,
        node_type,
        now,
        execution_order,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// All node executions for a run, ordered by `started_at` (then insertion
/// order), the order the spec's `ListByRun(orderedByStartedAt)` calls for.
pub async fn list_by_run(pool: &PgPool, workflow_run_id: Uuid) -> Result<Vec<NodeExecutionRow>, DbError> {
    let rows = sqlx::query_as!(
        NodeExecutionRow,
        r#"
        SELECT id, workflow_run_id, node_id, node_type, status, input_data, output_data,
               error, started_at, completed_at, execution_order, retry_count
        FROM node_executions
        WHERE workflow_run_id = $1
        ORDER BY started_at ASC NULLS LAST, execution_order ASC
        "#,
        workflow_run_id,
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
