//! Durable tier of the run-scoped `WorkflowState` (one row per run).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::WorkflowStateRow, DbError};

/// Create or overwrite the `WorkflowState` row for `run_id`.
#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    pool: &PgPool,
    run_id: Uuid,
    status: &str,
    started_at: DateTime<Utc>,
    variables: serde_json::Value,
    node_outputs: serde_json::Value,
    execution_path: serde_json::Value,
    trigger_data: serde_json::Value,
) -> Result<WorkflowStateRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowStateRow,
        r#"
        INSERT INTO workflow_states
            (run_id, status, started_at, updated_at, variables, node_outputs, execution_path, trigger_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (run_id) DO UPDATE SET
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at,
            variables = EXCLUDED.variables,
            node_outputs = EXCLUDED.node_outputs,
            execution_path = EXCLUDED.execution_path,
            trigger_data = EXCLUDED.trigger_data
        RETURNING run_id, status, started_at, updated_at, variables, node_outputs, execution_path, trigger_data
        "#,
        run_id,
        status,
        started_at,
        now,
        variables,
        node_outputs,
        execution_path,
        trigger_data,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Same as [`upsert`] but within the caller's transaction — used to pair a
/// run's terminal `WorkflowState` write with its `workflow_runs` status
/// update atomically.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    run_id: Uuid,
    status: &str,
    started_at: DateTime<Utc>,
    variables: serde_json::Value,
    node_outputs: serde_json::Value,
    execution_path: serde_json::Value,
    trigger_data: serde_json::Value,
) -> Result<(), DbError> {
    let now = Utc::now();

    sqlx::query!(
        r#"
        INSERT INTO workflow_states
            (run_id, status, started_at, updated_at, variables, node_outputs, execution_path, trigger_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (run_id) DO UPDATE SET
            status = EXCLUDED.status,
            updated_at = EXCLUDED.updated_at,
            variables = EXCLUDED.variables,
            node_outputs = EXCLUDED.node_outputs,
            execution_path = EXCLUDED.execution_path,
            trigger_data = EXCLUDED.trigger_data
        "#,
        run_id,
        status,
        started_at,
        now,
        variables,
        node_outputs,
        execution_path,
        trigger_data,
    )
    .execute(&mut **tx)
    .await?;

    Ok(())
}

/// Fetch the `WorkflowState` row for a run, if it has been initialized.
pub async fn get(pool: &PgPool, run_id: Uuid) -> Result<Option<WorkflowStateRow>, DbError> {
    let row = sqlx::query_as!(
        WorkflowStateRow,
        r#"
        SELECT run_id, status, started_at, updated_at, variables, node_outputs, execution_path, trigger_data
        FROM workflow_states WHERE run_id = $1
        "#,
        run_id,
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Delete `WorkflowState` rows older than `max_age_days`, by `updated_at`.
pub async fn delete_older_than(pool: &PgPool, max_age_days: i64) -> Result<u64, DbError> {
    let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
    let result = sqlx::query!("DELETE FROM workflow_states WHERE updated_at < $1", cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
