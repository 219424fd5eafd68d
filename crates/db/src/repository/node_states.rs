//! `NodeState` audit sink, keyed by `(run_id, node_id, state_type)`.

use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::NodeStateRow, DbError};

/// Record a node state entry. Entries are append-only: a new `(run_id,
/// node_id, state_type)` write inserts a fresh row rather than overwriting,
/// so the audit trail keeps every intermediate value recorded during a run.
pub async fn append(
    pool: &PgPool,
    run_id: Uuid,
    node_id: &str,
    state_type: &str,
    data: serde_json::Value,
) -> Result<NodeStateRow, DbError> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let row = sqlx::query_as!(
        NodeStateRow,
        r#"
        INSERT INTO node_states (id, run_id, node_id, state_type, data, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id, run_id, node_id, state_type, data, created_at
        "#,
        id,
        run_id,
        node_id,
        state_type,
        data,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch the most recent entry for `(run_id, node_id, state_type)`.
pub async fn get_latest(
    pool: &PgPool,
    run_id: Uuid,
    node_id: &str,
    state_type: &str,
) -> Result<Option<NodeStateRow>, DbError> {
    let row = sqlx::query_as!(
        NodeStateRow,
        r#"
        SELECT id, run_id, node_id, state_type, data, created_at
        FROM node_states
        WHERE run_id = $1 AND node_id = $2 AND state_type = $3
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        run_id,
        node_id,
        state_type,
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Delete every `node_states` row for `run_id` — part of `CleanupRun`'s
/// durable-tier path when retention policy says to drop audit data, too.
pub async fn delete_for_run(pool: &PgPool, run_id: Uuid) -> Result<u64, DbError> {
    let result = sqlx::query!("DELETE FROM node_states WHERE run_id = $1", run_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Delete rows older than `max_age_days`, by `created_at`.
pub async fn delete_older_than(pool: &PgPool, max_age_days: i64) -> Result<u64, DbError> {
    let cutoff = chrono::Utc::now() - chrono::Duration::days(max_age_days);
    let result = sqlx::query!("DELETE FROM node_states WHERE created_at < $1", cutoff)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
