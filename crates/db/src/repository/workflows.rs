//! Workflow CRUD operations.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::WorkflowRow, DbError};

/// Insert a brand-new `DRAFT` workflow.
pub async fn create(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    description: Option<&str>,
    definition: serde_json::Value,
    created_by: Option<&str>,
) -> Result<WorkflowRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        INSERT INTO workflows (id, name, description, version, definition, status, created_by, created_at, updated_at)
        VALUES ($1, $2, $3, 1, $4, 'DRAFT', $5, $6, $6)
        RETURNING id, name, description, version, definition, status, created_by, created_at, updated_at
        "#,
        id,
        name,
        description,
        definition,
        created_by,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a single workflow by its primary key.
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<WorkflowRow, DbError> {
    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        SELECT id, name, description, version, definition, status, created_by, created_at, updated_at
        FROM workflows WHERE id = $1
        "#,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Return workflows filtered by `status`, or all workflows if `status` is
/// `None`, newest first.
pub async fn list_by_status(pool: &PgPool, status: Option<&str>) -> Result<Vec<WorkflowRow>, DbError> {
    let rows = match status {
        Some(status) => {
            sqlx::query_as!(
                WorkflowRow,
                r#"
                SELECT id, name, description, version, definition, status, created_by, created_at, updated_at
                FROM workflows WHERE status = $1 ORDER BY created_at DESC
                "#,
                status,
            )
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as!(
                WorkflowRow,
                r#"
                SELECT id, name, description, version, definition, status, created_by, created_at, updated_at
                FROM workflows ORDER BY created_at DESC
                "#,
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows)
}

/// Replace `definition`/`name`/`description`/`status`, bumping `version` by
/// one. Callers decide whether a version bump is warranted (i.e. whether
/// `definition` actually changed) before calling this.
pub async fn update(
    pool: &PgPool,
    id: Uuid,
    name: &str,
    description: Option<&str>,
    definition: serde_json::Value,
    status: &str,
    bump_version: bool,
) -> Result<WorkflowRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowRow,
        r#"
        UPDATE workflows
        SET name = $1,
            description = $2,
            definition = $3,
            status = $4,
            version = CASE WHEN $5 THEN version + 1 ELSE version END,
            updated_at = $6
        WHERE id = $7
        RETURNING id, name, description, version, definition, status, created_by, created_at, updated_at
        "#,
        name,
        description,
        definition,
        status,
        bump_version,
        now,
        id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Permanently delete a workflow by its primary key.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query!("DELETE FROM workflows WHERE id = $1", id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    Ok(())
}
