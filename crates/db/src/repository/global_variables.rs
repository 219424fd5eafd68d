//! Durable tier of the state store's `global` scope — variables shared
//! across runs, with an optional expiry.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::{models::GlobalVariableRow, DbError};

/// Set (or replace) a global variable, with an optional absolute expiry.
pub async fn set(
    pool: &PgPool,
    name: &str,
    value: serde_json::Value,
    expires_at: Option<DateTime<Utc>>,
) -> Result<GlobalVariableRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as!(
        GlobalVariableRow,
        r#"
        INSERT INTO global_variables (name, value, expires_at, updated_at)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (name) DO UPDATE SET
            value = EXCLUDED.value,
            expires_at = EXCLUDED.expires_at,
            updated_at = EXCLUDED.updated_at
        RETURNING name, value, expires_at, updated_at
        "#,
        name,
        value,
        expires_at,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetch a global variable, treating an expired row as absent.
pub async fn get(pool: &PgPool, name: &str) -> Result<Option<GlobalVariableRow>, DbError> {
    let row = sqlx::query_as!(
        GlobalVariableRow,
        r#"SELECT name, value, expires_at, updated_at FROM global_variables WHERE name = $1"#,
        name,
    )
    .fetch_optional(pool)
    .await?;

    Ok(row.filter(|r| r.expires_at.map(|exp| exp > Utc::now()).unwrap_or(true)))
}
