use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::RevokedToken;

/// Records a revoked refresh token by hash. A duplicate insert fails with a
/// unique violation, which callers surface as an already-revoked error.
pub async fn insert(
    pool: &PgPool,
    token_hash: &str,
    user_id: i64,
    expires_at: DateTime<Utc>,
) -> Result<RevokedToken, sqlx::Error> {
    sqlx::query_as::<_, RevokedToken>(
        r#"
        INSERT INTO revoked_tokens (token_hash, user_id, expires_at)
        VALUES ($1, $2, $3)
        RETURNING id, token_hash, user_id, expires_at, created_at
        "#,
    )
    .bind(token_hash)
    .bind(user_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await
}

pub async fn is_revoked(pool: &PgPool, token_hash: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM revoked_tokens WHERE token_hash = $1")
            .bind(token_hash)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

/// Deletes registry rows whose tokens have expired on their own; a revoked
/// hash only needs to be remembered for as long as the token could verify.
pub async fn sweep_expired(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM revoked_tokens WHERE expires_at < now()")
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}
