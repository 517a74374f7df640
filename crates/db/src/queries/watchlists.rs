use crate::models::Watchlist;
use sqlx::PgPool;

pub const DEFAULT_NAME: &str = "Default";
pub const DEFAULT_DESCRIPTION: &str = "Your default watchlist";
pub const DEFAULT_COLOR: &str = "#3b82f6";

pub async fn create(
    pool: &PgPool,
    user_id: i64,
    name: &str,
    description: &str,
    color: &str,
) -> Result<Watchlist, sqlx::Error> {
    sqlx::query_as::<_, Watchlist>(
        r#"
        INSERT INTO watchlists (user_id, name, description, color)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, name, description, color, created_at, updated_at, deleted_at
        "#,
    )
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(color)
    .fetch_one(pool)
    .await
}

/// Every account gets one Default watchlist at creation time.
pub async fn create_default(pool: &PgPool, user_id: i64) -> Result<Watchlist, sqlx::Error> {
    create(pool, user_id, DEFAULT_NAME, DEFAULT_DESCRIPTION, DEFAULT_COLOR).await
}

pub async fn list_by_owner(pool: &PgPool, user_id: i64) -> Result<Vec<Watchlist>, sqlx::Error> {
    sqlx::query_as::<_, Watchlist>(
        r#"
        SELECT id, user_id, name, description, color, created_at, updated_at, deleted_at
        FROM watchlists
        WHERE user_id = $1 AND deleted_at IS NULL
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
}

/// Scoped to the owner; a watchlist owned by someone else is simply absent.
pub async fn get_owned(
    pool: &PgPool,
    id: i64,
    user_id: i64,
) -> Result<Option<Watchlist>, sqlx::Error> {
    sqlx::query_as::<_, Watchlist>(
        r#"
        SELECT id, user_id, name, description, color, created_at, updated_at, deleted_at
        FROM watchlists
        WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(pool)
    .await
}

pub async fn update_owned(
    pool: &PgPool,
    id: i64,
    user_id: i64,
    name: &str,
    description: &str,
    color: &str,
) -> Result<Option<Watchlist>, sqlx::Error> {
    sqlx::query_as::<_, Watchlist>(
        r#"
        UPDATE watchlists
        SET name = $3, description = $4, color = $5, updated_at = now()
        WHERE id = $1 AND user_id = $2 AND deleted_at IS NULL
        RETURNING id, user_id, name, description, color, created_at, updated_at, deleted_at
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(name)
    .bind(description)
    .bind(color)
    .fetch_optional(pool)
    .await
}
