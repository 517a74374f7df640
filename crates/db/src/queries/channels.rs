use crate::models::Channel;
use sqlx::PgPool;

pub async fn get_by_platform_id(
    pool: &PgPool,
    platform_channel_id: &str,
) -> Result<Option<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT id, platform_channel_id, title, description, thumbnail_url, custom_name,
               created_at, updated_at, deleted_at
        FROM channels
        WHERE platform_channel_id = $1 AND deleted_at IS NULL
        "#,
    )
    .bind(platform_channel_id)
    .fetch_optional(pool)
    .await
}

pub async fn list_for_watchlist(
    pool: &PgPool,
    watchlist_id: i64,
) -> Result<Vec<Channel>, sqlx::Error> {
    sqlx::query_as::<_, Channel>(
        r#"
        SELECT c.id, c.platform_channel_id, c.title, c.description, c.thumbnail_url,
               c.custom_name, c.created_at, c.updated_at, c.deleted_at
        FROM channels c
        JOIN watchlist_channels wc ON wc.channel_id = c.id
        WHERE wc.watchlist_id = $1 AND c.deleted_at IS NULL
        ORDER BY c.title ASC
        "#,
    )
    .bind(watchlist_id)
    .fetch_all(pool)
    .await
}
