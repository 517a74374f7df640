use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::HubSubscription;

pub async fn get_by_platform_id(
    pool: &PgPool,
    platform_channel_id: &str,
) -> Result<Option<HubSubscription>, sqlx::Error> {
    sqlx::query_as::<_, HubSubscription>(
        r#"
        SELECT id, platform_channel_id, lease_seconds, expires_at, secret, is_active,
               subscribed_at, created_at, updated_at
        FROM hub_subscriptions
        WHERE platform_channel_id = $1
        "#,
    )
    .bind(platform_channel_id)
    .fetch_optional(pool)
    .await
}

/// Creates or reactivates the subscription row for a channel.
///
/// The secret is written only on insert; an existing row keeps its secret so
/// in-flight notifications signed with it still verify. Rotating a secret
/// requires a full unsubscribe/resubscribe.
pub async fn upsert(
    pool: &PgPool,
    platform_channel_id: &str,
    lease_seconds: i64,
    expires_at: Option<DateTime<Utc>>,
    secret: &str,
) -> Result<HubSubscription, sqlx::Error> {
    sqlx::query_as::<_, HubSubscription>(
        r#"
        INSERT INTO hub_subscriptions (platform_channel_id, lease_seconds, expires_at, secret)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (platform_channel_id) DO UPDATE
        SET lease_seconds = EXCLUDED.lease_seconds,
            expires_at = EXCLUDED.expires_at,
            is_active = TRUE,
            updated_at = now()
        RETURNING id, platform_channel_id, lease_seconds, expires_at, secret, is_active,
                  subscribed_at, created_at, updated_at
        "#,
    )
    .bind(platform_channel_id)
    .bind(lease_seconds)
    .bind(expires_at)
    .bind(secret)
    .fetch_one(pool)
    .await
}

/// Marks the row inactive and returns it; the row is retained so its secret
/// stays available for any notifications still in flight.
pub async fn mark_inactive(
    pool: &PgPool,
    platform_channel_id: &str,
) -> Result<Option<HubSubscription>, sqlx::Error> {
    sqlx::query_as::<_, HubSubscription>(
        r#"
        UPDATE hub_subscriptions
        SET is_active = FALSE, updated_at = now()
        WHERE platform_channel_id = $1
        RETURNING id, platform_channel_id, lease_seconds, expires_at, secret, is_active,
                  subscribed_at, created_at, updated_at
        "#,
    )
    .bind(platform_channel_id)
    .fetch_optional(pool)
    .await
}

/// Active subscriptions whose lease expires within the given window.
/// Indefinite subscriptions (NULL expiry) never come due.
pub async fn due_for_renewal(
    pool: &PgPool,
    within_seconds: f64,
) -> Result<Vec<HubSubscription>, sqlx::Error> {
    sqlx::query_as::<_, HubSubscription>(
        r#"
        SELECT id, platform_channel_id, lease_seconds, expires_at, secret, is_active,
               subscribed_at, created_at, updated_at
        FROM hub_subscriptions
        WHERE is_active = TRUE
          AND expires_at IS NOT NULL
          AND expires_at <= now() + make_interval(secs => $1)
        ORDER BY expires_at ASC
        "#,
    )
    .bind(within_seconds)
    .fetch_all(pool)
    .await
}

pub async fn renew_lease(
    pool: &PgPool,
    id: i64,
    lease_seconds: i64,
    expires_at: Option<DateTime<Utc>>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE hub_subscriptions
        SET lease_seconds = $2, expires_at = $3, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(id)
    .bind(lease_seconds)
    .bind(expires_at)
    .execute(pool)
    .await?;
    Ok(())
}
