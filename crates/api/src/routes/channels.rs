use axum::{
    extract::{Path, State},
    middleware::from_fn_with_state,
    routing::{delete, post},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info, warn};

use watchtower_db::models::Channel;
use watchtower_db::queries::{channels, watchlists};
use watchtower_platform::{parse, PlatformError};

use crate::{
    error::{ApiError, ApiResult},
    middleware::auth::require_auth,
    state::{AppState, AuthUser},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/v1/watchlists/:id/channels",
            post(add_channel).get(list_channels),
        )
        .route(
            "/api/v1/watchlists/:id/channels/:channel_id",
            delete(remove_channel),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct AddChannelRequest {
    channel_id: String,
}

#[derive(Debug, Serialize)]
pub struct ChannelBody {
    pub id: i64,
    pub channel_id: String,
    pub title: String,
    pub description: String,
    pub thumbnail_url: String,
    pub custom_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Channel> for ChannelBody {
    fn from(c: Channel) -> Self {
        Self {
            id: c.id,
            channel_id: c.platform_channel_id,
            title: c.title,
            description: c.description,
            thumbnail_url: c.thumbnail_url,
            custom_name: c.custom_name,
            created_at: c.created_at,
            updated_at: c.updated_at,
        }
    }
}

/// Adds a channel to a watchlist, creating or reviving the channel row.
///
/// The platform lookup happens before the transaction, the hub subscribe
/// after the commit; neither ever holds a row lock. A hub failure is logged
/// only: the membership write is the user-visible success, and the renewal
/// pass retries the subscription.
async fn add_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<AddChannelRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    let watchlist = watchlists::get_owned(&state.db, id, auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("watchlist not found".to_string()))?;

    let Some(platform) = state.platform.as_ref() else {
        return Err(ApiError::ServiceUnavailable(
            "channel resolution is not configured".to_string(),
        ));
    };

    let info = platform
        .resolve_channel(&req.channel_id)
        .await
        .map_err(|err| match err {
            PlatformError::InvalidInput | PlatformError::NotFound => {
                ApiError::Unprocessable("invalid channel identifier or url".to_string())
            }
            PlatformError::Upstream(detail) => {
                error!(error = %detail, "platform api error during channel resolution");
                ApiError::ServiceUnavailable("platform api unavailable".to_string())
            }
        })?;

    let mut tx = state.db.begin().await?;

    let existing: Option<Channel> = sqlx::query_as(
        r#"
        SELECT id, platform_channel_id, title, description, thumbnail_url, custom_name,
               created_at, updated_at, deleted_at
        FROM channels
        WHERE platform_channel_id = $1
        "#,
    )
    .bind(&info.id)
    .fetch_optional(&mut *tx)
    .await?;

    // Subscribe only for a channel that is new or coming back from
    // soft-delete; a live channel already has an active subscription.
    let (channel, needs_subscription) = match existing {
        None => {
            let created: Channel = sqlx::query_as(
                r#"
                INSERT INTO channels (platform_channel_id, title, description, thumbnail_url)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (platform_channel_id) DO UPDATE
                SET title = EXCLUDED.title,
                    description = EXCLUDED.description,
                    thumbnail_url = EXCLUDED.thumbnail_url,
                    updated_at = now(),
                    deleted_at = NULL
                RETURNING id, platform_channel_id, title, description, thumbnail_url,
                          custom_name, created_at, updated_at, deleted_at
                "#,
            )
            .bind(&info.id)
            .bind(&info.title)
            .bind(&info.description)
            .bind(&info.thumbnail)
            .fetch_one(&mut *tx)
            .await?;
            (created, true)
        }
        Some(found) => {
            let revived = found.deleted_at.is_some();
            let updated: Channel = sqlx::query_as(
                r#"
                UPDATE channels
                SET title = $2, description = $3, thumbnail_url = $4,
                    updated_at = now(), deleted_at = NULL
                WHERE id = $1
                RETURNING id, platform_channel_id, title, description, thumbnail_url,
                          custom_name, created_at, updated_at, deleted_at
                "#,
            )
            .bind(found.id)
            .bind(&info.title)
            .bind(&info.description)
            .bind(&info.thumbnail)
            .fetch_one(&mut *tx)
            .await?;
            (updated, revived)
        }
    };

    sqlx::query(
        r#"
        INSERT INTO watchlist_channels (watchlist_id, channel_id)
        VALUES ($1, $2)
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(watchlist.id)
    .bind(channel.id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    if needs_subscription {
        match state.hub.as_ref() {
            Some(hub) => {
                if let Err(err) = hub.subscribe(&channel.platform_channel_id).await {
                    warn!(
                        channel_id = %channel.platform_channel_id,
                        error = %err,
                        "hub subscription failed after channel add"
                    );
                }
            }
            None => warn!(
                channel_id = %channel.platform_channel_id,
                "websub disabled; channel added without hub subscription"
            ),
        }
    }

    Ok(Json(json!({"channel": ChannelBody::from(channel)})))
}

async fn list_channels(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let watchlist = watchlists::get_owned(&state.db, id, auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("watchlist not found".to_string()))?;

    let members = channels::list_for_watchlist(&state.db, watchlist.id).await?;
    let members: Vec<ChannelBody> = members.into_iter().map(ChannelBody::from).collect();
    Ok(Json(json!({"channels": members})))
}

/// Removes a channel from a watchlist. When the last watchlist releases the
/// channel its subscription is torn down and the channel and its videos are
/// soft-deleted in a separate cleanup transaction.
async fn remove_channel(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path((id, channel_param)): Path<(i64, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    let watchlist = watchlists::get_owned(&state.db, id, auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("watchlist not found".to_string()))?;

    let platform_channel_id = resolve_for_removal(&state, &channel_param).await;

    let channel: Option<Channel> = sqlx::query_as(
        r#"
        SELECT id, platform_channel_id, title, description, thumbnail_url, custom_name,
               created_at, updated_at, deleted_at
        FROM channels
        WHERE platform_channel_id = $1
        "#,
    )
    .bind(&platform_channel_id)
    .fetch_optional(&state.db)
    .await?;
    let channel = channel.ok_or_else(|| ApiError::NotFound("channel not found".to_string()))?;

    let mut tx = state.db.begin().await?;

    sqlx::query(
        r#"
        DELETE FROM watchlist_videos
        WHERE watchlist_id = $1
          AND video_id IN (SELECT id FROM videos WHERE channel_id = $2)
        "#,
    )
    .bind(watchlist.id)
    .bind(channel.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("DELETE FROM watchlist_channels WHERE watchlist_id = $1 AND channel_id = $2")
        .bind(watchlist.id)
        .bind(channel.id)
        .execute(&mut *tx)
        .await?;

    // Refcount across all live watchlists, derived from committed join rows.
    let (refcount,): (i64,) = sqlx::query_as(
        r#"
        SELECT COUNT(*)
        FROM watchlist_channels wc
        JOIN watchlists w ON w.id = wc.watchlist_id AND w.deleted_at IS NULL
        WHERE wc.channel_id = $1
        "#,
    )
    .bind(channel.id)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if refcount == 0 {
        cleanup_orphaned_channel(&state, channel.id, &channel.platform_channel_id).await;
    }

    Ok(Json(json!({"status": "success"})))
}

/// A raw canonical id skips resolution; anything else is resolved through
/// the platform when possible, falling back to the raw value.
async fn resolve_for_removal(state: &AppState, input: &str) -> String {
    if parse::is_canonical_id(input) {
        return input.to_string();
    }
    if let Some(platform) = state.platform.as_ref() {
        if let Ok(info) = platform.resolve_channel(input).await {
            return info.id;
        }
    }
    input.to_string()
}

/// Post-commit teardown for a channel no live watchlist references:
/// unsubscribe from the hub, then soft-delete the channel and its videos.
/// Failures are logged; the membership removal has already succeeded.
pub(crate) async fn cleanup_orphaned_channel(
    state: &AppState,
    channel_id: i64,
    platform_channel_id: &str,
) {
    if let Some(hub) = state.hub.as_ref() {
        if let Err(err) = hub.unsubscribe(platform_channel_id).await {
            warn!(
                channel_id = %platform_channel_id,
                error = %err,
                "hub unsubscribe failed during channel cleanup"
            );
        }
    }

    let result = async {
        let mut tx = state.db.begin().await?;
        sqlx::query(
            "UPDATE videos SET deleted_at = now(), updated_at = now() \
             WHERE channel_id = $1 AND deleted_at IS NULL",
        )
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            "UPDATE channels SET deleted_at = now(), updated_at = now() WHERE id = $1",
        )
        .bind(channel_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await
    }
    .await;

    match result {
        Ok(()) => info!(
            channel_id = %platform_channel_id,
            "channel released by last watchlist and soft-deleted"
        ),
        Err(err) => error!(
            channel_id = %platform_channel_id,
            error = %err,
            "channel cleanup failed; removal already committed"
        ),
    }
}
