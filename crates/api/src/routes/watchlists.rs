use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::get,
    routing::post,
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::json;

use watchtower_db::models::Watchlist;
use watchtower_db::queries::{channels, watchlists};

use crate::{
    error::{ApiError, ApiResult},
    middleware::auth::require_auth,
    routes::channels::{cleanup_orphaned_channel, ChannelBody},
    state::{AppState, AuthUser},
};

static COLOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("color regex"));

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/watchlists", post(create).get(list))
        .route(
            "/api/v1/watchlists/:id",
            get(get_one).put(update).delete(delete_watchlist),
        )
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct WatchlistRequest {
    name: String,
    #[serde(default)]
    description: String,
    color: String,
}

#[derive(Debug, Serialize)]
pub struct WatchlistBody {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub color: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Watchlist> for WatchlistBody {
    fn from(w: Watchlist) -> Self {
        Self {
            id: w.id,
            name: w.name,
            description: w.description,
            color: w.color,
            created_at: w.created_at,
            updated_at: w.updated_at,
        }
    }
}

fn validate_watchlist(req: &WatchlistRequest) -> Result<(), ApiError> {
    if req.name.is_empty() || req.name.len() > 255 {
        return Err(ApiError::validation(
            "name must be between 1 and 255 characters",
        ));
    }
    if !COLOR_RE.is_match(&req.color) {
        return Err(ApiError::validation(
            "color must be a # followed by 6 hex digits",
        ));
    }
    Ok(())
}

async fn create(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(req): Json<WatchlistRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_watchlist(&req)?;

    let watchlist =
        watchlists::create(&state.db, auth.id, &req.name, &req.description, &req.color).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({"watchlist": WatchlistBody::from(watchlist)})),
    ))
}

async fn list(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<serde_json::Value>> {
    let items = watchlists::list_by_owner(&state.db, auth.id).await?;
    let items: Vec<WatchlistBody> = items.into_iter().map(WatchlistBody::from).collect();
    Ok(Json(json!({"watchlists": items})))
}

async fn get_one(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let watchlist = watchlists::get_owned(&state.db, id, auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("watchlist not found".to_string()))?;

    let members = channels::list_for_watchlist(&state.db, watchlist.id).await?;
    let members: Vec<ChannelBody> = members.into_iter().map(ChannelBody::from).collect();

    Ok(Json(json!({
        "watchlist": WatchlistBody::from(watchlist),
        "channels": members,
    })))
}

async fn update(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(req): Json<WatchlistRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    validate_watchlist(&req)?;

    let watchlist = watchlists::update_owned(
        &state.db,
        id,
        auth.id,
        &req.name,
        &req.description,
        &req.color,
    )
    .await?
    .ok_or_else(|| ApiError::NotFound("watchlist not found".to_string()))?;

    Ok(Json(json!({"watchlist": WatchlistBody::from(watchlist)})))
}

/// Soft-deletes the watchlist and releases its channel references. Channels
/// left with no live watchlist are unsubscribed and cleaned up after commit.
async fn delete_watchlist(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> ApiResult<Json<serde_json::Value>> {
    let watchlist = watchlists::get_owned(&state.db, id, auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("watchlist not found".to_string()))?;

    let mut tx = state.db.begin().await?;

    let member_ids: Vec<(i64,)> =
        sqlx::query_as("SELECT channel_id FROM watchlist_channels WHERE watchlist_id = $1")
            .bind(watchlist.id)
            .fetch_all(&mut *tx)
            .await?;
    let member_ids: Vec<i64> = member_ids.into_iter().map(|(id,)| id).collect();

    sqlx::query("DELETE FROM watchlist_videos WHERE watchlist_id = $1")
        .bind(watchlist.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM watchlist_channels WHERE watchlist_id = $1")
        .bind(watchlist.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE watchlists SET deleted_at = now(), updated_at = now() WHERE id = $1")
        .bind(watchlist.id)
        .execute(&mut *tx)
        .await?;

    // Channels this watchlist referenced that now have refcount zero.
    let orphans: Vec<(i64, String)> = sqlx::query_as(
        r#"
        SELECT c.id, c.platform_channel_id
        FROM channels c
        WHERE c.id = ANY($1)
          AND NOT EXISTS (
              SELECT 1
              FROM watchlist_channels wc
              JOIN watchlists w ON w.id = wc.watchlist_id AND w.deleted_at IS NULL
              WHERE wc.channel_id = c.id
          )
        "#,
    )
    .bind(&member_ids)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;

    for (channel_id, platform_channel_id) in orphans {
        cleanup_orphaned_channel(&state, channel_id, &platform_channel_id).await;
    }

    Ok(Json(json!({"status": "success"})))
}
