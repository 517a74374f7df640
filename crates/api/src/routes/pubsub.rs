use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Query, State},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use watchtower_hub::ingest::{self, IngestError};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Feed bodies are small, but batched notifications can run to a few MiB.
const NOTIFICATION_BODY_LIMIT: usize = 5 * 1024 * 1024;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/pubsub/callback", get(verify).post(notify))
        .route_layer(DefaultBodyLimit::max(NOTIFICATION_BODY_LIMIT))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct VerifyParams {
    #[serde(rename = "hub.mode")]
    mode: Option<String>,
    #[serde(rename = "hub.topic")]
    topic: Option<String>,
    #[serde(rename = "hub.challenge")]
    challenge: Option<String>,
}

/// Hub verification: echo the challenge as text/plain for both subscribe
/// and unsubscribe; anything malformed is a 400.
async fn verify(Query(params): Query<VerifyParams>) -> ApiResult<String> {
    let (Some(mode), Some(topic), Some(challenge)) =
        (params.mode, params.topic, params.challenge)
    else {
        return Err(ApiError::validation(
            "missing required parameters (hub.mode, hub.topic, hub.challenge)",
        ));
    };

    match mode.as_str() {
        "subscribe" | "unsubscribe" => {
            info!(mode, topic, "hub verification request accepted");
            Ok(challenge)
        }
        _ => Err(ApiError::validation("invalid hub.mode")),
    }
}

async fn notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<impl IntoResponse> {
    let Some(signature) = headers
        .get("X-Hub-Signature")
        .and_then(|v| v.to_str().ok())
    else {
        return Err(ApiError::validation("missing X-Hub-Signature header"));
    };

    let summary =
        ingest::process_notification(&state.db, state.platform.as_deref(), &body, signature)
            .await
            .map_err(|err| match err {
                IngestError::Parse(_) | IngestError::NoEntries | IngestError::MissingChannelId => {
                    ApiError::validation("could not parse notification feed")
                }
                IngestError::UnknownSubscription(channel) => {
                    ApiError::NotFound(format!("no subscription for channel {channel}"))
                }
                IngestError::SignatureMismatch => ApiError::validation("invalid signature"),
                IngestError::Db(err) => err.into(),
            })?;

    info!(
        ingested = summary.ingested,
        skipped = summary.skipped,
        "notification processed"
    );
    Ok(Json(json!({"status": "success"})))
}
