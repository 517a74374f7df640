use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/websub", get(health_websub))
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct WebSubHealthResponse {
    status: &'static str,
    youtube_api: bool,
    websub: bool,
}

async fn health(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    sqlx::query("SELECT 1")
        .execute(&state.db)
        .await
        .map_err(|err| {
            tracing::error!(error = %err, "health check database ping failed");
            ApiError::ServiceUnavailable("database unreachable".to_string())
        })?;
    Ok(Json(HealthResponse { status: "ok" }))
}

async fn health_websub(State(state): State<AppState>) -> Json<WebSubHealthResponse> {
    Json(WebSubHealthResponse {
        status: "ok",
        youtube_api: state.settings.youtube.api_enabled(),
        websub: state.settings.youtube.websub_enabled(),
    })
}
