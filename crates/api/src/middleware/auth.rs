use axum::{
    body::Body,
    extract::State,
    http::{header::AUTHORIZATION, Request},
    middleware::Next,
    response::Response,
};

use watchtower_core::tokens::TokenType;

use crate::{error::ApiError, state::AppState, state::AuthUser};

/// Validates the bearer access token and injects the caller's identity.
/// Handlers never parse tokens themselves.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let Some(token) = header.strip_prefix("Bearer ") else {
        return Err(ApiError::Unauthorized(
            "missing or malformed authorization header".to_string(),
        ));
    };

    let claims = state
        .tokens
        .verify(token, TokenType::Access)
        .map_err(|_| ApiError::Unauthorized("invalid or expired token".to_string()))?;

    req.extensions_mut().insert(AuthUser { id: claims.sub });
    Ok(next.run(req).await)
}
