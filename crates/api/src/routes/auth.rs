use axum::{
    extract::State,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use watchtower_core::password;
use watchtower_core::tokens::{hash_token, TokenPair, TokenType};
use watchtower_db::queries::{revoked_tokens, users, watchlists};

use crate::{
    cookies,
    error::{ApiError, ApiResult},
    middleware::auth::require_auth,
    state::{AppState, AuthUser},
};

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"));
static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{3,24}$").expect("username regex"));

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/api/v1/auth/register", post(register))
        .route("/api/v1/auth/login", post(login))
        .route("/api/v1/auth/refresh", post(refresh))
        .route("/api/v1/auth/logout", post(logout))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/v1/auth/me", get(me))
        .route_layer(from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    public.merge(protected)
}

#[derive(Debug, Deserialize)]
struct RegisterRequest {
    email: String,
    username: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginRequest {
    identifier: String,
    password: String,
}

#[derive(Debug, Serialize)]
struct TokenResponse {
    access_token: String,
    expires_at: i64,
}

#[derive(Debug, Serialize)]
struct UserBody {
    id: i64,
    username: String,
    email: String,
}

fn validate_register(req: &RegisterRequest) -> Result<(), ApiError> {
    let mut details = Map::new();
    if !EMAIL_RE.is_match(&req.email) {
        details.insert("email".to_string(), json!("must be a valid email address"));
    }
    if !USERNAME_RE.is_match(&req.username) {
        details.insert(
            "username".to_string(),
            json!("must be 3-24 alphanumeric characters"),
        );
    }
    if req.password.len() < 8 {
        details.insert(
            "password".to_string(),
            json!("must be at least 8 characters"),
        );
    }
    if details.is_empty() {
        Ok(())
    } else {
        Err(ApiError::validation_with(
            "invalid input data",
            Value::Object(details),
        ))
    }
}

async fn hash_password(password: String) -> ApiResult<String> {
    // bcrypt is deliberately slow; keep it off the async runtime.
    tokio::task::spawn_blocking(move || password::hash(&password))
        .await
        .map_err(|_| ApiError::Internal)?
        .map_err(|err| {
            tracing::error!(error = %err, "password hashing failed");
            ApiError::Internal
        })
}

async fn verify_password(password: String, hash: String) -> ApiResult<bool> {
    tokio::task::spawn_blocking(move || password::verify(&password, &hash))
        .await
        .map_err(|_| ApiError::Internal)?
        .map_err(|err| {
            tracing::error!(error = %err, "password verification failed");
            ApiError::Internal
        })
}

fn issue_pair(state: &AppState, user_id: i64) -> ApiResult<TokenPair> {
    state.tokens.issue_pair(user_id).map_err(|err| {
        tracing::error!(error = %err, "token signing failed");
        ApiError::Internal
    })
}

async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_register(&req)?;

    let password_hash = hash_password(req.password).await?;

    let mut tx = state.db.begin().await?;

    let email_taken: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(&req.email)
            .fetch_optional(&mut *tx)
            .await?;
    if email_taken.is_some() {
        return Err(ApiError::Conflict(
            "this email is already registered".to_string(),
        ));
    }

    let username_taken: Option<(i64,)> =
        sqlx::query_as("SELECT id FROM users WHERE username = $1")
            .bind(&req.username)
            .fetch_optional(&mut *tx)
            .await?;
    if username_taken.is_some() {
        return Err(ApiError::Conflict(
            "this username is already taken".to_string(),
        ));
    }

    // A concurrent registration can still slip past the checks above; the
    // unique indexes make it a conflict rather than a server fault.
    let (user_id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, username, password_hash)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(&req.email)
    .bind(&req.username)
    .bind(&password_hash)
    .fetch_one(&mut *tx)
    .await
    .map_err(|err| {
        if is_unique_violation(&err) {
            ApiError::Conflict("this email or username is already registered".to_string())
        } else {
            err.into()
        }
    })?;

    // Every account starts with its Default watchlist, same transaction.
    sqlx::query(
        r#"
        INSERT INTO watchlists (user_id, name, description, color)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(user_id)
    .bind(watchlists::DEFAULT_NAME)
    .bind(watchlists::DEFAULT_DESCRIPTION)
    .bind(watchlists::DEFAULT_COLOR)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    let pair = issue_pair(&state, user_id)?;
    let cookie = cookies::refresh_cookie(&state.settings, &pair.refresh, pair.refresh_expires_at);

    Ok((
        StatusCode::CREATED,
        [(SET_COOKIE, cookie)],
        Json(TokenResponse {
            access_token: pair.access,
            expires_at: pair.refresh_expires_at.timestamp(),
        }),
    ))
}

async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    // Unknown account and wrong password produce the same error.
    let invalid =
        || ApiError::Unauthorized("invalid username/email or password".to_string());

    let user = users::get_by_identifier(&state.db, &req.identifier)
        .await?
        .ok_or_else(invalid)?;

    if !verify_password(req.password, user.password_hash.clone()).await? {
        return Err(invalid());
    }

    let pair = issue_pair(&state, user.id)?;
    let cookie = cookies::refresh_cookie(&state.settings, &pair.refresh, pair.refresh_expires_at);

    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({
            "access_token": pair.access,
            "expires_at": pair.refresh_expires_at.timestamp(),
            "user": UserBody {
                id: user.id,
                username: user.username,
                email: user.email,
            },
        })),
    ))
}

async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = cookies::read_refresh_cookie(&headers).ok_or_else(|| {
        ApiError::Unauthorized("session expired, please log in again".to_string())
    })?;

    let claims = state
        .tokens
        .verify(&token, TokenType::Refresh)
        .map_err(|_| ApiError::Unauthorized("invalid session".to_string()))?;

    if revoked_tokens::is_revoked(&state.db, &hash_token(&token)).await? {
        return Err(ApiError::Unauthorized("session revoked".to_string()));
    }

    // The presented refresh token is deliberately not rotated out: it stays
    // valid until logout or expiry.
    let pair = issue_pair(&state, claims.sub)?;
    let cookie = cookies::refresh_cookie(&state.settings, &pair.refresh, pair.refresh_expires_at);

    Ok((
        [(SET_COOKIE, cookie)],
        Json(TokenResponse {
            access_token: pair.access,
            expires_at: pair.refresh_expires_at.timestamp(),
        }),
    ))
}

async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<impl IntoResponse> {
    let token = cookies::read_refresh_cookie(&headers)
        .ok_or_else(|| ApiError::Unauthorized("no active session".to_string()))?;

    let claims = state
        .tokens
        .verify(&token, TokenType::Refresh)
        .map_err(|_| ApiError::Unauthorized("invalid session".to_string()))?;

    let expires_at = chrono::DateTime::from_timestamp(claims.exp, 0)
        .ok_or(ApiError::Internal)?;

    if let Err(err) =
        revoked_tokens::insert(&state.db, &hash_token(&token), claims.sub, expires_at).await
    {
        if is_unique_violation(&err) {
            return Err(ApiError::Unauthorized("token already revoked".to_string()));
        }
        return Err(err.into());
    }

    let cookie = cookies::clear_refresh_cookie(&state.settings);
    Ok((
        [(SET_COOKIE, cookie)],
        Json(json!({"status": "success", "message": "logged out"})),
    ))
}

async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<Value>> {
    let user = users::get_by_id(&state.db, auth.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("user not found".to_string()))?;

    Ok(Json(json!({
        "user": UserBody {
            id: user.id,
            username: user.username,
            email: user.email,
        },
    })))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .map(|db| db.is_unique_violation())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(email: &str, username: &str, password: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    #[test]
    fn valid_registration_passes() {
        assert!(validate_register(&req("alice@ex.com", "alice", "Passw0rd!")).is_ok());
    }

    #[test]
    fn email_format_is_enforced() {
        assert!(validate_register(&req("not-an-email", "alice", "Passw0rd!")).is_err());
        assert!(validate_register(&req("a@b", "alice", "Passw0rd!")).is_err());
        assert!(validate_register(&req("a b@ex.com", "alice", "Passw0rd!")).is_err());
    }

    #[test]
    fn username_shape_is_enforced() {
        assert!(validate_register(&req("alice@ex.com", "ab", "Passw0rd!")).is_err());
        assert!(validate_register(&req("alice@ex.com", "has space", "Passw0rd!")).is_err());
        assert!(validate_register(&req("alice@ex.com", "dash-ed", "Passw0rd!")).is_err());
        assert!(
            validate_register(&req("alice@ex.com", "a".repeat(25).as_str(), "Passw0rd!")).is_err()
        );
        assert!(validate_register(&req("alice@ex.com", "Alice123", "Passw0rd!")).is_ok());
    }

    #[test]
    fn password_minimum_length() {
        assert!(validate_register(&req("alice@ex.com", "alice", "short")).is_err());
        assert!(validate_register(&req("alice@ex.com", "alice", "12345678")).is_ok());
    }

    #[test]
    fn validation_errors_carry_field_details() {
        let err = validate_register(&req("bad", "x", "pw")).unwrap_err();
        match err {
            ApiError::Validation(_, Some(details)) => {
                let obj = details.as_object().unwrap();
                assert!(obj.contains_key("email"));
                assert!(obj.contains_key("username"));
                assert!(obj.contains_key("password"));
            }
            other => panic!("expected validation error with details, got {other:?}"),
        }
    }
}
