use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use serde_json::Value;

/// Error surfaced to clients as `{status, message, details?}`.
///
/// Internal detail never reaches the `message` field; it is logged inside
/// the request span, which carries the request id.
#[derive(Debug)]
pub enum ApiError {
    /// 400; optionally carries per-field details.
    Validation(String, Option<Value>),
    /// 422: well-formed input that fails semantic checks.
    Unprocessable(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    ServiceUnavailable(String),
    Internal,
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into(), None)
    }

    pub fn validation_with(message: impl Into<String>, details: Value) -> Self {
        ApiError::Validation(message.into(), Some(details))
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message, details) = match self {
            ApiError::Validation(msg, details) => (StatusCode::BAD_REQUEST, msg, details),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg, None),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg, None),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
                None,
            ),
        };

        (
            status,
            Json(ErrorBody {
                status: status.as_u16(),
                message,
                details,
            }),
        )
            .into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!(error = %err, "database error");
        ApiError::Internal
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    fn rt() -> tokio::runtime::Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = to_bytes(resp.into_body(), 4096).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn validation_maps_to_400() {
        rt().block_on(async {
            let resp = ApiError::validation("invalid input data").into_response();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
            let json = body_json(resp).await;
            assert_eq!(json["status"], 400);
            assert_eq!(json["message"], "invalid input data");
            assert!(json.get("details").is_none());
        });
    }

    #[test]
    fn validation_details_are_serialized() {
        rt().block_on(async {
            let resp = ApiError::validation_with(
                "invalid input data",
                serde_json::json!({"password": "must be at least 8 characters"}),
            )
            .into_response();
            let json = body_json(resp).await;
            assert_eq!(json["details"]["password"], "must be at least 8 characters");
        });
    }

    #[test]
    fn conflict_maps_to_409() {
        rt().block_on(async {
            let resp =
                ApiError::Conflict("this email is already registered".to_string()).into_response();
            assert_eq!(resp.status(), StatusCode::CONFLICT);
            let json = body_json(resp).await;
            assert_eq!(json["message"], "this email is already registered");
        });
    }

    #[test]
    fn unauthorized_maps_to_401() {
        rt().block_on(async {
            let resp = ApiError::Unauthorized("invalid token".to_string()).into_response();
            assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
        });
    }

    #[test]
    fn not_found_maps_to_404() {
        rt().block_on(async {
            let resp = ApiError::NotFound("watchlist not found".to_string()).into_response();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        });
    }

    #[test]
    fn unprocessable_maps_to_422() {
        rt().block_on(async {
            let resp =
                ApiError::Unprocessable("invalid channel identifier".to_string()).into_response();
            assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        });
    }

    #[test]
    fn service_unavailable_maps_to_503() {
        rt().block_on(async {
            let resp = ApiError::ServiceUnavailable("upstream unavailable".to_string())
                .into_response();
            assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
        });
    }

    #[test]
    fn internal_error_hides_detail() {
        rt().block_on(async {
            let resp = ApiError::Internal.into_response();
            assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let json = body_json(resp).await;
            assert_eq!(json["message"], "internal server error");
        });
    }
}
