use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::Instrument;
use uuid::Uuid;

/// Assigns every request a v4 UUID, carried through the tracing span and
/// echoed back in `X-Request-ID`.
pub async fn request_id(req: Request<Body>, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();
    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %req.method(),
        path = %req.uri().path(),
    );
    let mut resp = next.run(req).instrument(span).await;
    if let Ok(value) = request_id.parse() {
        resp.headers_mut().insert("X-Request-ID", value);
    }
    resp
}
