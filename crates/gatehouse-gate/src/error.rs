use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors surfaced while proxying an allowed request.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("invalid upstream uri: {0}")]
    Uri(#[from] http::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[from] hyper_util::client::legacy::Error),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_GATEWAY, "Bad Gateway").into_response()
    }
}
