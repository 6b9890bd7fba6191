use axum::{
    Json,
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::upstream::UpstreamError;

pub const X_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const X_RATELIMIT_RESET: &str = "x-ratelimit-reset";

/// Everything the generation endpoint can answer with besides a completion.
/// Each variant maps to one status code and a JSON body.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    #[error("fingerprint is required")]
    FingerprintMissing,

    #[error("rate limit exceeded, retry in {retry_after}s")]
    RateLimited {
        /// Whole seconds, rounded up.
        retry_after: u64,
        /// Epoch milliseconds at which a slot is expected to free up.
        reset_at_ms: u64,
    },

    #[error(transparent)]
    Upstream(#[from] UpstreamError),
}

pub fn insert_rate_limit_headers(headers: &mut HeaderMap, remaining: u32, reset_at_ms: u64) {
    headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(remaining));
    headers.insert(X_RATELIMIT_RESET, HeaderValue::from(reset_at_ms));
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        match self {
            GatewayError::InvalidBody(detail) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("Invalid request body: {detail}") })),
            )
                .into_response(),

            GatewayError::FingerprintMissing => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Fingerprint is required" })),
            )
                .into_response(),

            GatewayError::RateLimited {
                retry_after,
                reset_at_ms,
            } => {
                let mut res = (
                    StatusCode::TOO_MANY_REQUESTS,
                    Json(json!({
                        "error": "Rate limit exceeded. Try again later.",
                        "retryAfter": retry_after,
                    })),
                )
                    .into_response();
                let headers = res.headers_mut();
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
                insert_rate_limit_headers(headers, 0, reset_at_ms);
                res
            }

            GatewayError::Upstream(UpstreamError::InsufficientCredits { message }) => (
                StatusCode::PAYMENT_REQUIRED,
                Json(json!({ "error": message, "insufficientCredits": true })),
            )
                .into_response(),

            GatewayError::Upstream(UpstreamError::Timeout) => (
                StatusCode::GATEWAY_TIMEOUT,
                Json(json!({
                    "error": "The generation request timed out. Please try again."
                })),
            )
                .into_response(),

            GatewayError::Upstream(UpstreamError::Failed { message, .. }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": message })),
            )
                .into_response(),

            // transport details may carry internal URLs
            GatewayError::Upstream(UpstreamError::Transport(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Failed to reach the completion service" })),
            )
                .into_response(),
        }
    }
}
