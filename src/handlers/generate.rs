use axum::{
    Extension, Json,
    extract::{State, rejection::JsonRejection},
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use std::time::Instant;

use crate::domain::{Brand, DomainInfo};
use crate::error::{GatewayError, insert_rate_limit_headers};
use crate::identity::Identity;
use crate::metrics::{OPERATOR_ALERTS, RATE_LIMITED, REQUEST_TOTAL, UPSTREAM_FAILURES, UPSTREAM_LATENCY};
use crate::models::GenerateRequest;
use crate::rate_limit::epoch_millis;
use crate::state::AppState;
use crate::upstream::UpstreamError;

/// `POST /api/generate`
///
/// Hashes the client fingerprint into an [`Identity`], runs it through the
/// rate limiter and forwards admitted requests upstream. Every outcome,
/// including failures, is answered with JSON; the rate limit headers are
/// attached to successes and to throttled responses. Expects the brand
/// middleware to have run.
pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    Extension(domain): Extension<DomainInfo>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Response, GatewayError> {
    REQUEST_TOTAL.inc();

    let Json(payload) = payload.map_err(|rejection| GatewayError::InvalidBody(rejection.body_text()))?;

    let fingerprint = payload
        .fingerprint
        .as_deref()
        .map(str::trim)
        .filter(|fp| !fp.is_empty())
        .ok_or(GatewayError::FingerprintMissing)?;

    let identity = Identity::from_fingerprint(fingerprint, &state.fingerprint_salt);

    let decision = state.rate_limiter.check(identity.as_str());
    let reset_at_ms = epoch_millis().saturating_add(decision.reset_ms);

    if !decision.allowed {
        RATE_LIMITED.inc();
        tracing::info!(
            identity = identity.short(),
            reset_ms = decision.reset_ms,
            "rate limit exceeded"
        );
        return Err(GatewayError::RateLimited {
            retry_after: decision.reset_ms.div_ceil(1_000),
            reset_at_ms,
        });
    }

    tracing::debug!(
        identity = identity.short(),
        remaining = decision.remaining,
        "request admitted"
    );

    let api_key = state
        .brands
        .get(domain.brand)
        .api_key
        .as_deref()
        .unwrap_or(state.upstream.default_api_key());

    let start_time = Instant::now();
    let result = state.upstream.complete(&payload, api_key).await;
    UPSTREAM_LATENCY.observe(start_time.elapsed().as_secs_f64());

    match result {
        Ok(completion) => {
            if let Some(usage) = &completion.usage {
                tracing::info!(
                    identity = identity.short(),
                    prompt_tokens = usage.prompt_tokens,
                    completion_tokens = usage.completion_tokens,
                    total_tokens = usage.total_tokens,
                    "completion served"
                );
            }

            let mut response = Json(completion).into_response();
            insert_rate_limit_headers(response.headers_mut(), decision.remaining, reset_at_ms);
            Ok(response)
        }
        Err(err) => {
            match &err {
                UpstreamError::InsufficientCredits { message } => {
                    UPSTREAM_FAILURES.with_label_values(&["insufficient_credits"]).inc();
                    alert_operator(&state, domain.brand, message);
                }
                UpstreamError::Timeout => {
                    UPSTREAM_FAILURES.with_label_values(&["timeout"]).inc();
                    tracing::warn!(
                        identity = identity.short(),
                        deadline = ?state.upstream.deadline(),
                        "upstream call timed out"
                    );
                }
                UpstreamError::Failed { status, message } => {
                    UPSTREAM_FAILURES.with_label_values(&["failed"]).inc();
                    tracing::error!(
                        identity = identity.short(),
                        status,
                        upstream_message = %message,
                        "upstream call failed"
                    );
                }
                UpstreamError::Transport(source) => {
                    UPSTREAM_FAILURES.with_label_values(&["transport"]).inc();
                    tracing::error!(identity = identity.short(), error = %source, "upstream unreachable");
                }
            }
            Err(err.into())
        }
    }
}

// Credits run out only through billing, so someone has to be told
fn alert_operator(state: &AppState, brand: Brand, message: &str) {
    OPERATOR_ALERTS.inc();
    let settings = state.brands.get(brand);
    tracing::error!(
        target: "operator_alert",
        brand = brand.slug(),
        display_name = %settings.display_name,
        notify = settings.notification_email.as_deref().unwrap_or("<unset>"),
        upstream_message = %message,
        "upstream credits exhausted"
    );
}
