mod config;
mod domain;
mod error;
mod handlers;
mod identity;
mod metrics;
mod models;
mod rate_limit;
mod state;
mod upstream;

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::config::Args;
use crate::rate_limit::{RateLimiter, sweep_idle_identities};
use crate::state::AppState;
use crate::upstream::UpstreamClient;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // parse cli arguments
    let args = Args::parse();
    args.validate()?;

    if args.fingerprint_salt.is_empty() {
        tracing::warn!("FINGERPRINT_SALT is empty, identities are plain fingerprint hashes");
    }

    let policy = args.window_policy();
    let rate_limiter = Arc::new(RateLimiter::in_memory(policy));

    let upstream = UpstreamClient::new(
        reqwest::Client::new(),
        args.upstream_url.clone(),
        args.api_key.clone(),
        args.model.clone(),
        Duration::from_secs(args.upstream_timeout),
    );

    // creating shared state
    let state = Arc::new(AppState {
        upstream,
        rate_limiter: Arc::clone(&rate_limiter),
        fingerprint_salt: args.fingerprint_salt.clone(),
        domains: args.domain_resolver(),
        brands: args.brands(),
    });

    // spawn the idle identity sweeper
    tokio::spawn(sweep_idle_identities(
        rate_limiter,
        Duration::from_secs(args.sweep_interval.max(1)),
    ));

    let app = handlers::router(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!(
        port = args.port,
        upstream = %args.upstream_url,
        model = %args.model,
        deadline_secs = args.upstream_timeout,
        "gateway listening"
    );
    tracing::info!(
        max_requests = policy.max_requests,
        window_ms = policy.window_ms,
        "rate limit per identity"
    );

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
