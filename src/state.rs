use std::sync::Arc;

use crate::domain::{Brands, DomainResolver};
use crate::rate_limit::RateLimiter;
use crate::upstream::UpstreamClient;

// app's shared state
pub struct AppState {
    pub upstream: UpstreamClient,
    pub rate_limiter: Arc<RateLimiter>,
    pub fingerprint_salt: String, // mixed into every identity hash
    pub domains: DomainResolver,
    pub brands: Brands,
}
