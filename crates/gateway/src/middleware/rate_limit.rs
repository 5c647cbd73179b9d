//! Admission control for the public API
//!
//! A single process-wide token bucket. Rejections use the same typed
//! error envelope as every other failure, so clients see
//! `RATE_LIMITED` rather than a bare status line.

use axum::{extract::Request, middleware::Next, response::{IntoResponse, Response}};
use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;
use tankobon_common::errors::AppError;

/// Process-wide token bucket
pub struct ApiRateLimiter {
    bucket: RateLimiter<NotKeyed, InMemoryState, QuantaClock>,
    limit: u32,
}

impl ApiRateLimiter {
    /// Build a bucket refilling at `requests_per_second` with `burst`
    /// headroom. Zero values are treated as one; a misconfigured
    /// limiter must not panic the gateway.
    pub fn new(requests_per_second: u32, burst: u32) -> Arc<Self> {
        let per_second = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);

        Arc::new(Self {
            bucket: RateLimiter::direct(Quota::per_second(per_second).allow_burst(burst)),
            limit: requests_per_second.max(1),
        })
    }

    fn admit(&self) -> Result<(), AppError> {
        self.bucket
            .check()
            .map_err(|_| AppError::RateLimited { limit: self.limit })
    }
}

/// Middleware: admit or reject before any handler runs
pub async fn rate_limit_middleware(
    request: Request,
    next: Next,
    limiter: Arc<ApiRateLimiter>,
) -> Response {
    match limiter.admit() {
        Ok(()) => next.run(request).await,
        Err(err) => err.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admits_within_quota() {
        let limiter = ApiRateLimiter::new(100, 200);
        assert!(limiter.admit().is_ok());
    }

    #[test]
    fn test_burst_exhaustion_rejects() {
        let limiter = ApiRateLimiter::new(1, 1);
        assert!(limiter.admit().is_ok());
        let err = limiter.admit().unwrap_err();
        assert!(matches!(err, AppError::RateLimited { limit: 1 }));
    }

    #[test]
    fn test_zero_config_clamps_to_one() {
        let limiter = ApiRateLimiter::new(0, 0);
        assert!(limiter.admit().is_ok());
    }
}
