//! Per-request counter and latency recording
//!
//! Labels use the matched route template (`/api/manga/{id}`), never the
//! raw path, to keep metric cardinality bounded.

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use tankobon_common::metrics::RequestMetrics;

/// Middleware: time every request and record its outcome
pub async fn track_requests(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_string());
    let tracker = RequestMetrics::start(request.method().as_str(), &route);

    let response = next.run(request).await;

    tracker.finish(response.status().as_u16());
    response
}
