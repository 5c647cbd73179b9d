//! Prometheus metrics
//!
//! Counter and histogram names all share one prefix; latency
//! histograms use SLO-aligned buckets so the dashboards can read
//! percentile targets straight off the bucket boundaries.

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Instant;

/// Shared name prefix for every metric this service emits
pub const METRICS_PREFIX: &str = "tankobon";

/// SLO-aligned histogram buckets for request latency (in seconds)
/// Targets: P50 < 50ms, P99 < 250ms
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, // 1ms
    0.005, // 5ms
    0.010, // 10ms
    0.025, // 25ms
    0.050, // 50ms - P50 target
    0.075, // 75ms
    0.100, // 100ms
    0.250, // 250ms - P99 target
    0.500, // 500ms
    1.000, // 1s
    2.500, // 2.5s
    5.000, // 5s
    10.00, // 10s
];

/// Buckets for upload latency (dominated by the object store)
pub const UPLOAD_BUCKETS: &[f64] = &[
    0.050, // 50ms
    0.100, // 100ms
    0.250, // 250ms
    0.500, // 500ms
    1.000, // 1s
    2.000, // 2s
    5.000, // 5s
    10.00, // 10s
    30.00, // 30s
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "HTTP requests handled, labeled by method, route, and status"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Latency from route match to response"
    );

    // Upload metrics
    describe_counter!(
        format!("{}_uploads_total", METRICS_PREFIX),
        Unit::Count,
        "Total objects uploaded to storage"
    );

    describe_counter!(
        format!("{}_upload_bytes_total", METRICS_PREFIX),
        Unit::Bytes,
        "Total bytes uploaded to storage"
    );

    describe_histogram!(
        format!("{}_upload_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Object upload latency in seconds"
    );

    describe_counter!(
        format!("{}_upload_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total failed storage uploads"
    );

    // Ingestion metrics
    describe_counter!(
        format!("{}_chapters_published_total", METRICS_PREFIX),
        Unit::Count,
        "Total chapters published"
    );

    describe_counter!(
        format!("{}_pages_ingested_total", METRICS_PREFIX),
        Unit::Count,
        "Total pages persisted across all chapters"
    );

    // Comment metrics
    describe_counter!(
        format!("{}_comments_created_total", METRICS_PREFIX),
        Unit::Count,
        "Total comments created"
    );

    // Notification metrics
    describe_counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        Unit::Count,
        "Total notification writes attempted"
    );

    describe_counter!(
        format!("{}_notification_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Notification writes that failed and were dropped"
    );

    // Cache metrics
    describe_counter!(
        format!("{}_cache_hits_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache hits"
    );

    describe_counter!(
        format!("{}_cache_misses_total", METRICS_PREFIX),
        Unit::Count,
        "Total cache misses"
    );

    tracing::info!("Metrics registered");
}

/// In-flight request tracker; construct at route match, finish with
/// the response status
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record storage upload metrics
pub fn record_upload(duration_secs: f64, bytes: usize, path: &str, success: bool) {
    if success {
        counter!(
            format!("{}_uploads_total", METRICS_PREFIX),
            "path" => path.to_string()
        )
        .increment(1);

        counter!(
            format!("{}_upload_bytes_total", METRICS_PREFIX),
            "path" => path.to_string()
        )
        .increment(bytes as u64);

        histogram!(
            format!("{}_upload_duration_seconds", METRICS_PREFIX),
            "path" => path.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_upload_errors_total", METRICS_PREFIX),
            "path" => path.to_string()
        )
        .increment(1);
    }
}

/// Helper to record chapter publication
pub fn record_chapter_published(pages: usize) {
    counter!(format!("{}_chapters_published_total", METRICS_PREFIX)).increment(1);
    counter!(format!("{}_pages_ingested_total", METRICS_PREFIX)).increment(pages as u64);
}

/// Helper to record comment creation
pub fn record_comment(is_reply: bool) {
    let kind = if is_reply { "reply" } else { "top_level" };
    counter!(
        format!("{}_comments_created_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);
}

/// Helper to record a notification write attempt
pub fn record_notification(kind: &str, success: bool) {
    counter!(
        format!("{}_notifications_total", METRICS_PREFIX),
        "kind" => kind.to_string()
    )
    .increment(1);

    if !success {
        counter!(
            format!("{}_notification_failures_total", METRICS_PREFIX),
            "kind" => kind.to_string()
        )
        .increment(1);
    }
}

/// Helper to record cache metrics
pub fn record_cache(hit: bool, cache_name: &str) {
    if hit {
        counter!(
            format!("{}_cache_hits_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    } else {
        counter!(
            format!("{}_cache_misses_total", METRICS_PREFIX),
            "cache" => cache_name.to_string()
        )
        .increment(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_buckets() {
        // Verify buckets are sorted and contain SLO targets
        let mut prev = 0.0;
        for &bucket in LATENCY_BUCKETS {
            assert!(bucket > prev);
            prev = bucket;
        }

        // P50 target (50ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.050));
        // P99 target (250ms) should be in buckets
        assert!(LATENCY_BUCKETS.contains(&0.250));
    }

    #[test]
    fn test_request_metrics() {
        let metrics = RequestMetrics::start("GET", "/api/manga");
        std::thread::sleep(std::time::Duration::from_millis(10));
        metrics.finish(200);
        // Just verify it runs without panic
    }

    #[test]
    fn test_record_helpers_do_not_panic() {
        record_upload(0.2, 1024, "proxied", true);
        record_upload(0.2, 0, "proxied", false);
        record_chapter_published(3);
        record_comment(true);
        record_notification("comment_reply", false);
        record_cache(true, "manga");
    }
}
