//! Liveness and readiness probes

use crate::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use std::future::Future;
use std::time::Instant;
use tankobon_common::errors::Result;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub database: Probe,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<Probe>,
}

/// Outcome of one dependency check
#[derive(Serialize)]
pub struct Probe {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Probe {
    async fn run<F>(check: F) -> Self
    where
        F: Future<Output = Result<()>>,
    {
        let start = Instant::now();
        match check.await {
            Ok(()) => Probe {
                status: "up",
                latency_ms: Some(start.elapsed().as_millis() as u64),
                error: None,
            },
            Err(e) => Probe {
                status: "down",
                latency_ms: None,
                error: Some(e.to_string()),
            },
        }
    }

    fn is_up(&self) -> bool {
        self.status == "up"
    }
}

/// Liveness: the process is serving requests
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: tankobon_common::VERSION,
    })
}

/// Readiness: dependency checks. The cache is reported but never gates
/// readiness; the service runs without it.
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let database = Probe::run(state.db.ping()).await;

    let cache = match state.cache {
        Some(ref cache) => Some(Probe::run(cache.ping()).await),
        None => None,
    };

    Json(ReadyResponse {
        status: if database.is_up() { "ready" } else { "not_ready" },
        database,
        cache,
    })
}
