//! Tankobon API Gateway
//!
//! Single binary serving the HTTP JSON API: accounts, manga, chapters,
//! comments, notifications, tag facets, and the two upload
//! sub-protocols. Cross-cutting concerns (request ids, tracing,
//! timeouts, rate limiting, metrics) are composed as tower layers
//! around the routed handlers.

mod handlers;
mod middleware;

use axum::{
    extract::{DefaultBodyLimit, FromRef},
    middleware as axum_middleware,
    routing::{delete, get, patch, post, put},
    Router,
};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::sync::Arc;
use tankobon_common::{
    auth::JwtManager,
    cache::Cache,
    config::AppConfig,
    db::DbPool,
    metrics,
    storage::S3Store,
};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub storage: Arc<S3Store>,
    pub jwt: Arc<JwtManager>,
    pub cache: Option<Arc<Cache>>,
}

impl FromRef<AppState> for Arc<JwtManager> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt.clone()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let config = Arc::new(AppConfig::load()?);

    init_tracing(&config);
    info!("Starting Tankobon API Gateway v{}", tankobon_common::VERSION);

    // Prometheus exporter with SLO-aligned buckets
    if config.observability.metrics_port > 0 {
        let addr = SocketAddr::from(([0, 0, 0, 0], config.observability.metrics_port));
        PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("request_duration_seconds".to_string()),
                metrics::LATENCY_BUCKETS,
            )?
            .set_buckets_for_metric(
                Matcher::Suffix("upload_duration_seconds".to_string()),
                metrics::UPLOAD_BUCKETS,
            )?
            .with_http_listener(addr)
            .install()?;
        info!("Metrics exporter listening on {}", addr);
    }
    metrics::register_metrics();

    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    let storage = Arc::new(S3Store::new(config.storage.clone()).await?);

    let jwt = Arc::new(JwtManager::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_secs,
    ));

    // Cache is optional; a dead Redis downgrades to uncached reads
    let cache = match config.redis.url {
        Some(ref url) => match Cache::connect(url, &config.observability.service_name).await {
            Ok(cache) => Some(Arc::new(cache)),
            Err(e) => {
                warn!(error = %e, "Redis unavailable, continuing without cache");
                None
            }
        },
        None => None,
    };

    let state = AppState {
        config: config.clone(),
        db,
        storage,
        jwt,
        cache,
    };

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Env-filtered tracing; RUST_LOG beats the configured level
fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));

    if config.observability.json_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // The proxied upload route carries whole page images
    let upload_body_limit = state.config.storage.max_page_bytes + 64 * 1024;

    // API routes
    let api_routes = Router::new()
        // User endpoints
        .route("/users/register", post(handlers::users::register))
        .route("/users/login", post(handlers::users::login))
        .route("/users/me", get(handlers::users::me))
        .route("/users/me/favorites", get(handlers::users::list_favorites))
        .route(
            "/users/me/favorites/{manga_id}",
            put(handlers::users::add_favorite),
        )
        .route(
            "/users/me/favorites/{manga_id}",
            delete(handlers::users::remove_favorite),
        )
        // Manga endpoints
        .route("/manga", post(handlers::manga::create_manga))
        .route("/manga", get(handlers::manga::list_manga))
        .route("/manga/{id}", get(handlers::manga::get_manga))
        .route("/manga/{id}", patch(handlers::manga::update_manga))
        .route("/manga/{id}", delete(handlers::manga::delete_manga))
        // Chapter endpoints
        .route(
            "/manga/{id}/chapters",
            post(handlers::chapters::create_chapter),
        )
        .route(
            "/manga/{id}/chapters",
            get(handlers::chapters::list_chapters),
        )
        .route("/chapters/{id}", get(handlers::chapters::get_chapter))
        .route("/chapters/{id}", delete(handlers::chapters::delete_chapter))
        // Comment endpoints
        .route("/comments", post(handlers::comments::create_comment))
        .route("/comments", get(handlers::comments::list_comments))
        .route(
            "/comments/{id}/replies",
            get(handlers::comments::list_replies),
        )
        .route("/comments/{id}", patch(handlers::comments::update_comment))
        .route("/comments/{id}", delete(handlers::comments::delete_comment))
        .route(
            "/comments/{id}/reaction",
            put(handlers::comments::set_reaction),
        )
        .route(
            "/comments/{id}/reaction",
            delete(handlers::comments::clear_reaction),
        )
        // Notification endpoints
        .route(
            "/notifications",
            get(handlers::notifications::list_notifications),
        )
        .route(
            "/notifications/{id}/read",
            post(handlers::notifications::mark_read),
        )
        .route(
            "/notifications/read-all",
            post(handlers::notifications::mark_all_read),
        )
        .route(
            "/notifications/unread-count",
            get(handlers::notifications::unread_count),
        )
        // Tag facets
        .route("/tags", get(handlers::tags::list_tags))
        // Upload endpoints
        .route("/uploads/presign", post(handlers::uploads::presign_upload))
        .route(
            "/uploads",
            post(handlers::uploads::proxied_upload)
                .layer(DefaultBodyLimit::max(upload_body_limit)),
        );

    // Compose the app. Request tracking rides a route_layer so the
    // matched route template is available as its label.
    let mut app = Router::new()
        // Health endpoints (no auth, outside /api)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .route_layer(axum_middleware::from_fn(
            middleware::telemetry::track_requests,
        ));

    if state.config.rate_limit.enabled {
        let limiter = middleware::rate_limit::ApiRateLimiter::new(
            state.config.rate_limit.requests_per_second,
            state.config.rate_limit.burst,
        );
        app = app.layer(axum_middleware::from_fn(
            move |request: axum::extract::Request, next: axum_middleware::Next| {
                let limiter = limiter.clone();
                async move {
                    middleware::rate_limit::rate_limit_middleware(request, next, limiter).await
                }
            },
        ));
    }

    app.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(cors)
            .layer(TimeoutLayer::new(state.config.request_timeout()))
            .layer(CompressionLayer::new()),
    )
    .with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
