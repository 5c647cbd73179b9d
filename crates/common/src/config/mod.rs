//! Layered configuration
//!
//! Settings merge in order: `config/default`, then `config/{APP_ENV}`,
//! then `config/local`, then `APP__`-prefixed environment variables
//! (`APP__SERVER__PORT=8081`). Sections whose every field has a sane
//! default may be omitted from the files entirely; `database`,
//! `storage`, and `auth` must be provided.

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the service
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    pub database: DatabaseConfig,

    pub storage: StorageConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    pub auth: AuthConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// Listen port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Budget for one request before the gateway gives up on it
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Primary URL; all writes land here
    pub url: String,

    /// Optional read replica; reads fall back to the primary without it
    pub read_url: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Bucket holding page images, covers, and avatars
    pub bucket: String,

    #[serde(default = "default_region")]
    pub region: String,

    /// Endpoint override for S3-compatible stores and local testing
    pub endpoint: Option<String>,

    /// Base URL uploaded objects are publicly served from
    pub public_base_url: String,

    /// Lifetime of a presigned PUT
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,

    /// Hard cap on one page image
    #[serde(default = "default_max_page_bytes")]
    pub max_page_bytes: usize,

    /// MIME allow-list for page and cover uploads
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,

    /// Retry budget for transient store failures
    #[serde(default = "default_storage_retries")]
    pub max_retries: u32,

    /// Per-attempt timeout against the store
    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RedisConfig {
    /// Absent disables caching altogether
    pub url: Option<String>,

    #[serde(default = "default_redis_ttl")]
    pub default_ttl_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AuthConfig {
    /// HMAC secret for token signing
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Prometheus exporter port; 0 disables the exporter
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Also namespaces cache keys
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    pub requests_per_second: u32,

    pub burst: u32,

    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 50,
            burst: 100,
            enabled: true,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_request_timeout() -> u64 {
    30
}
fn default_max_connections() -> u32 {
    50
}
fn default_min_connections() -> u32 {
    5
}
fn default_connect_timeout() -> u64 {
    10
}
fn default_idle_timeout() -> u64 {
    300
}
fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_presign_expiry() -> u64 {
    900
}
fn default_max_page_bytes() -> usize {
    10 * 1024 * 1024
}
fn default_allowed_content_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/webp".to_string(),
    ]
}
fn default_storage_retries() -> u32 {
    3
}
fn default_storage_timeout() -> u64 {
    30
}
fn default_redis_ttl() -> u64 {
    300
}
fn default_jwt_expiration() -> u64 {
    86400
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_json_logging() -> bool {
    true
}
fn default_metrics_port() -> u16 {
    9090
}
fn default_service_name() -> String {
    "tankobon".to_string()
}

impl AppConfig {
    /// Merge the file layers and environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Read-side database URL, falling back to the primary
    pub fn read_database_url(&self) -> &str {
        self.database
            .read_url
            .as_deref()
            .unwrap_or(&self.database.url)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            database: DatabaseConfig {
                url: "postgres://localhost/tankobon".to_string(),
                read_url: None,
                max_connections: default_max_connections(),
                min_connections: default_min_connections(),
                connect_timeout_secs: default_connect_timeout(),
                idle_timeout_secs: default_idle_timeout(),
            },
            storage: StorageConfig {
                bucket: "tankobon-media".to_string(),
                region: default_region(),
                endpoint: None,
                public_base_url: "https://media.tankobon.local".to_string(),
                presign_expiry_secs: default_presign_expiry(),
                max_page_bytes: default_max_page_bytes(),
                allowed_content_types: default_allowed_content_types(),
                max_retries: default_storage_retries(),
                timeout_secs: default_storage_timeout(),
            },
            redis: RedisConfig::default(),
            auth: AuthConfig {
                jwt_secret: "development-secret".to_string(),
                jwt_expiration_secs: default_jwt_expiration(),
            },
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.storage.max_page_bytes, 10 * 1024 * 1024);
        assert!(config
            .storage
            .allowed_content_types
            .contains(&"image/png".to_string()));
        assert!(config.redis.url.is_none());
    }

    #[test]
    fn test_read_database_fallback() {
        let mut config = AppConfig::default();
        assert_eq!(config.read_database_url(), "postgres://localhost/tankobon");

        config.database.read_url = Some("postgres://replica/tankobon".to_string());
        assert_eq!(config.read_database_url(), "postgres://replica/tankobon");
    }

    #[test]
    fn test_request_timeout_duration() {
        let config = AppConfig::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }
}
