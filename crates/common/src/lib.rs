//! Tankobon Common Library
//!
//! Shared code for the tankobon content-hosting service including:
//! - Database entities and repository patterns
//! - Object storage adapter (presigned and proxied uploads)
//! - Error types and handling
//! - Configuration management
//! - Authentication utilities
//! - Notification fan-out
//! - Metrics and observability

pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod errors;
pub mod metrics;
pub mod notify;
pub mod storage;

// Re-export commonly used types
pub use config::AppConfig;
pub use db::{DbPool, Repository};
pub use errors::{AppError, Result};
pub use storage::S3Store;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Hard ceiling on pages accepted for a single chapter
pub const MAX_PAGES_PER_CHAPTER: usize = 200;

/// Upper bound accepted for the listing `limit` parameter
pub const MAX_PAGE_LIMIT: u64 = 100;

/// Upper bound accepted for the listing `page` parameter; keeps offset
/// arithmetic far from u64 overflow
pub const MAX_PAGE_INDEX: u64 = 1_000_000;
