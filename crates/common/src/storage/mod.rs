//! Object storage adapter
//!
//! Provides:
//! - S3 client wrapper for page/cover media
//! - Presigned PUT handshake (client uploads directly to the bucket)
//! - Server-proxied uploads behind a single `UploadStrategy` trait
//! - Retry as a composed decorator, not inline catch blocks
//!
//! Size and MIME validation happen here, server-side, for every path;
//! a client that skips its own checks gains nothing.

use crate::config::StorageConfig;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

/// A file handed to the adapter for server-proxied upload
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file_name: String,
    pub content_type: String,
    /// Logical folder, e.g. "pages" or "covers"
    pub folder: String,
    pub bytes: Vec<u8>,
}

/// A stored object and where it is publicly served from
#[derive(Debug, Clone, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub public_url: String,
    pub size: usize,
    pub content_type: String,
}

/// Presigned PUT handshake response
#[derive(Debug, Clone, Serialize)]
pub struct PresignedUpload {
    pub key: String,
    pub url: String,
    pub public_url: String,
    pub expires_in_secs: u64,
}

/// One way of getting bytes into the store
#[async_trait]
pub trait UploadStrategy: Send + Sync {
    async fn upload(&self, request: UploadRequest) -> Result<StoredObject>;
}

/// S3-backed media store
#[derive(Clone)]
pub struct S3Store {
    client: S3Client,
    config: StorageConfig,
}

impl S3Store {
    /// Create a store from configuration, honoring a custom endpoint
    /// for S3-compatible backends
    pub async fn new(config: StorageConfig) -> Result<Self> {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()))
            .load()
            .await;

        let client = match config.endpoint {
            Some(ref endpoint) => {
                let conf = aws_sdk_s3::config::Builder::from(&shared)
                    .endpoint_url(endpoint)
                    .force_path_style(true)
                    .build();
                S3Client::from_conf(conf)
            }
            None => S3Client::new(&shared),
        };

        Ok(Self { client, config })
    }

    /// Create with an existing client
    pub fn with_client(client: S3Client, config: StorageConfig) -> Self {
        Self { client, config }
    }

    /// Server-side validation applied to every upload path
    pub fn validate(&self, content_type: &str, size: usize) -> Result<()> {
        if !self
            .config
            .allowed_content_types
            .iter()
            .any(|allowed| allowed == content_type)
        {
            return Err(AppError::UnsupportedMediaType {
                content_type: content_type.to_string(),
            });
        }

        if size > self.config.max_page_bytes {
            return Err(AppError::PayloadTooLarge {
                size,
                limit: self.config.max_page_bytes,
            });
        }

        Ok(())
    }

    /// Build the object key: folder/uuid-sanitizedname
    pub fn object_key(&self, folder: &str, file_name: &str) -> String {
        format!(
            "{}/{}-{}",
            folder.trim_matches('/'),
            Uuid::new_v4(),
            sanitize_file_name(file_name)
        )
    }

    /// Public URL an object is served from
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/{}",
            self.config.public_base_url.trim_end_matches('/'),
            key
        )
    }

    /// Issue a presigned PUT for direct client upload. MIME is checked
    /// here; the size cap is enforced by the bucket policy and
    /// re-checked when the chapter registers its pages.
    pub async fn presign_put(
        &self,
        file_name: &str,
        content_type: &str,
        folder: &str,
    ) -> Result<PresignedUpload> {
        self.validate(content_type, 0)?;

        let key = self.object_key(folder, file_name);
        let expires_in_secs = self.config.presign_expiry_secs;

        let presigning = PresigningConfig::expires_in(Duration::from_secs(expires_in_secs))
            .map_err(|e| AppError::Configuration {
                message: format!("Invalid presign expiry: {}", e),
            })?;

        let request = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(content_type)
            .presigned(presigning)
            .await
            .map_err(|e| AppError::Storage {
                message: format!("Failed to presign upload: {}", e),
            })?;

        debug!(key = %key, expires_in_secs, "Presigned upload issued");

        Ok(PresignedUpload {
            public_url: self.public_url(&key),
            url: request.uri().to_string(),
            key,
            expires_in_secs,
        })
    }
}

#[async_trait]
impl UploadStrategy for S3Store {
    /// Server-proxied upload path
    async fn upload(&self, request: UploadRequest) -> Result<StoredObject> {
        self.validate(&request.content_type, request.bytes.len())?;

        let key = self.object_key(&request.folder, &request.file_name);
        let size = request.bytes.len();
        let timeout = Duration::from_secs(self.config.timeout_secs);

        let put = self
            .client
            .put_object()
            .bucket(&self.config.bucket)
            .key(&key)
            .content_type(&request.content_type)
            .body(ByteStream::from(request.bytes))
            .send();

        match tokio::time::timeout(timeout, put).await {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                return Err(AppError::Storage {
                    message: format!("Upload failed: {}", e),
                })
            }
            Err(_) => {
                return Err(AppError::StorageTimeout {
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }

        debug!(key = %key, size, "Object stored");

        Ok(StoredObject {
            public_url: self.public_url(&key),
            key,
            size,
            content_type: request.content_type,
        })
    }
}

/// Retry decorator over any strategy. Only upstream storage failures
/// are retried; validation rejections are permanent.
pub struct RetryingUploader<U> {
    inner: U,
    max_retries: u32,
}

impl<U> RetryingUploader<U> {
    pub fn new(inner: U, max_retries: u32) -> Self {
        Self { inner, max_retries }
    }
}

#[async_trait]
impl<U: UploadStrategy> UploadStrategy for RetryingUploader<U> {
    async fn upload(&self, request: UploadRequest) -> Result<StoredObject> {
        let mut backoff = ExponentialBackoff {
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        };
        let mut attempt = 0u32;

        loop {
            match self.inner.upload(request.clone()).await {
                Ok(stored) => return Ok(stored),
                Err(err @ (AppError::Storage { .. } | AppError::StorageTimeout { .. }))
                    if attempt < self.max_retries =>
                {
                    attempt += 1;
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| Duration::from_secs(1));
                    warn!(
                        error = %err,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Upload failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Keep [a-zA-Z0-9._-], replace the rest, collapse to lowercase
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "file".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn test_config() -> StorageConfig {
        StorageConfig {
            bucket: "test-bucket".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            public_base_url: "https://media.example.com/".to_string(),
            presign_expiry_secs: 900,
            max_page_bytes: 1024,
            allowed_content_types: vec!["image/png".to_string(), "image/jpeg".to_string()],
            max_retries: 3,
            timeout_secs: 5,
        }
    }

    fn test_store() -> S3Store {
        let conf = aws_sdk_s3::config::Builder::new()
            .behavior_version(aws_sdk_s3::config::BehaviorVersion::latest())
            .build();
        S3Store::with_client(S3Client::from_conf(conf), test_config())
    }

    #[test]
    fn test_validate_rejects_bad_mime() {
        let store = test_store();
        let err = store.validate("application/pdf", 10).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType { .. }));
    }

    #[test]
    fn test_validate_rejects_oversize() {
        let store = test_store();
        let err = store.validate("image/png", 4096).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge { .. }));
        assert!(store.validate("image/png", 1024).is_ok());
    }

    #[test]
    fn test_object_key_and_public_url() {
        let store = test_store();
        let key = store.object_key("pages/", "My Page (1).PNG");
        assert!(key.starts_with("pages/"));
        assert!(key.ends_with("-my-page--1-.png"));

        let url = store.public_url("pages/abc.png");
        assert_eq!(url, "https://media.example.com/pages/abc.png");
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("Page 01.PNG"), "page-01.png");
        assert_eq!(sanitize_file_name("///"), "---");
        assert_eq!(sanitize_file_name(""), "file");
    }

    struct FlakyStrategy {
        calls: Arc<AtomicU32>,
        fail_times: u32,
    }

    #[async_trait]
    impl UploadStrategy for FlakyStrategy {
        async fn upload(&self, request: UploadRequest) -> Result<StoredObject> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.fail_times {
                Err(AppError::Storage {
                    message: "transient".to_string(),
                })
            } else {
                Ok(StoredObject {
                    key: "k".to_string(),
                    public_url: "u".to_string(),
                    size: request.bytes.len(),
                    content_type: request.content_type,
                })
            }
        }
    }

    fn page_request() -> UploadRequest {
        UploadRequest {
            file_name: "p.png".to_string(),
            content_type: "image/png".to_string(),
            folder: "pages".to_string(),
            bytes: vec![1, 2, 3],
        }
    }

    #[tokio::test]
    async fn test_retry_recovers_from_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let uploader = RetryingUploader::new(
            FlakyStrategy {
                calls: calls.clone(),
                fail_times: 2,
            },
            3,
        );

        let stored = uploader.upload(page_request()).await.unwrap();
        assert_eq!(stored.size, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let uploader = RetryingUploader::new(
            FlakyStrategy {
                calls: calls.clone(),
                fail_times: 10,
            },
            2,
        );

        let err = uploader.upload(page_request()).await.unwrap_err();
        assert!(matches!(err, AppError::Storage { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_validation_failures_are_permanent() {
        // A decorated store still rejects bad MIME without retrying
        struct RejectingStrategy {
            calls: Arc<AtomicU32>,
        }

        #[async_trait]
        impl UploadStrategy for RejectingStrategy {
            async fn upload(&self, request: UploadRequest) -> Result<StoredObject> {
                self.calls.fetch_add(1, Ordering::SeqCst);
                Err(AppError::UnsupportedMediaType {
                    content_type: request.content_type,
                })
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        let uploader = RetryingUploader::new(RejectingStrategy { calls: calls.clone() }, 5);

        let err = uploader.upload(page_request()).await.unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
