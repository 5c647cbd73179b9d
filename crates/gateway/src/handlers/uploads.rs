//! Upload handlers
//!
//! Two sub-protocols reach the object store:
//! 1. Presigned handshake: the client asks for a time-limited PUT URL,
//!    uploads directly to the bucket, then registers page metadata via
//!    the chapter endpoint.
//! 2. Server-proxied: multipart POST; the gateway validates and
//!    forwards the bytes through the retrying upload strategy.
//!
//! MIME and size limits are enforced server-side on both paths.

use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use validator::Validate;

use crate::AppState;
use tankobon_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    metrics,
    storage::{PresignedUpload, RetryingUploader, StoredObject, UploadRequest, UploadStrategy},
};

/// Folders a client may target
const ALLOWED_FOLDERS: &[&str] = &["pages", "covers", "avatars"];

/// Request for a presigned PUT
#[derive(Debug, Deserialize, Validate)]
pub struct PresignRequest {
    #[validate(length(min = 1, max = 200))]
    pub file_name: String,

    #[validate(length(min = 1, max = 100))]
    pub content_type: String,

    #[serde(default = "default_folder")]
    pub folder: String,
}

fn default_folder() -> String {
    "pages".to_string()
}

fn validate_folder(folder: &str) -> Result<()> {
    if ALLOWED_FOLDERS.contains(&folder) {
        Ok(())
    } else {
        Err(AppError::Validation {
            message: format!("folder must be one of {:?}", ALLOWED_FOLDERS),
            field: Some("folder".to_string()),
        })
    }
}

/// Issue a presigned PUT URL for direct upload
pub async fn presign_upload(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<PresignRequest>,
) -> Result<Json<PresignedUpload>> {
    request.validate()?;
    validate_folder(&request.folder)?;

    let presigned = state
        .storage
        .presign_put(&request.file_name, &request.content_type, &request.folder)
        .await?;

    tracing::info!(
        user_id = %auth.user_id,
        key = %presigned.key,
        folder = %request.folder,
        "Presigned upload issued"
    );

    Ok(Json(presigned))
}

/// Server-proxied multipart upload. Expects one `file` part and an
/// optional `folder` part.
pub async fn proxied_upload(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<StoredObject>)> {
    let mut folder = default_folder();
    let mut file: Option<UploadRequest> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::InvalidFormat {
            message: format!("Malformed multipart body: {}", e),
        })?
    {
        match field.name() {
            Some("folder") => {
                folder = field.text().await.map_err(|e| AppError::InvalidFormat {
                    message: format!("Unreadable folder field: {}", e),
                })?;
            }
            Some("file") => {
                let file_name = field
                    .file_name()
                    .unwrap_or("upload")
                    .to_string();
                let content_type = field
                    .content_type()
                    .ok_or_else(|| AppError::MissingField {
                        field: "file content type".to_string(),
                    })?
                    .to_string();
                let bytes = field.bytes().await.map_err(|e| AppError::InvalidFormat {
                    message: format!("Unreadable file field: {}", e),
                })?;

                file = Some(UploadRequest {
                    file_name,
                    content_type,
                    folder: String::new(), // filled in below
                    bytes: bytes.to_vec(),
                });
            }
            _ => {}
        }
    }

    let mut request = file.ok_or_else(|| AppError::MissingField {
        field: "file".to_string(),
    })?;
    validate_folder(&folder)?;
    request.folder = folder;

    let uploader = RetryingUploader::new(
        state.storage.as_ref().clone(),
        state.config.storage.max_retries,
    );

    let start = Instant::now();
    let size = request.bytes.len();
    let result = uploader.upload(request).await;
    let elapsed = start.elapsed().as_secs_f64();

    match result {
        Ok(stored) => {
            metrics::record_upload(elapsed, size, "proxied", true);
            tracing::info!(
                user_id = %auth.user_id,
                key = %stored.key,
                size,
                "Object uploaded via proxy"
            );
            Ok((StatusCode::CREATED, Json(stored)))
        }
        Err(e) => {
            metrics::record_upload(elapsed, size, "proxied", false);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_folder_allowlist() {
        assert!(validate_folder("pages").is_ok());
        assert!(validate_folder("covers").is_ok());
        assert!(validate_folder("avatars").is_ok());
        assert!(validate_folder("../etc").is_err());
        assert!(validate_folder("").is_err());
    }
}
