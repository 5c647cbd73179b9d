//! Authentication and authorization utilities
//!
//! Provides:
//! - Argon2 password hashing
//! - JWT token generation and validation
//! - `AuthContext`, an explicit per-request identity extracted from the
//!   Authorization header and handed to handlers as an argument

use crate::db::models::UserRole;
use crate::errors::{AppError, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use uuid::Uuid;

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Authenticated user
    pub user_id: Uuid,

    /// Account role
    pub role: UserRole,

    /// Request ID for tracing
    pub request_id: String,
}

impl AuthContext {
    /// Require a role that may publish content
    pub fn require_publisher(&self) -> Result<()> {
        if self.role.can_publish() {
            Ok(())
        } else {
            Err(AppError::InsufficientRole {
                role: String::from(self.role),
            })
        }
    }

    /// Whether this identity may modify a resource owned by `owner_id`
    pub fn can_modify(&self, owner_id: Uuid) -> bool {
        self.user_id == owner_id || self.role.is_admin()
    }

    /// Ownership check that errors for everyone but the owner or an admin
    pub fn require_owner(&self, owner_id: Uuid) -> Result<()> {
        if self.can_modify(owner_id) {
            Ok(())
        } else {
            Err(AppError::NotOwner)
        }
    }
}

/// JWT claims structure
#[derive(Debug, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: String,

    /// Account role
    pub role: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// JWT token manager
pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    expiration_secs: i64,
}

impl JwtManager {
    /// Create a new JWT manager with the given secret
    pub fn new(secret: &str, expiration_secs: u64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            expiration_secs: expiration_secs as i64,
        }
    }

    /// Generate a new JWT token
    pub fn generate_token(&self, user_id: Uuid, role: UserRole) -> Result<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expiration_secs);

        let claims = JwtClaims {
            sub: user_id.to_string(),
            role: String::from(role),
            exp: exp.timestamp(),
            iat: now.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| AppError::Internal {
            message: format!("Failed to generate token: {}", e),
        })
    }

    /// Validate and decode a JWT token
    pub fn validate_token(&self, token: &str) -> Result<JwtClaims> {
        decode::<JwtClaims>(token, &self.decoding_key, &Validation::default())
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::Unauthorized {
                    message: "Invalid token".to_string(),
                },
            })
    }
}

/// Hash a password for storage
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal {
            message: format!("Failed to hash password: {}", e),
        })
}

/// Verify a password against a stored hash
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
        .is_ok()
}

/// Validate username shape: 3-32 chars of [a-zA-Z0-9_]
pub fn valid_username(username: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]{3,32}$").expect("static regex"))
        .is_match(username)
}

/// Extract a bearer token from an Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Axum extractor for AuthContext
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
    Arc<JwtManager>: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self> {
        // Extract request ID
        let request_id = parts
            .headers
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(String::from)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let auth_header = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing Authorization header".to_string(),
            })?;

        let token = extract_bearer(auth_header).ok_or_else(|| AppError::Unauthorized {
            message: "Authorization header must use the Bearer scheme".to_string(),
        })?;

        let jwt = Arc::<JwtManager>::from_ref(state);
        let claims = jwt.validate_token(token)?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AppError::Unauthorized {
            message: "Malformed token subject".to_string(),
        })?;

        Ok(AuthContext {
            user_id,
            role: UserRole::from(claims.role),
            request_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_roundtrip() {
        let hash = hash_password("hunter2!").unwrap();
        assert!(verify_password("hunter2!", &hash));
        assert!(!verify_password("hunter3!", &hash));
    }

    #[test]
    fn test_valid_username() {
        assert!(valid_username("reader_01"));
        assert!(!valid_username("ab"));
        assert!(!valid_username("has spaces"));
        assert!(!valid_username("way_too_long_for_anyone_to_reasonably_type"));
    }

    #[test]
    fn test_extract_bearer() {
        assert_eq!(extract_bearer("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer("abc123"), None);
        assert_eq!(extract_bearer("Basic abc"), None);
    }

    #[test]
    fn test_jwt_roundtrip() {
        let manager = JwtManager::new("test_secret", 3600);

        let user_id = Uuid::new_v4();
        let token = manager.generate_token(user_id, UserRole::Uploader).unwrap();
        let claims = manager.validate_token(&token).unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(UserRole::from(claims.role), UserRole::Uploader);
    }

    #[test]
    fn test_expired_token_rejected() {
        let manager = JwtManager::new("test_secret", 0);
        let token = manager
            .generate_token(Uuid::new_v4(), UserRole::User)
            .unwrap();
        // exp == iat; with default 60s leeway the token may still pass,
        // so validate with a manager that requires strict expiry.
        let mut validation = Validation::default();
        validation.leeway = 0;
        let result = decode::<JwtClaims>(
            &token,
            &DecodingKey::from_secret("test_secret".as_bytes()),
            &validation,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_ownership_gates() {
        let owner = Uuid::new_v4();
        let ctx = AuthContext {
            user_id: owner,
            role: UserRole::User,
            request_id: "r".into(),
        };
        assert!(ctx.require_owner(owner).is_ok());
        assert!(ctx.require_owner(Uuid::new_v4()).is_err());
        assert!(ctx.require_publisher().is_err());

        let admin = AuthContext {
            user_id: Uuid::new_v4(),
            role: UserRole::Admin,
            request_id: "r".into(),
        };
        assert!(admin.require_owner(owner).is_ok());
        assert!(admin.require_publisher().is_ok());
    }
}
