//! User entity

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Account role. Uploaders may publish content; admins may mutate
/// anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    User,
    Uploader,
    Admin,
}

impl UserRole {
    /// Whether this role may create and delete manga/chapters
    pub fn can_publish(&self) -> bool {
        matches!(self, UserRole::Uploader | UserRole::Admin)
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

impl From<String> for UserRole {
    fn from(s: String) -> Self {
        match s.as_str() {
            "uploader" => UserRole::Uploader,
            "admin" => UserRole::Admin,
            _ => UserRole::User,
        }
    }
}

impl From<UserRole> for String {
    fn from(role: UserRole) -> Self {
        match role {
            UserRole::User => "user".to_string(),
            UserRole::Uploader => "uploader".to_string(),
            UserRole::Admin => "admin".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(column_type = "Text", unique)]
    pub username: String,

    #[sea_orm(column_type = "Text", unique)]
    pub email: String,

    /// Argon2 hash, never the plaintext
    #[sea_orm(column_type = "Text")]
    #[serde(skip_serializing)]
    pub password_hash: String,

    #[sea_orm(column_type = "Text")]
    pub role: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub avatar_url: Option<String>,

    #[sea_orm(column_type = "JsonBinary")]
    pub preferences: serde_json::Value,

    /// Denormalized stats, maintained by atomic increments
    pub manga_count: i32,

    pub comments_count: i32,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn role_enum(&self) -> UserRole {
        UserRole::from(self.role.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::manga::Entity")]
    Manga,

    #[sea_orm(has_many = "super::notification::Entity")]
    Notifications,

    #[sea_orm(has_many = "super::favorite::Entity")]
    Favorites,
}

impl Related<super::manga::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manga.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_gates() {
        assert!(!UserRole::User.can_publish());
        assert!(UserRole::Uploader.can_publish());
        assert!(UserRole::Admin.can_publish());
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::Uploader.is_admin());
    }

    #[test]
    fn test_unknown_role_defaults_to_user() {
        assert_eq!(UserRole::from("superuser".to_string()), UserRole::User);
    }
}
