//! Notification entity
//!
//! Written as a side effect of comment and reaction actions; only
//! `is_read` is ever updated afterwards. The payload is a typed
//! struct of raw ids serialized to JSONB; consumers resolve the
//! references themselves.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Notification kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    NewComment,
    CommentReply,
    Like,
    Unlike,
    MangaComment,
}

impl From<String> for NotificationKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "new_comment" => NotificationKind::NewComment,
            "comment_reply" => NotificationKind::CommentReply,
            "like" => NotificationKind::Like,
            "unlike" => NotificationKind::Unlike,
            "manga_comment" => NotificationKind::MangaComment,
            _ => NotificationKind::NewComment,
        }
    }
}

impl From<NotificationKind> for String {
    fn from(kind: NotificationKind) -> Self {
        match kind {
            NotificationKind::NewComment => "new_comment".to_string(),
            NotificationKind::CommentReply => "comment_reply".to_string(),
            NotificationKind::Like => "like".to_string(),
            NotificationKind::Unlike => "unlike".to_string(),
            NotificationKind::MangaComment => "manga_comment".to_string(),
        }
    }
}

/// Cross-reference payload carried by a notification. Ids only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manga_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chapter_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_user: Option<Uuid>,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub kind: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub data: serde_json::Value,

    pub is_read: bool,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn kind_enum(&self) -> NotificationKind {
        NotificationKind::from(self.kind.clone())
    }

    /// Decode the typed payload; malformed rows decode to an empty payload
    pub fn payload(&self) -> NotificationData {
        serde_json::from_value(self.data.clone()).unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_roundtrip() {
        for kind in [
            NotificationKind::NewComment,
            NotificationKind::CommentReply,
            NotificationKind::Like,
            NotificationKind::Unlike,
            NotificationKind::MangaComment,
        ] {
            assert_eq!(NotificationKind::from(String::from(kind)), kind);
        }
    }

    #[test]
    fn test_payload_omits_absent_fields() {
        let data = NotificationData {
            manga_id: Some(Uuid::new_v4()),
            ..Default::default()
        };
        let json = serde_json::to_value(&data).unwrap();
        assert!(json.get("manga_id").is_some());
        assert!(json.get("chapter_id").is_none());
    }
}
