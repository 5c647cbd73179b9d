//! Manga entity
//!
//! The top-level content work. Carries denormalized counters
//! (`views`, `likes`, `chapters_count`) that are only ever mutated via
//! atomic SQL increments, and a soft-delete flag that every read path
//! must respect.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Publication status
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MangaStatus {
    Ongoing,
    Completed,
    Hiatus,
    Cancelled,
}

impl MangaStatus {
    /// Strict parse for untrusted input; unknown strings are `None`
    pub fn parse_opt(s: &str) -> Option<Self> {
        match s {
            "ongoing" => Some(MangaStatus::Ongoing),
            "completed" => Some(MangaStatus::Completed),
            "hiatus" => Some(MangaStatus::Hiatus),
            "cancelled" => Some(MangaStatus::Cancelled),
            _ => None,
        }
    }
}

/// Lenient decode for stored columns only; a row that predates a status
/// rename still loads
impl From<String> for MangaStatus {
    fn from(s: String) -> Self {
        MangaStatus::parse_opt(&s).unwrap_or(MangaStatus::Ongoing)
    }
}

impl From<MangaStatus> for String {
    fn from(status: MangaStatus) -> Self {
        match status {
            MangaStatus::Ongoing => "ongoing".to_string(),
            MangaStatus::Completed => "completed".to_string(),
            MangaStatus::Hiatus => "hiatus".to_string(),
            MangaStatus::Cancelled => "cancelled".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "manga")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub owner_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub cover_image_url: Option<String>,

    /// Genre facet as a JSONB string array
    #[sea_orm(column_type = "JsonBinary")]
    pub genres: serde_json::Value,

    /// Free-form tag facet as a JSONB string array
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: serde_json::Value,

    #[sea_orm(column_type = "Text")]
    pub author: String,

    #[sea_orm(column_type = "Text")]
    pub artist: String,

    #[sea_orm(column_type = "Text")]
    pub status: String,

    /// Aggregate rating, 0.0..=5.0
    pub rating: f64,

    pub views: i64,

    pub likes: i64,

    pub chapters_count: i32,

    pub is_deleted: bool,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

impl Model {
    /// Status as the typed enum
    pub fn status_enum(&self) -> MangaStatus {
        MangaStatus::from(self.status.clone())
    }

    /// Genres as a plain string vector
    pub fn genre_list(&self) -> Vec<String> {
        json_string_array(&self.genres)
    }

    /// Tags as a plain string vector
    pub fn tag_list(&self) -> Vec<String> {
        json_string_array(&self.tags)
    }
}

fn json_string_array(value: &serde_json::Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::OwnerId",
        to = "super::user::Column::Id"
    )]
    Owner,

    #[sea_orm(has_many = "super::chapter::Entity")]
    Chapters,

    #[sea_orm(has_many = "super::comment::Entity")]
    Comments,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Owner.def()
    }
}

impl Related<super::chapter::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Chapters.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            MangaStatus::Ongoing,
            MangaStatus::Completed,
            MangaStatus::Hiatus,
            MangaStatus::Cancelled,
        ] {
            assert_eq!(MangaStatus::from(String::from(status)), status);
        }
    }

    #[test]
    fn test_strict_parse_rejects_unknown_status() {
        assert_eq!(MangaStatus::parse_opt("hiatus"), Some(MangaStatus::Hiatus));
        assert_eq!(MangaStatus::parse_opt("axed"), None);
        assert_eq!(MangaStatus::parse_opt(""), None);
    }

    #[test]
    fn test_stored_unknown_status_decodes_to_ongoing() {
        assert_eq!(MangaStatus::from("axed".to_string()), MangaStatus::Ongoing);
    }

    #[test]
    fn test_json_string_array_ignores_non_strings() {
        let v = serde_json::json!(["action", 3, "comedy", null]);
        assert_eq!(json_string_array(&v), vec!["action", "comedy"]);
        assert!(json_string_array(&serde_json::json!({})).is_empty());
    }
}
