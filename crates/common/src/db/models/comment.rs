//! Comment entity
//!
//! Belongs to a manga and optionally a chapter. Threading is one level
//! deep: a reply stores its parent's id in `parent_id`, and "replies of
//! X" is a query on that column. The parent row holds no child list,
//! so the edge has a single source of truth. Reaction counters are
//! denormalized and maintained atomically alongside the reactions
//! table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comments")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub manga_id: Uuid,

    pub chapter_id: Option<Uuid>,

    pub author_id: Uuid,

    /// Set on replies only; top-level comments hold NULL
    pub parent_id: Option<Uuid>,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub likes_count: i32,

    pub dislikes_count: i32,

    pub is_deleted: bool,

    pub created_at: DateTimeWithTimeZone,

    pub edited_at: Option<DateTimeWithTimeZone>,
}

impl Model {
    pub fn is_reply(&self) -> bool {
        self.parent_id.is_some()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::manga::Entity",
        from = "Column::MangaId",
        to = "super::manga::Column::Id"
    )]
    Manga,

    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id"
    )]
    Author,

    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::ParentId",
        to = "Column::Id"
    )]
    Parent,

    #[sea_orm(has_many = "super::comment_reaction::Entity")]
    Reactions,
}

impl Related<super::manga::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manga.def()
    }
}

impl Related<super::comment_reaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Reactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
