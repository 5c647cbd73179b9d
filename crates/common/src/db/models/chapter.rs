//! Chapter entity
//!
//! Belongs to exactly one manga; `chapter_number` is unique within it.
//! Pages live in the `pages` child table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chapters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub manga_id: Uuid,

    pub chapter_number: i32,

    pub volume: Option<i32>,

    #[sea_orm(column_type = "Text")]
    pub title: String,

    pub pages_count: i32,

    pub views: i64,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::manga::Entity",
        from = "Column::MangaId",
        to = "super::manga::Column::Id"
    )]
    Manga,

    #[sea_orm(has_many = "super::page::Entity")]
    Pages,
}

impl Related<super::manga::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Manga.def()
    }
}

impl Related<super::page::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Pages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
