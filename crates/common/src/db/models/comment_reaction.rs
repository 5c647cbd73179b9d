//! Comment reaction entity
//!
//! One row per (comment, user); `kind` flips on re-reaction.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Reaction kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Like,
    Dislike,
}

impl From<String> for ReactionKind {
    fn from(s: String) -> Self {
        match s.as_str() {
            "dislike" => ReactionKind::Dislike,
            _ => ReactionKind::Like,
        }
    }
}

impl From<ReactionKind> for String {
    fn from(kind: ReactionKind) -> Self {
        match kind {
            ReactionKind::Like => "like".to_string(),
            ReactionKind::Dislike => "dislike".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "comment_reactions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub comment_id: Uuid,

    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: Uuid,

    #[sea_orm(column_type = "Text")]
    pub kind: String,

    pub created_at: DateTimeWithTimeZone,
}

impl Model {
    pub fn kind_enum(&self) -> ReactionKind {
        ReactionKind::from(self.kind.clone())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::comment::Entity",
        from = "Column::CommentId",
        to = "super::comment::Column::Id"
    )]
    Comment,
}

impl Related<super::comment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Comment.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
