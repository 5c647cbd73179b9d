//! SeaORM entity models
//!
//! Database entities for the tankobon catalog

mod chapter;
mod comment;
mod comment_reaction;
mod favorite;
mod manga;
mod notification;
mod page;
mod user;

pub use manga::{
    ActiveModel as MangaActiveModel, Column as MangaColumn, Entity as MangaEntity,
    MangaStatus, Model as Manga,
};

pub use chapter::{
    ActiveModel as ChapterActiveModel, Column as ChapterColumn, Entity as ChapterEntity,
    Model as Chapter,
};

pub use page::{
    ActiveModel as PageActiveModel, Column as PageColumn, Entity as PageEntity, Model as Page,
};

pub use comment::{
    ActiveModel as CommentActiveModel, Column as CommentColumn, Entity as CommentEntity,
    Model as Comment,
};

pub use comment_reaction::{
    ActiveModel as CommentReactionActiveModel, Column as CommentReactionColumn,
    Entity as CommentReactionEntity, Model as CommentReaction, ReactionKind,
};

pub use notification::{
    ActiveModel as NotificationActiveModel, Column as NotificationColumn,
    Entity as NotificationEntity, Model as Notification, NotificationData, NotificationKind,
};

pub use user::{
    ActiveModel as UserActiveModel, Column as UserColumn, Entity as UserEntity, Model as User,
    UserRole,
};

pub use favorite::{
    ActiveModel as FavoriteActiveModel, Column as FavoriteColumn, Entity as FavoriteEntity,
    Model as Favorite,
};
