//! Repository pattern for database operations
//!
//! Provides a clean interface for all data access operations
//! with proper error handling and transaction support.
//!
//! Denormalized counters (views, likes, chapters_count) are mutated
//! exclusively through single-statement atomic increments; concurrent
//! writers cannot lose updates.

use crate::db::pagination::{PageMeta, PageQuery};
use crate::db::DbPool;
use crate::db::models::*;
use crate::errors::{AppError, Result};
use crate::MAX_PAGES_PER_CHAPTER;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbBackend, EntityTrait,
    Order, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, Statement, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Sort key for manga listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MangaSort {
    CreatedAt,
    UpdatedAt,
    Views,
    Title,
    LatestChapter,
}

impl MangaSort {
    /// Parse a query-string value; unknown keys fall back to created_at
    pub fn parse(s: &str) -> Self {
        match s {
            "updated_at" | "updatedAt" => MangaSort::UpdatedAt,
            "views" => MangaSort::Views,
            "title" => MangaSort::Title,
            "latest_chapter" | "latestChapter" => MangaSort::LatestChapter,
            _ => MangaSort::CreatedAt,
        }
    }
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(s: &str) -> Self {
        match s {
            "asc" => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

impl From<SortOrder> for Order {
    fn from(order: SortOrder) -> Self {
        match order {
            SortOrder::Asc => Order::Asc,
            SortOrder::Desc => Order::Desc,
        }
    }
}

/// Filters applied to manga listings
#[derive(Debug, Clone, Default)]
pub struct MangaFilter {
    pub status: Option<MangaStatus>,
    pub genre: Option<String>,
    pub title_query: Option<String>,
}

/// New manga input
#[derive(Debug, Clone)]
pub struct NewManga {
    pub title: String,
    pub description: String,
    pub cover_image_url: Option<String>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub author: String,
    pub artist: String,
    pub status: MangaStatus,
}

/// Field-wise manga patch; None leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct MangaPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub cover_image_url: Option<Option<String>>,
    pub genres: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub author: Option<String>,
    pub artist: Option<String>,
    pub status: Option<MangaStatus>,
    pub rating: Option<f64>,
}

/// One page of a chapter submission, in reading order
#[derive(Debug, Clone)]
pub struct NewPage {
    pub image_url: String,
    pub width: i32,
    pub height: i32,
}

/// Genre/tag facet row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TagFacet {
    pub kind: String,
    pub name: String,
    pub uses: i64,
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    // ========================================================================
    // Health Check
    // ========================================================================

    /// Ping the database
    pub async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }

    // ========================================================================
    // User Operations
    // ========================================================================

    /// Create a new user account
    pub async fn create_user(
        &self,
        username: String,
        email: String,
        password_hash: String,
        role: UserRole,
    ) -> Result<User> {
        let existing = UserEntity::find()
            .filter(
                sea_orm::Condition::any()
                    .add(UserColumn::Username.eq(username.clone()))
                    .add(UserColumn::Email.eq(email.clone())),
            )
            .one(self.write_conn())
            .await?;

        if existing.is_some() {
            return Err(AppError::DuplicateUser);
        }

        let now = chrono::Utc::now();
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(username),
            email: Set(email),
            password_hash: Set(password_hash),
            role: Set(String::from(role)),
            avatar_url: Set(None),
            preferences: Set(serde_json::json!({})),
            manga_count: Set(0),
            comments_count: Set(0),
            created_at: Set(now.into()),
        };

        user.insert(self.write_conn()).await.map_err(Into::into)
    }

    /// Find user by ID
    pub async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>> {
        UserEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Find user by username
    pub async fn find_user_by_username(&self, username: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Username.eq(username))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Manga Operations
    // ========================================================================

    /// Create a new manga owned by the given user
    pub async fn create_manga(&self, owner_id: Uuid, input: NewManga) -> Result<Manga> {
        let now = chrono::Utc::now();

        let manga = MangaActiveModel {
            id: Set(Uuid::new_v4()),
            owner_id: Set(owner_id),
            title: Set(input.title),
            description: Set(input.description),
            cover_image_url: Set(input.cover_image_url),
            genres: Set(serde_json::json!(input.genres)),
            tags: Set(serde_json::json!(input.tags)),
            author: Set(input.author),
            artist: Set(input.artist),
            status: Set(String::from(input.status)),
            rating: Set(0.0),
            views: Set(0),
            likes: Set(0),
            chapters_count: Set(0),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let manga = manga.insert(self.write_conn()).await?;

        // Owner stats counter, atomic
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE users SET manga_count = manga_count + 1 WHERE id = $1",
            vec![owner_id.into()],
        );
        self.write_conn().execute(stmt).await?;

        Ok(manga)
    }

    /// Find a manga by ID, excluding soft-deleted rows
    pub async fn find_manga_by_id(&self, id: Uuid) -> Result<Option<Manga>> {
        MangaEntity::find_by_id(id)
            .filter(MangaColumn::IsDeleted.eq(false))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// List manga with filters, sorting, and offset pagination
    pub async fn list_manga(
        &self,
        filter: &MangaFilter,
        sort: MangaSort,
        order: SortOrder,
        page: PageQuery,
    ) -> Result<(Vec<Manga>, PageMeta)> {
        let mut query = MangaEntity::find().filter(MangaColumn::IsDeleted.eq(false));

        if let Some(status) = filter.status {
            query = query.filter(MangaColumn::Status.eq(String::from(status)));
        }

        if let Some(ref genre) = filter.genre {
            query = query.filter(Expr::cust_with_values(
                "genres @> ?::jsonb",
                [serde_json::json!([genre]).to_string()],
            ));
        }

        if let Some(ref q) = filter.title_query {
            query = query.filter(Expr::cust_with_values(
                "title ILIKE ?",
                [format!("%{}%", escape_like(q))],
            ));
        }

        let ord = Order::from(order);
        query = match sort {
            MangaSort::CreatedAt => query.order_by(MangaColumn::CreatedAt, ord),
            MangaSort::UpdatedAt => query.order_by(MangaColumn::UpdatedAt, ord),
            MangaSort::Views => query.order_by(MangaColumn::Views, ord),
            MangaSort::Title => query.order_by(MangaColumn::Title, ord),
            MangaSort::LatestChapter => query.order_by(
                Expr::cust("(SELECT MAX(c.created_at) FROM chapters c WHERE c.manga_id = manga.id)"),
                ord,
            ),
        };

        let paginator = query.paginate(self.read_conn(), page.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.page - 1).await?;

        Ok((items, PageMeta::compute(page, total)))
    }

    /// Apply a partial update to a manga
    pub async fn update_manga(&self, id: Uuid, patch: MangaPatch) -> Result<Manga> {
        let manga = self
            .find_manga_by_id(id)
            .await?
            .ok_or_else(|| AppError::MangaNotFound { id: id.to_string() })?;

        let mut active: MangaActiveModel = manga.into();

        if let Some(title) = patch.title {
            active.title = Set(title);
        }
        if let Some(description) = patch.description {
            active.description = Set(description);
        }
        if let Some(cover) = patch.cover_image_url {
            active.cover_image_url = Set(cover);
        }
        if let Some(genres) = patch.genres {
            active.genres = Set(serde_json::json!(genres));
        }
        if let Some(tags) = patch.tags {
            active.tags = Set(serde_json::json!(tags));
        }
        if let Some(author) = patch.author {
            active.author = Set(author);
        }
        if let Some(artist) = patch.artist {
            active.artist = Set(artist);
        }
        if let Some(status) = patch.status {
            active.status = Set(String::from(status));
        }
        if let Some(rating) = patch.rating {
            active.rating = Set(rating.clamp(0.0, 5.0));
        }
        active.updated_at = Set(chrono::Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Soft-delete a manga. Touches nothing outside the one row.
    pub async fn soft_delete_manga(&self, id: Uuid) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE manga SET is_deleted = TRUE, updated_at = NOW() \
             WHERE id = $1 AND is_deleted = FALSE",
            vec![id.into()],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Atomically bump the view counter
    pub async fn increment_manga_views(&self, id: Uuid) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE manga SET views = views + 1 WHERE id = $1 AND is_deleted = FALSE",
            vec![id.into()],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    // ========================================================================
    // Chapter Operations
    // ========================================================================

    /// Assemble and persist a chapter.
    ///
    /// Page numbers are assigned here, 1..=N in submission order; the
    /// chapter row, its pages, and the parent's chapters_count bump
    /// commit in one transaction. Nothing is persisted on any failure.
    pub async fn create_chapter(
        &self,
        manga_id: Uuid,
        title: String,
        chapter_number: i32,
        volume: Option<i32>,
        pages: Vec<NewPage>,
    ) -> Result<(Chapter, Vec<Page>)> {
        if pages.is_empty() {
            return Err(AppError::PageOrderInvalid {
                message: "a chapter requires at least one page".to_string(),
            });
        }
        if pages.len() > MAX_PAGES_PER_CHAPTER {
            return Err(AppError::PageOrderInvalid {
                message: format!(
                    "{} pages exceeds the limit of {}",
                    pages.len(),
                    MAX_PAGES_PER_CHAPTER
                ),
            });
        }

        let txn = self.write_conn().begin().await?;

        let duplicate = ChapterEntity::find()
            .filter(ChapterColumn::MangaId.eq(manga_id))
            .filter(ChapterColumn::ChapterNumber.eq(chapter_number))
            .one(&txn)
            .await?;
        if duplicate.is_some() {
            return Err(AppError::DuplicateChapterNumber {
                number: chapter_number,
            });
        }

        let now = chrono::Utc::now();
        let chapter_id = Uuid::new_v4();

        let chapter = ChapterActiveModel {
            id: Set(chapter_id),
            manga_id: Set(manga_id),
            chapter_number: Set(chapter_number),
            volume: Set(volume),
            title: Set(title),
            pages_count: Set(pages.len() as i32),
            views: Set(0),
            created_at: Set(now.into()),
        };
        let chapter = chapter.insert(&txn).await?;

        PageEntity::insert_many(page_rows(chapter_id, pages))
            .exec(&txn)
            .await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE manga SET chapters_count = chapters_count + 1, updated_at = $2 \
             WHERE id = $1 AND is_deleted = FALSE",
            vec![manga_id.into(), now.into()],
        );
        let result = txn.execute(stmt).await?;
        if result.rows_affected() == 0 {
            // Manga vanished or was soft-deleted mid-flight; dropping the
            // transaction rolls back the chapter and pages.
            return Err(AppError::MangaNotFound {
                id: manga_id.to_string(),
            });
        }

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: e.to_string(),
        })?;

        // Read back from the primary; a replica may not have the rows yet
        let pages = PageEntity::find()
            .filter(PageColumn::ChapterId.eq(chapter_id))
            .order_by_asc(PageColumn::PageNumber)
            .all(self.write_conn())
            .await?;

        Ok((chapter, pages))
    }

    /// Find a chapter by ID
    pub async fn find_chapter_by_id(&self, id: Uuid) -> Result<Option<Chapter>> {
        ChapterEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Pages of a chapter, in reading order
    pub async fn get_pages(&self, chapter_id: Uuid) -> Result<Vec<Page>> {
        PageEntity::find()
            .filter(PageColumn::ChapterId.eq(chapter_id))
            .order_by_asc(PageColumn::PageNumber)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Chapters of a manga ordered by chapter number
    pub async fn list_chapters(&self, manga_id: Uuid) -> Result<Vec<Chapter>> {
        ChapterEntity::find()
            .filter(ChapterColumn::MangaId.eq(manga_id))
            .order_by_asc(ChapterColumn::ChapterNumber)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Delete a chapter and its pages, decrementing the parent counter
    pub async fn delete_chapter(&self, id: Uuid) -> Result<bool> {
        let Some(chapter) = self.find_chapter_by_id(id).await? else {
            return Ok(false);
        };

        let txn = self.write_conn().begin().await?;

        PageEntity::delete_many()
            .filter(PageColumn::ChapterId.eq(id))
            .exec(&txn)
            .await?;

        ChapterEntity::delete_by_id(id).exec(&txn).await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE manga SET chapters_count = GREATEST(chapters_count - 1, 0), \
             updated_at = NOW() WHERE id = $1",
            vec![chapter.manga_id.into()],
        );
        txn.execute(stmt).await?;

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: e.to_string(),
        })?;

        Ok(true)
    }

    /// Atomically bump a chapter's view counter
    pub async fn increment_chapter_views(&self, id: Uuid) -> Result<()> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE chapters SET views = views + 1 WHERE id = $1",
            vec![id.into()],
        );

        self.write_conn().execute(stmt).await?;
        Ok(())
    }

    // ========================================================================
    // Comment Operations
    // ========================================================================

    /// Create a comment or a reply.
    ///
    /// A reply must target an existing, non-deleted, top-level comment
    /// on the same manga (threading is one level deep).
    pub async fn create_comment(
        &self,
        manga_id: Uuid,
        chapter_id: Option<Uuid>,
        author_id: Uuid,
        parent_id: Option<Uuid>,
        content: String,
    ) -> Result<Comment> {
        if let Some(pid) = parent_id {
            let parent = self
                .find_comment_by_id(pid)
                .await?
                .ok_or_else(|| AppError::CommentNotFound { id: pid.to_string() })?;

            if parent.manga_id != manga_id {
                return Err(AppError::Validation {
                    message: "parent comment belongs to a different manga".to_string(),
                    field: Some("parent_id".to_string()),
                });
            }
            if parent.parent_id.is_some() {
                return Err(AppError::Validation {
                    message: "replies to replies are not supported".to_string(),
                    field: Some("parent_id".to_string()),
                });
            }
        }

        let now = chrono::Utc::now();
        let comment = CommentActiveModel {
            id: Set(Uuid::new_v4()),
            manga_id: Set(manga_id),
            chapter_id: Set(chapter_id),
            author_id: Set(author_id),
            parent_id: Set(parent_id),
            content: Set(content),
            likes_count: Set(0),
            dislikes_count: Set(0),
            is_deleted: Set(false),
            created_at: Set(now.into()),
            edited_at: Set(None),
        };

        let comment = comment.insert(self.write_conn()).await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE users SET comments_count = comments_count + 1 WHERE id = $1",
            vec![author_id.into()],
        );
        self.write_conn().execute(stmt).await?;

        Ok(comment)
    }

    /// Find a comment by ID, excluding soft-deleted rows
    pub async fn find_comment_by_id(&self, id: Uuid) -> Result<Option<Comment>> {
        CommentEntity::find_by_id(id)
            .filter(CommentColumn::IsDeleted.eq(false))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Top-level comments for a manga (optionally scoped to a chapter),
    /// newest first
    pub async fn list_comments(
        &self,
        manga_id: Uuid,
        chapter_id: Option<Uuid>,
        page: PageQuery,
    ) -> Result<(Vec<Comment>, PageMeta)> {
        let mut query = CommentEntity::find()
            .filter(CommentColumn::MangaId.eq(manga_id))
            .filter(CommentColumn::ParentId.is_null())
            .filter(CommentColumn::IsDeleted.eq(false));

        if let Some(cid) = chapter_id {
            query = query.filter(CommentColumn::ChapterId.eq(cid));
        }

        let paginator = query
            .order_by_desc(CommentColumn::CreatedAt)
            .paginate(self.read_conn(), page.limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.page - 1).await?;

        Ok((items, PageMeta::compute(page, total)))
    }

    /// Replies of a comment, oldest first. Derived from the child's
    /// parent reference; there is no stored reply list to drift.
    pub async fn list_replies(&self, parent_id: Uuid) -> Result<Vec<Comment>> {
        CommentEntity::find()
            .filter(CommentColumn::ParentId.eq(parent_id))
            .filter(CommentColumn::IsDeleted.eq(false))
            .order_by_asc(CommentColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    /// Reply counts for a batch of parent comments
    pub async fn count_replies(&self, parent_ids: &[Uuid]) -> Result<HashMap<Uuid, i64>> {
        if parent_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let rows: Vec<(Option<Uuid>, i64)> = CommentEntity::find()
            .select_only()
            .column(CommentColumn::ParentId)
            .column_as(CommentColumn::Id.count(), "replies")
            .filter(CommentColumn::ParentId.is_in(parent_ids.to_vec()))
            .filter(CommentColumn::IsDeleted.eq(false))
            .group_by(CommentColumn::ParentId)
            .into_tuple()
            .all(self.read_conn())
            .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(parent, replies)| parent.map(|p| (p, replies)))
            .collect())
    }

    /// Replace a comment's content, stamping edited_at
    pub async fn update_comment_content(&self, id: Uuid, content: String) -> Result<Comment> {
        let comment = self
            .find_comment_by_id(id)
            .await?
            .ok_or_else(|| AppError::CommentNotFound { id: id.to_string() })?;

        let mut active: CommentActiveModel = comment.into();
        active.content = Set(content);
        active.edited_at = Set(Some(chrono::Utc::now().into()));

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    /// Soft-delete a comment. Replies stay visible; their parent edge
    /// still resolves.
    pub async fn soft_delete_comment(&self, id: Uuid) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE comments SET is_deleted = TRUE WHERE id = $1 AND is_deleted = FALSE",
            vec![id.into()],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    // ========================================================================
    // Reaction Operations
    // ========================================================================

    /// Set or flip a user's reaction on a comment. Returns the previous
    /// kind, if any. Counter adjustments ride in the same transaction
    /// as the reaction row.
    pub async fn set_comment_reaction(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
        kind: ReactionKind,
    ) -> Result<Option<ReactionKind>> {
        let txn = self.write_conn().begin().await?;

        let previous = CommentReactionEntity::find_by_id((comment_id, user_id))
            .one(&txn)
            .await?
            .map(|r| r.kind_enum());

        if previous == Some(kind) {
            return Ok(previous);
        }

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "INSERT INTO comment_reactions (comment_id, user_id, kind, created_at) \
             VALUES ($1, $2, $3, NOW()) \
             ON CONFLICT (comment_id, user_id) DO UPDATE SET kind = EXCLUDED.kind",
            vec![comment_id.into(), user_id.into(), String::from(kind).into()],
        );
        txn.execute(stmt).await?;

        let (like_delta, dislike_delta): (i32, i32) = match (previous, kind) {
            (None, ReactionKind::Like) => (1, 0),
            (None, ReactionKind::Dislike) => (0, 1),
            (Some(ReactionKind::Dislike), ReactionKind::Like) => (1, -1),
            (Some(ReactionKind::Like), ReactionKind::Dislike) => (-1, 1),
            _ => (0, 0),
        };

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE comments SET likes_count = likes_count + $2, \
             dislikes_count = dislikes_count + $3 WHERE id = $1",
            vec![comment_id.into(), like_delta.into(), dislike_delta.into()],
        );
        txn.execute(stmt).await?;

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: e.to_string(),
        })?;

        Ok(previous)
    }

    /// Remove a user's reaction from a comment. Returns the removed
    /// kind, if a reaction existed.
    pub async fn clear_comment_reaction(
        &self,
        comment_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<ReactionKind>> {
        let txn = self.write_conn().begin().await?;

        let Some(existing) = CommentReactionEntity::find_by_id((comment_id, user_id))
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };
        let kind = existing.kind_enum();

        CommentReactionEntity::delete_by_id((comment_id, user_id))
            .exec(&txn)
            .await?;

        let column = match kind {
            ReactionKind::Like => "likes_count",
            ReactionKind::Dislike => "dislikes_count",
        };
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            format!(
                "UPDATE comments SET {col} = GREATEST({col} - 1, 0) WHERE id = $1",
                col = column
            ),
            vec![comment_id.into()],
        );
        txn.execute(stmt).await?;

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: e.to_string(),
        })?;

        Ok(Some(kind))
    }

    // ========================================================================
    // Notification Operations
    // ========================================================================

    /// Create a notification for a user
    pub async fn create_notification(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        data: NotificationData,
    ) -> Result<Notification> {
        let now = chrono::Utc::now();

        let notification = NotificationActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            kind: Set(String::from(kind)),
            data: Set(serde_json::to_value(&data)?),
            is_read: Set(false),
            created_at: Set(now.into()),
        };

        notification
            .insert(self.write_conn())
            .await
            .map_err(Into::into)
    }

    /// Notifications for a user, newest first
    pub async fn list_notifications(
        &self,
        user_id: Uuid,
        page: PageQuery,
    ) -> Result<(Vec<Notification>, PageMeta)> {
        let paginator = NotificationEntity::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .order_by_desc(NotificationColumn::CreatedAt)
            .paginate(self.read_conn(), page.limit);

        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.page - 1).await?;

        Ok((items, PageMeta::compute(page, total)))
    }

    /// Mark one notification read; scoped to its owner
    pub async fn mark_notification_read(&self, user_id: Uuid, id: Uuid) -> Result<bool> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2",
            vec![id.into(), user_id.into()],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark every unread notification read; returns how many flipped
    pub async fn mark_all_notifications_read(&self, user_id: Uuid) -> Result<u64> {
        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND is_read = FALSE",
            vec![user_id.into()],
        );

        let result = self.write_conn().execute(stmt).await?;
        Ok(result.rows_affected())
    }

    /// Count of unread notifications
    pub async fn unread_notification_count(&self, user_id: Uuid) -> Result<u64> {
        NotificationEntity::find()
            .filter(NotificationColumn::UserId.eq(user_id))
            .filter(NotificationColumn::IsRead.eq(false))
            .count(self.read_conn())
            .await
            .map_err(Into::into)
    }

    // ========================================================================
    // Favorite Operations
    // ========================================================================

    /// Add a manga to a user's favorites. Idempotent; the manga's like
    /// counter moves only when a row is actually inserted.
    pub async fn add_favorite(&self, user_id: Uuid, manga_id: Uuid) -> Result<bool> {
        let txn = self.write_conn().begin().await?;

        let stmt = Statement::from_sql_and_values(
            DbBackend::Postgres,
            "INSERT INTO favorites (user_id, manga_id, created_at) VALUES ($1, $2, NOW()) \
             ON CONFLICT (user_id, manga_id) DO NOTHING",
            vec![user_id.into(), manga_id.into()],
        );
        let result = txn.execute(stmt).await?;
        let inserted = result.rows_affected() > 0;

        if inserted {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE manga SET likes = likes + 1 WHERE id = $1",
                vec![manga_id.into()],
            );
            txn.execute(stmt).await?;
        }

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: e.to_string(),
        })?;

        Ok(inserted)
    }

    /// Remove a manga from a user's favorites
    pub async fn remove_favorite(&self, user_id: Uuid, manga_id: Uuid) -> Result<bool> {
        let txn = self.write_conn().begin().await?;

        let result = FavoriteEntity::delete_by_id((user_id, manga_id))
            .exec(&txn)
            .await?;
        let removed = result.rows_affected > 0;

        if removed {
            let stmt = Statement::from_sql_and_values(
                DbBackend::Postgres,
                "UPDATE manga SET likes = GREATEST(likes - 1, 0) WHERE id = $1",
                vec![manga_id.into()],
            );
            txn.execute(stmt).await?;
        }

        txn.commit().await.map_err(|e| AppError::Transaction {
            message: e.to_string(),
        })?;

        Ok(removed)
    }

    /// Favorited manga for a user, most recently added first
    pub async fn list_favorites(
        &self,
        user_id: Uuid,
        page: PageQuery,
    ) -> Result<(Vec<Manga>, PageMeta)> {
        let paginator = FavoriteEntity::find()
            .filter(FavoriteColumn::UserId.eq(user_id))
            .order_by_desc(FavoriteColumn::CreatedAt)
            .paginate(self.read_conn(), page.limit);

        let total = paginator.num_items().await?;
        let favorites = paginator.fetch_page(page.page - 1).await?;
        let ids: Vec<Uuid> = favorites.iter().map(|f| f.manga_id).collect();

        let mangas = MangaEntity::find()
            .filter(MangaColumn::Id.is_in(ids.clone()))
            .filter(MangaColumn::IsDeleted.eq(false))
            .all(self.read_conn())
            .await?;

        // Preserve favorite recency order
        let by_id: HashMap<Uuid, Manga> = mangas.into_iter().map(|m| (m.id, m)).collect();
        let ordered = ids.into_iter().filter_map(|id| by_id.get(&id).cloned()).collect();

        Ok((ordered, PageMeta::compute(page, total)))
    }

    // ========================================================================
    // Facet Operations
    // ========================================================================

    /// Genre and tag facets over non-deleted manga, with usage counts
    pub async fn tag_facets(&self) -> Result<Vec<TagFacet>> {
        let stmt = Statement::from_string(
            DbBackend::Postgres,
            "SELECT 'genre' AS kind, f.value AS name, COUNT(*) AS uses \
             FROM manga m, LATERAL jsonb_array_elements_text(m.genres) AS f(value) \
             WHERE m.is_deleted = FALSE GROUP BY f.value \
             UNION ALL \
             SELECT 'tag' AS kind, f.value AS name, COUNT(*) AS uses \
             FROM manga m, LATERAL jsonb_array_elements_text(m.tags) AS f(value) \
             WHERE m.is_deleted = FALSE GROUP BY f.value \
             ORDER BY uses DESC, name ASC",
        );

        let rows = self.read_conn().query_all(stmt).await?;
        let mut facets = Vec::with_capacity(rows.len());
        for row in rows {
            facets.push(TagFacet {
                kind: row.try_get("", "kind")?,
                name: row.try_get("", "name")?,
                uses: row.try_get("", "uses")?,
            });
        }

        Ok(facets)
    }
}

/// Number submitted pages 1..=N in submission order. Client-supplied
/// numbering, if any, never reaches the database.
fn page_rows(chapter_id: Uuid, pages: Vec<NewPage>) -> Vec<PageActiveModel> {
    pages
        .into_iter()
        .enumerate()
        .map(|(index, page)| PageActiveModel {
            id: Set(Uuid::new_v4()),
            chapter_id: Set(chapter_id),
            page_number: Set(index as i32 + 1),
            image_url: Set(page.image_url),
            width: Set(page.width),
            height: Set(page.height),
        })
        .collect()
}

/// Escape LIKE wildcards in user-supplied search text
fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_key_parsing() {
        assert_eq!(MangaSort::parse("views"), MangaSort::Views);
        assert_eq!(MangaSort::parse("latestChapter"), MangaSort::LatestChapter);
        assert_eq!(MangaSort::parse("latest_chapter"), MangaSort::LatestChapter);
        assert_eq!(MangaSort::parse("bogus"), MangaSort::CreatedAt);
    }

    #[test]
    fn test_sort_order_parsing() {
        assert_eq!(SortOrder::parse("asc"), SortOrder::Asc);
        assert_eq!(SortOrder::parse("desc"), SortOrder::Desc);
        assert_eq!(SortOrder::parse(""), SortOrder::Desc);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("100%_\\"), "100\\%\\_\\\\");
        assert_eq!(escape_like("one piece"), "one piece");
    }

    #[test]
    fn test_page_rows_number_contiguously_in_submission_order() {
        let chapter_id = Uuid::new_v4();
        let pages: Vec<NewPage> = (0..5)
            .map(|i| NewPage {
                image_url: format!("https://media.example.com/pages/p{}.png", i),
                width: 800,
                height: 1200,
            })
            .collect();

        let rows = page_rows(chapter_id, pages);

        assert_eq!(rows.len(), 5);
        for (index, row) in rows.into_iter().enumerate() {
            assert_eq!(row.page_number.unwrap(), index as i32 + 1);
            assert_eq!(row.chapter_id.unwrap(), chapter_id);
            assert_eq!(
                row.image_url.unwrap(),
                format!("https://media.example.com/pages/p{}.png", index)
            );
        }
    }
}
