//! Comment handlers: threads, edits, reactions
//!
//! Creating a comment fans notifications out to the manga owner and,
//! for replies, the parent comment's author. Notification writes are
//! best-effort; the comment's durability never depends on them.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use tankobon_common::{
    auth::AuthContext,
    db::models::{Comment, ReactionKind},
    db::{PageMeta, PageQuery, Repository},
    errors::{AppError, Result},
    metrics,
    notify::{self, CommentFanout},
};

/// Request to create a comment or reply
#[derive(Debug, Deserialize, Validate)]
pub struct CreateCommentRequest {
    pub manga_id: Uuid,

    pub chapter_id: Option<Uuid>,

    /// Present on replies; must reference a top-level comment
    pub parent_id: Option<Uuid>,

    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

/// Request to edit a comment
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateCommentRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
}

/// Request to set a reaction
#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub kind: ReactionKind,
}

/// Public view of a comment
#[derive(Serialize)]
pub struct CommentResponse {
    pub id: Uuid,
    pub manga_id: Uuid,
    pub chapter_id: Option<Uuid>,
    pub author_id: Uuid,
    pub parent_id: Option<Uuid>,
    pub content: String,
    pub likes_count: i32,
    pub dislikes_count: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replies_count: Option<i64>,
    pub created_at: String,
    pub edited_at: Option<String>,
}

impl CommentResponse {
    fn from_comment(comment: Comment, replies_count: Option<i64>) -> Self {
        Self {
            id: comment.id,
            manga_id: comment.manga_id,
            chapter_id: comment.chapter_id,
            author_id: comment.author_id,
            parent_id: comment.parent_id,
            content: comment.content,
            likes_count: comment.likes_count,
            dislikes_count: comment.dislikes_count,
            replies_count,
            created_at: comment.created_at.to_rfc3339(),
            edited_at: comment.edited_at.map(|dt| dt.to_rfc3339()),
        }
    }
}

/// Listing query parameters
#[derive(Debug, Deserialize)]
pub struct ListCommentsParams {
    pub manga_id: Option<Uuid>,
    pub chapter_id: Option<Uuid>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Listing response
#[derive(Serialize)]
pub struct ListCommentsResponse {
    pub data: Vec<CommentResponse>,
    pub pagination: PageMeta,
}

/// Create a comment
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateCommentRequest>,
) -> Result<(StatusCode, Json<CommentResponse>)> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let manga = repo
        .find_manga_by_id(request.manga_id)
        .await?
        .ok_or_else(|| AppError::MangaNotFound {
            id: request.manga_id.to_string(),
        })?;

    if let Some(chapter_id) = request.chapter_id {
        let chapter = repo
            .find_chapter_by_id(chapter_id)
            .await?
            .ok_or_else(|| AppError::ChapterNotFound {
                id: chapter_id.to_string(),
            })?;
        if chapter.manga_id != request.manga_id {
            return Err(AppError::Validation {
                message: "chapter belongs to a different manga".to_string(),
                field: Some("chapter_id".to_string()),
            });
        }
    }

    // Resolved before creation so the fan-out knows the parent's author
    let parent_author_id = match request.parent_id {
        Some(parent_id) => {
            let parent = repo
                .find_comment_by_id(parent_id)
                .await?
                .ok_or_else(|| AppError::CommentNotFound {
                    id: parent_id.to_string(),
                })?;
            Some(parent.author_id)
        }
        None => None,
    };

    let comment = repo
        .create_comment(
            request.manga_id,
            request.chapter_id,
            auth.user_id,
            request.parent_id,
            request.content,
        )
        .await?;

    metrics::record_comment(comment.is_reply());

    let drafts = notify::plan_comment_notifications(&CommentFanout {
        comment_id: comment.id,
        manga_id: comment.manga_id,
        chapter_id: comment.chapter_id,
        author_id: comment.author_id,
        manga_owner_id: manga.owner_id,
        parent_author_id,
    });
    notify::dispatch(&repo, drafts).await;

    tracing::info!(
        comment_id = %comment.id,
        manga_id = %comment.manga_id,
        author_id = %auth.user_id,
        is_reply = comment.is_reply(),
        request_id = %auth.request_id,
        "Comment created"
    );

    Ok((
        StatusCode::CREATED,
        Json(CommentResponse::from_comment(comment, Some(0))),
    ))
}

/// List top-level comments of a manga (optionally one chapter)
pub async fn list_comments(
    State(state): State<AppState>,
    Query(params): Query<ListCommentsParams>,
) -> Result<Json<ListCommentsResponse>> {
    let manga_id = params.manga_id.ok_or_else(|| AppError::MissingField {
        field: "manga_id".to_string(),
    })?;

    let repo = Repository::new(state.db.clone());
    let page = PageQuery::new(params.page, params.limit);

    let (comments, pagination) = repo
        .list_comments(manga_id, params.chapter_id, page)
        .await?;

    let ids: Vec<Uuid> = comments.iter().map(|c| c.id).collect();
    let reply_counts = repo.count_replies(&ids).await?;

    let data = comments
        .into_iter()
        .map(|c| {
            let count = reply_counts.get(&c.id).copied().unwrap_or(0);
            CommentResponse::from_comment(c, Some(count))
        })
        .collect();

    Ok(Json(ListCommentsResponse { data, pagination }))
}

/// List replies of a comment, oldest first
pub async fn list_replies(
    State(state): State<AppState>,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<Vec<CommentResponse>>> {
    let repo = Repository::new(state.db.clone());

    repo.find_comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::CommentNotFound {
            id: comment_id.to_string(),
        })?;

    let replies = repo.list_replies(comment_id).await?;

    Ok(Json(
        replies
            .into_iter()
            .map(|c| CommentResponse::from_comment(c, None))
            .collect(),
    ))
}

/// Edit a comment's content
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(comment_id): Path<Uuid>,
    Json(request): Json<UpdateCommentRequest>,
) -> Result<Json<CommentResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let comment = repo
        .find_comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::CommentNotFound {
            id: comment_id.to_string(),
        })?;

    auth.require_owner(comment.author_id)?;

    let updated = repo
        .update_comment_content(comment_id, request.content)
        .await?;

    Ok(Json(CommentResponse::from_comment(updated, None)))
}

/// Soft-delete a comment
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(comment_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    let comment = repo
        .find_comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::CommentNotFound {
            id: comment_id.to_string(),
        })?;

    auth.require_owner(comment.author_id)?;

    repo.soft_delete_comment(comment_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

/// Updated reaction counters
#[derive(Serialize)]
pub struct ReactionResponse {
    pub likes_count: i32,
    pub dislikes_count: i32,
}

/// Set or flip a reaction on a comment
pub async fn set_reaction(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(comment_id): Path<Uuid>,
    Json(request): Json<ReactionRequest>,
) -> Result<Json<ReactionResponse>> {
    let repo = Repository::new(state.db.clone());

    let comment = repo
        .find_comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::CommentNotFound {
            id: comment_id.to_string(),
        })?;

    let previous = repo
        .set_comment_reaction(comment_id, auth.user_id, request.kind)
        .await?;

    // A like that actually landed notifies the comment's author
    if request.kind == ReactionKind::Like && previous != Some(ReactionKind::Like) {
        if let Some(draft) = notify::plan_reaction_notification(
            comment_id,
            comment.manga_id,
            comment.author_id,
            auth.user_id,
            true,
        ) {
            notify::dispatch(&repo, vec![draft]).await;
        }
    }

    let refreshed = repo
        .find_comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::CommentNotFound {
            id: comment_id.to_string(),
        })?;

    Ok(Json(ReactionResponse {
        likes_count: refreshed.likes_count,
        dislikes_count: refreshed.dislikes_count,
    }))
}

/// Withdraw a reaction
pub async fn clear_reaction(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(comment_id): Path<Uuid>,
) -> Result<Json<ReactionResponse>> {
    let repo = Repository::new(state.db.clone());

    let comment = repo
        .find_comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::CommentNotFound {
            id: comment_id.to_string(),
        })?;

    let removed = repo
        .clear_comment_reaction(comment_id, auth.user_id)
        .await?;

    if removed == Some(ReactionKind::Like) {
        if let Some(draft) = notify::plan_reaction_notification(
            comment_id,
            comment.manga_id,
            comment.author_id,
            auth.user_id,
            false,
        ) {
            notify::dispatch(&repo, vec![draft]).await;
        }
    }

    let refreshed = repo
        .find_comment_by_id(comment_id)
        .await?
        .ok_or_else(|| AppError::CommentNotFound {
            id: comment_id.to_string(),
        })?;

    Ok(Json(ReactionResponse {
        likes_count: refreshed.likes_count,
        dislikes_count: refreshed.dislikes_count,
    }))
}
