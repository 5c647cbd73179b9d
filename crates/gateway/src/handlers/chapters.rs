//! Chapter handlers: assembly, delivery, deletion
//!
//! Chapter assembly accepts already-uploaded page URLs in reading
//! order. Numbering is assigned server-side; the chapter row, its
//! pages, and the manga's chapter counter commit atomically in the
//! repository.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use tankobon_common::{
    auth::AuthContext,
    db::models::{Chapter, Page},
    db::{NewPage, Repository},
    errors::{AppError, Result},
    metrics,
};

/// One submitted page, in reading order
#[derive(Debug, Deserialize, Validate)]
pub struct PageInput {
    #[validate(url)]
    pub image_url: String,

    #[validate(range(min = 1, max = 10000))]
    pub width: i32,

    #[validate(range(min = 1, max = 10000))]
    pub height: i32,
}

/// Request to publish a chapter
#[derive(Debug, Deserialize, Validate)]
pub struct CreateChapterRequest {
    #[validate(length(max = 300))]
    #[serde(default)]
    pub title: String,

    #[validate(range(min = 0))]
    pub chapter_number: i32,

    pub volume: Option<i32>,

    #[validate(nested)]
    pub pages: Vec<PageInput>,
}

/// Persisted page view
#[derive(Serialize)]
pub struct PageResponse {
    pub page_number: i32,
    pub image_url: String,
    pub width: i32,
    pub height: i32,
}

impl From<Page> for PageResponse {
    fn from(page: Page) -> Self {
        Self {
            page_number: page.page_number,
            image_url: page.image_url,
            width: page.width,
            height: page.height,
        }
    }
}

/// Chapter without its pages (listings)
#[derive(Serialize)]
pub struct ChapterSummary {
    pub id: Uuid,
    pub manga_id: Uuid,
    pub chapter_number: i32,
    pub volume: Option<i32>,
    pub title: String,
    pub pages_count: i32,
    pub views: i64,
    pub created_at: String,
}

impl From<Chapter> for ChapterSummary {
    fn from(chapter: Chapter) -> Self {
        Self {
            id: chapter.id,
            manga_id: chapter.manga_id,
            chapter_number: chapter.chapter_number,
            volume: chapter.volume,
            title: chapter.title,
            pages_count: chapter.pages_count,
            views: chapter.views,
            created_at: chapter.created_at.to_rfc3339(),
        }
    }
}

/// Chapter with pages (reader view)
#[derive(Serialize)]
pub struct ChapterResponse {
    #[serde(flatten)]
    pub chapter: ChapterSummary,
    pub pages: Vec<PageResponse>,
}

/// Publish a chapter under a manga
pub async fn create_chapter(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(manga_id): Path<Uuid>,
    Json(request): Json<CreateChapterRequest>,
) -> Result<(StatusCode, Json<ChapterResponse>)> {
    auth.require_publisher()?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let manga = repo
        .find_manga_by_id(manga_id)
        .await?
        .ok_or_else(|| AppError::MangaNotFound {
            id: manga_id.to_string(),
        })?;

    auth.require_owner(manga.owner_id)?;

    let pages: Vec<NewPage> = request
        .pages
        .into_iter()
        .map(|p| NewPage {
            image_url: p.image_url,
            width: p.width,
            height: p.height,
        })
        .collect();
    let page_count = pages.len();

    let (chapter, pages) = repo
        .create_chapter(
            manga_id,
            request.title,
            request.chapter_number,
            request.volume,
            pages,
        )
        .await?;

    metrics::record_chapter_published(page_count);

    tracing::info!(
        chapter_id = %chapter.id,
        manga_id = %manga_id,
        chapter_number = chapter.chapter_number,
        pages = page_count,
        request_id = %auth.request_id,
        "Chapter published"
    );

    Ok((
        StatusCode::CREATED,
        Json(ChapterResponse {
            chapter: chapter.into(),
            pages: pages.into_iter().map(PageResponse::from).collect(),
        }),
    ))
}

/// List chapters of a manga
pub async fn list_chapters(
    State(state): State<AppState>,
    Path(manga_id): Path<Uuid>,
) -> Result<Json<Vec<ChapterSummary>>> {
    let repo = Repository::new(state.db.clone());

    repo.find_manga_by_id(manga_id)
        .await?
        .ok_or_else(|| AppError::MangaNotFound {
            id: manga_id.to_string(),
        })?;

    let chapters = repo.list_chapters(manga_id).await?;

    Ok(Json(
        chapters.into_iter().map(ChapterSummary::from).collect(),
    ))
}

/// Read a chapter with its pages. Counts as a view.
pub async fn get_chapter(
    State(state): State<AppState>,
    Path(chapter_id): Path<Uuid>,
) -> Result<Json<ChapterResponse>> {
    let repo = Repository::new(state.db.clone());

    let chapter = repo
        .find_chapter_by_id(chapter_id)
        .await?
        .ok_or_else(|| AppError::ChapterNotFound {
            id: chapter_id.to_string(),
        })?;

    let pages = repo.get_pages(chapter_id).await?;

    repo.increment_chapter_views(chapter_id).await?;

    Ok(Json(ChapterResponse {
        chapter: chapter.into(),
        pages: pages.into_iter().map(PageResponse::from).collect(),
    }))
}

/// Delete a chapter
pub async fn delete_chapter(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(chapter_id): Path<Uuid>,
) -> Result<StatusCode> {
    auth.require_publisher()?;

    let repo = Repository::new(state.db.clone());

    let chapter = repo
        .find_chapter_by_id(chapter_id)
        .await?
        .ok_or_else(|| AppError::ChapterNotFound {
            id: chapter_id.to_string(),
        })?;

    let manga = repo
        .find_manga_by_id(chapter.manga_id)
        .await?
        .ok_or_else(|| AppError::MangaNotFound {
            id: chapter.manga_id.to_string(),
        })?;

    auth.require_owner(manga.owner_id)?;

    repo.delete_chapter(chapter_id).await?;

    tracing::info!(
        chapter_id = %chapter_id,
        manga_id = %chapter.manga_id,
        user_id = %auth.user_id,
        "Chapter deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}
