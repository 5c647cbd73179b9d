//! Manga management handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use tankobon_common::{
    auth::AuthContext,
    cache::keys,
    db::models::{Manga, MangaStatus},
    db::{MangaFilter, MangaPatch, MangaSort, NewManga, PageMeta, PageQuery, Repository, SortOrder},
    errors::{AppError, Result},
    metrics,
};

/// Request to create a new manga
#[derive(Debug, Deserialize, Validate)]
pub struct CreateMangaRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: String,

    #[validate(length(max = 5000))]
    #[serde(default)]
    pub description: String,

    #[validate(url)]
    pub cover_image_url: Option<String>,

    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    #[validate(length(min = 1, max = 200))]
    pub author: String,

    #[validate(length(max = 200))]
    #[serde(default)]
    pub artist: String,

    pub status: Option<MangaStatus>,
}

/// Partial update request; absent fields stay untouched
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMangaRequest {
    #[validate(length(min = 1, max = 300))]
    pub title: Option<String>,

    #[validate(length(max = 5000))]
    pub description: Option<String>,

    /// `null` clears the cover, absent leaves it alone
    #[serde(default, deserialize_with = "double_option")]
    pub cover_image_url: Option<Option<String>>,

    pub genres: Option<Vec<String>>,

    pub tags: Option<Vec<String>>,

    #[validate(length(min = 1, max = 200))]
    pub author: Option<String>,

    #[validate(length(max = 200))]
    pub artist: Option<String>,

    pub status: Option<MangaStatus>,

    #[validate(range(min = 0.0, max = 5.0))]
    pub rating: Option<f64>,
}

/// Public view of a manga
#[derive(Serialize, Deserialize, Clone)]
pub struct MangaResponse {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub cover_image_url: Option<String>,
    pub genres: Vec<String>,
    pub tags: Vec<String>,
    pub author: String,
    pub artist: String,
    pub status: String,
    pub rating: f64,
    pub views: i64,
    pub likes: i64,
    pub chapters_count: i32,
    pub owner_id: Uuid,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Manga> for MangaResponse {
    fn from(manga: Manga) -> Self {
        Self {
            id: manga.id,
            genres: manga.genre_list(),
            tags: manga.tag_list(),
            title: manga.title,
            description: manga.description,
            cover_image_url: manga.cover_image_url,
            author: manga.author,
            artist: manga.artist,
            status: manga.status,
            rating: manga.rating,
            views: manga.views,
            likes: manga.likes,
            chapters_count: manga.chapters_count,
            owner_id: manga.owner_id,
            created_at: manga.created_at.to_rfc3339(),
            updated_at: manga.updated_at.to_rfc3339(),
        }
    }
}

/// Listing query parameters
#[derive(Debug, Default, Deserialize)]
pub struct ListMangaParams {
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub status: Option<String>,
    pub genre: Option<String>,
    pub q: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
}

/// Listing response: one page plus pagination metadata
#[derive(Serialize, Deserialize, Clone)]
pub struct ListMangaResponse {
    pub data: Vec<MangaResponse>,
    pub pagination: PageMeta,
}

/// Create a new manga
pub async fn create_manga(
    State(state): State<AppState>,
    auth: AuthContext,
    Json(request): Json<CreateMangaRequest>,
) -> Result<(StatusCode, Json<MangaResponse>)> {
    auth.require_publisher()?;
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let manga = repo
        .create_manga(
            auth.user_id,
            NewManga {
                title: request.title,
                description: request.description,
                cover_image_url: request.cover_image_url,
                genres: request.genres,
                tags: request.tags,
                author: request.author,
                artist: request.artist,
                status: request.status.unwrap_or(MangaStatus::Ongoing),
            },
        )
        .await?;

    tracing::info!(
        manga_id = %manga.id,
        owner_id = %auth.user_id,
        title = %manga.title,
        "Manga created"
    );

    drop_facet_cache(&state).await;

    Ok((StatusCode::CREATED, Json(manga.into())))
}

/// Get a manga by ID. Counts as a view.
pub async fn get_manga(
    State(state): State<AppState>,
    Path(manga_id): Path<Uuid>,
) -> Result<Json<MangaResponse>> {
    let repo = Repository::new(state.db.clone());

    let manga = repo
        .find_manga_by_id(manga_id)
        .await?
        .ok_or_else(|| AppError::MangaNotFound {
            id: manga_id.to_string(),
        })?;

    repo.increment_manga_views(manga_id).await?;

    Ok(Json(manga.into()))
}

/// List manga with sorting, filtering, and pagination
pub async fn list_manga(
    State(state): State<AppState>,
    Query(params): Query<ListMangaParams>,
) -> Result<Json<ListMangaResponse>> {
    let repo = Repository::new(state.db.clone());

    let sort = MangaSort::parse(params.sort_by.as_deref().unwrap_or(""));
    let order = SortOrder::parse(params.sort_order.as_deref().unwrap_or(""));
    let page = PageQuery::new(params.page, params.limit);

    // Unknown status values are rejected, not coerced to a real one
    let status = match params.status.as_deref() {
        Some(raw) => Some(MangaStatus::parse_opt(raw).ok_or_else(|| AppError::Validation {
            message: format!("unknown status '{}'", raw),
            field: Some("status".to_string()),
        })?),
        None => None,
    };

    let filter = MangaFilter {
        status,
        genre: params.genre.clone(),
        title_query: params.q.clone(),
    };

    // Listing pages are cached briefly under a hash of the normalized
    // query; freshness comes from the TTL, not invalidation.
    let cache_key = keys::manga_list(&listing_cache_key(&params, page));
    if let Some(ref cache) = state.cache {
        if let Ok(Some(hit)) = cache.get::<ListMangaResponse>(&cache_key).await {
            metrics::record_cache(true, "manga_list");
            return Ok(Json(hit));
        }
        metrics::record_cache(false, "manga_list");
    }

    let (mangas, pagination) = repo.list_manga(&filter, sort, order, page).await?;
    let response = ListMangaResponse {
        data: mangas.into_iter().map(MangaResponse::from).collect(),
        pagination,
    };

    if let Some(ref cache) = state.cache {
        if let Err(e) = cache.set_with_ttl(&cache_key, &response, 60).await {
            tracing::warn!(error = %e, "Listing cache write failed");
        }
    }

    Ok(Json(response))
}

/// Apply a partial update
pub async fn update_manga(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(manga_id): Path<Uuid>,
    Json(request): Json<UpdateMangaRequest>,
) -> Result<Json<MangaResponse>> {
    request.validate()?;

    let repo = Repository::new(state.db.clone());

    let manga = repo
        .find_manga_by_id(manga_id)
        .await?
        .ok_or_else(|| AppError::MangaNotFound {
            id: manga_id.to_string(),
        })?;

    auth.require_owner(manga.owner_id)?;

    let facets_touched = request.genres.is_some() || request.tags.is_some();

    let updated = repo
        .update_manga(
            manga_id,
            MangaPatch {
                title: request.title,
                description: request.description,
                cover_image_url: request.cover_image_url,
                genres: request.genres,
                tags: request.tags,
                author: request.author,
                artist: request.artist,
                status: request.status,
                rating: request.rating,
            },
        )
        .await?;

    if facets_touched {
        drop_facet_cache(&state).await;
    }

    Ok(Json(updated.into()))
}

/// Soft-delete a manga
pub async fn delete_manga(
    State(state): State<AppState>,
    auth: AuthContext,
    Path(manga_id): Path<Uuid>,
) -> Result<StatusCode> {
    let repo = Repository::new(state.db.clone());

    let manga = repo
        .find_manga_by_id(manga_id)
        .await?
        .ok_or_else(|| AppError::MangaNotFound {
            id: manga_id.to_string(),
        })?;

    auth.require_owner(manga.owner_id)?;

    repo.soft_delete_manga(manga_id).await?;

    tracing::info!(manga_id = %manga_id, user_id = %auth.user_id, "Manga soft-deleted");

    drop_facet_cache(&state).await;

    Ok(StatusCode::NO_CONTENT)
}

/// Genre/tag facets changed; drop the cached rollup. Best-effort.
async fn drop_facet_cache(state: &AppState) {
    if let Some(ref cache) = state.cache {
        if let Err(e) = cache.delete(&keys::tag_facets()).await {
            tracing::warn!(error = %e, "Facet cache invalidation failed");
        }
    }
}

/// Distinguish an absent field from an explicit `null`
fn double_option<'de, T, D>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: serde::Deserialize<'de>,
    D: serde::Deserializer<'de>,
{
    serde::Deserialize::deserialize(deserializer).map(Some)
}

/// Stable cache key for a normalized listing query
fn listing_cache_key(params: &ListMangaParams, page: PageQuery) -> String {
    let mut hasher = Sha256::new();
    hasher.update(params.sort_by.as_deref().unwrap_or("created_at").as_bytes());
    hasher.update(b"\x00");
    hasher.update(params.sort_order.as_deref().unwrap_or("desc").as_bytes());
    hasher.update(b"\x00");
    hasher.update(params.status.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\x00");
    hasher.update(params.genre.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\x00");
    hasher.update(params.q.as_deref().unwrap_or("").as_bytes());
    hasher.update(b"\x00");
    hasher.update(page.page.to_le_bytes());
    hasher.update(page.limit.to_le_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listing_cache_key_is_stable_and_distinct() {
        let a = ListMangaParams {
            sort_by: Some("views".into()),
            page: Some(2),
            ..Default::default()
        };
        let b = ListMangaParams {
            sort_by: Some("views".into()),
            page: Some(3),
            ..Default::default()
        };

        let page_a = PageQuery::new(a.page, a.limit);
        let page_b = PageQuery::new(b.page, b.limit);

        assert_eq!(
            listing_cache_key(&a, page_a),
            listing_cache_key(&a, page_a)
        );
        assert_ne!(
            listing_cache_key(&a, page_a),
            listing_cache_key(&b, page_b)
        );
    }
}
