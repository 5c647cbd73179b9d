//! Genre/tag facet handler

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use tankobon_common::{cache::keys, db::Repository, db::TagFacet, errors::Result, metrics};

#[derive(Serialize)]
pub struct TagsResponse {
    pub data: Vec<TagFacet>,
}

/// Distinct genres and tags over non-deleted manga, with usage counts
pub async fn list_tags(State(state): State<AppState>) -> Result<Json<TagsResponse>> {
    let repo = Repository::new(state.db.clone());

    let cache_key = keys::tag_facets();
    if let Some(ref cache) = state.cache {
        if let Ok(Some(hit)) = cache.get::<Vec<TagFacet>>(&cache_key).await {
            metrics::record_cache(true, "tags");
            return Ok(Json(TagsResponse { data: hit }));
        }
        metrics::record_cache(false, "tags");
    }

    let facets = repo.tag_facets().await?;

    if let Some(ref cache) = state.cache {
        let ttl = state.config.redis.default_ttl_secs;
        if let Err(e) = cache.set_with_ttl(&cache_key, &facets, ttl).await {
            tracing::warn!(error = %e, "Facet cache write failed");
        }
    }

    Ok(Json(TagsResponse { data: facets }))
}
