//! Video metadata routes.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::api::error::ApiResult;
use crate::api::routes::catalog_video;
use crate::api::server::AppState;
use crate::resolver::{Comment, RelatedItem, StreamDescriptor};

pub const DEFAULT_COMMENTS_MAX: usize = 50;
pub const DEFAULT_RELATED_LIMIT: usize = 12;

#[derive(Debug, Deserialize)]
pub struct CommentsQuery {
    pub max: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct RelatedQuery {
    pub limit: Option<usize>,
}

/// Create the videos router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/stream-info", get(stream_info))
        .route("/{id}/comments", get(comments))
        .route("/{id}/related", get(related))
}

/// Resolved stream descriptor of a catalog video.
async fn stream_info(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<StreamDescriptor>> {
    catalog_video(&state, &id).await?;
    let descriptor = state.resolver.resolve_stream_manifest(&id).await?;
    Ok(Json(descriptor))
}

/// Top comments; an extractor failure yields an empty list.
async fn comments(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<CommentsQuery>,
) -> Json<Arc<Vec<Comment>>> {
    let max = query.max.unwrap_or(DEFAULT_COMMENTS_MAX);
    Json(state.resolver.resolve_comments(&id, max).await)
}

async fn related(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RelatedQuery>,
) -> ApiResult<Json<Arc<Vec<RelatedItem>>>> {
    let limit = query.limit.unwrap_or(DEFAULT_RELATED_LIMIT);
    Ok(Json(state.resolver.resolve_related(&id, limit).await?))
}
