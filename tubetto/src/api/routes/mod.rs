//! API route modules.
//!
//! Organizes routes by resource type.

pub mod audio;
pub mod health;
pub mod jobs;
pub mod logging;
pub mod stream;
pub mod videos;

use axum::Router;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;
use crate::database::VideoRecord;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/stream", stream::router())
        .nest("/audio", audio::router())
        .nest("/api/videos", videos::router())
        .nest("/api/jobs", jobs::router())
        .nest("/api/logging", logging::router())
        .nest("/health", health::router())
        .with_state(state)
}

/// Only videos present in the catalog are served.
pub(crate) async fn catalog_video(state: &AppState, video_id: &str) -> ApiResult<VideoRecord> {
    state
        .catalog
        .get_video(video_id)
        .await?
        .ok_or_else(|| ApiError::forbidden("Not allowed"))
}
