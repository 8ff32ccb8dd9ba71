//! Batch job trigger routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    response::{IntoResponse, Response},
    routing::post,
};
use tracing::info;

use crate::api::error::{ApiError, ApiResult};
use crate::api::server::AppState;

/// Create the jobs router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{job}", post(run_job))
}

/// Runs one sync job to completion and returns its result.
///
/// `all` returns a report with one result per stage.
async fn run_job(State(state): State<AppState>, Path(job): Path<String>) -> ApiResult<Response> {
    info!(job = %job, "Sync job triggered");
    let sync = &state.sync;
    let result = match job.as_str() {
        "channels" => sync.sync_channels_metadata().await?,
        "scan" => sync.scan_channel_videos().await?,
        "videos" => sync.sync_videos_metadata().await?,
        "music" => sync.sync_music_tracks_metadata().await?,
        "all" => return Ok(Json(sync.run_all().await).into_response()),
        other => return Err(ApiError::not_found(format!("Unknown job '{}'", other))),
    };
    Ok(Json(result).into_response())
}
