//! Audio streaming routes.

use axum::{
    Router,
    extract::{Path, State},
    http::HeaderMap,
    response::Response,
    routing::get,
};
use url::Url;

use crate::Error;
use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::stream::range_header;
use crate::api::server::AppState;
use crate::proxy::MediaKind;
use crate::resolver::StreamType;

/// Create the audio router.
pub fn router() -> Router<AppState> {
    Router::new().route("/{id}/stream", get(audio_stream))
}

/// Proxies a freshly resolved audio-only stream of a catalog track.
async fn audio_stream(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    state
        .catalog
        .get_track(&id)
        .await?
        .ok_or_else(|| ApiError::forbidden("Not allowed"))?;

    let descriptor = state.resolver.resolve_audio_stream(&id).await?;
    let stream_url = descriptor.require(StreamType::Audio)?;
    let upstream = Url::parse(stream_url).map_err(|e| Error::UpstreamError {
        url: stream_url.to_string(),
        message: format!("unparseable stream url: {e}"),
    })?;

    Ok(state
        .proxy
        .proxy(&upstream, range_header(&headers), MediaKind::Audio)
        .await?)
}
