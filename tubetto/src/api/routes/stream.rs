//! Video streaming routes.
//!
//! `master.m3u8` hands out a rewritten playlist whose segment and key
//! references point back at `seg` and `key`; those two relay whatever
//! upstream URL they are given in `u` after the host guardrails.

use axum::{
    Router,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{IntoResponse, Response},
    routing::get,
};
use hls_rewrite::{HLS_CONTENT_TYPE, ProxyPaths, resolve_and_rewrite};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::Error;
use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::catalog_video;
use crate::api::server::AppState;
use crate::proxy::MediaKind;
use crate::resolver::StreamType;

/// Query carrying the percent-encoded upstream URL.
#[derive(Debug, Deserialize)]
pub struct UpstreamQuery {
    pub u: Option<String>,
}

/// Create the stream router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/master.m3u8", get(hls_manifest))
        .route("/{id}/seg", get(hls_segment))
        .route("/{id}/key", get(hls_key))
        .route("/{id}/file", get(progressive_file))
}

async fn hls_manifest(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    catalog_video(&state, &id).await?;

    let descriptor = state.resolver.resolve_stream_manifest(&id).await?;
    let manifest_url = descriptor.require(StreamType::Hls)?;
    let manifest_url = Url::parse(manifest_url).map_err(|e| Error::UpstreamError {
        url: manifest_url.to_string(),
        message: format!("unparseable manifest url: {e}"),
    })?;

    let text = state.proxy.fetch_text(&manifest_url).await?;
    let paths = ProxyPaths::for_stream(&urlencoding::encode(&id));
    let playlist = resolve_and_rewrite(&state.proxy, &manifest_url, &text, &paths).await?;

    if !playlist.malformed.is_empty() {
        warn!(
            item_id = %id,
            malformed = playlist.malformed.len(),
            "Manifest lines passed through unchanged"
        );
    }
    debug!(item_id = %id, rewritten = playlist.rewritten, "Rewrote HLS manifest");

    Ok((
        [
            (header::CONTENT_TYPE, HLS_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        playlist.text,
    )
        .into_response())
}

async fn hls_segment(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UpstreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    relay_upstream(&state, &id, query, &headers, MediaKind::Segment, "Missing segment URL").await
}

async fn hls_key(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<UpstreamQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    relay_upstream(&state, &id, query, &headers, MediaKind::Key, "Missing key URL").await
}

async fn relay_upstream(
    state: &AppState,
    id: &str,
    query: UpstreamQuery,
    headers: &HeaderMap,
    kind: MediaKind,
    missing: &str,
) -> ApiResult<Response> {
    catalog_video(state, id).await?;

    let raw = query
        .u
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request(missing))?;
    let upstream = state.proxy.validate_upstream(&raw)?;

    Ok(state
        .proxy
        .proxy(&upstream, range_header(headers), kind)
        .await?)
}

async fn progressive_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    catalog_video(&state, &id).await?;

    let descriptor = state.resolver.resolve_stream_manifest(&id).await?;
    let stream_url = descriptor.require(StreamType::Progressive)?;
    let upstream = Url::parse(stream_url).map_err(|e| Error::UpstreamError {
        url: stream_url.to_string(),
        message: format!("unparseable stream url: {e}"),
    })?;

    Ok(state
        .proxy
        .proxy(&upstream, range_header(&headers), MediaKind::File)
        .await?)
}

pub(crate) fn range_header(headers: &HeaderMap) -> Option<&HeaderValue> {
    headers.get(header::RANGE)
}
