//! Stream resolution.
//!
//! [`StreamResolver`] sits between the HTTP surface and the extraction
//! adapter. Item info, comments, related items and channel listings are
//! memoized in a shared [`MetadataCache`] under separate key namespaces:
//!
//! | namespace | key                       | default TTL |
//! |-----------|---------------------------|-------------|
//! | info      | `{item_id}`               | 90s         |
//! | comments  | `comments:{item_id}:{max}`| 120s        |
//! | related   | `related:{item_id}:{limit}` | 180s      |
//! | channel   | `chflat:{channel_id}:{limit}` | 300s    |
//!
//! Adapter failures are never retried here.

mod descriptor;
mod models;

pub use descriptor::{StreamDescriptor, StreamSource, StreamType};
pub use models::{
    ChannelEntry, ChannelMetadata, Comment, RelatedItem, VideoMetadata, parse_upload_date,
};

use std::sync::Arc;
use std::time::Duration;

use media_extractor::{
    ManifestSelection, MediaExtractor, MediaInfo, select_best_audio, select_manifest,
};
use tracing::{debug, warn};

use crate::cache::TtlCache;
use crate::{Error, Result};

/// Default ceiling on channel listings.
pub const DEFAULT_CHANNEL_LISTING_LIMIT: usize = 500;

/// Values held by the resolver cache, one variant per namespace.
#[derive(Debug, Clone)]
pub enum CachedValue {
    Info(Arc<MediaInfo>),
    Comments(Arc<Vec<Comment>>),
    Related(Arc<Vec<RelatedItem>>),
    ChannelEntries(Arc<Vec<ChannelEntry>>),
}

pub type MetadataCache = TtlCache<CachedValue>;

/// Per-namespace cache lifetimes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtls {
    pub info: Duration,
    pub comments: Duration,
    pub related: Duration,
    pub channel: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            info: Duration::from_secs(90),
            comments: Duration::from_secs(120),
            related: Duration::from_secs(180),
            channel: Duration::from_secs(300),
        }
    }
}

fn comments_key(item_id: &str, max: usize) -> String {
    format!("comments:{item_id}:{max}")
}

fn related_key(item_id: &str, limit: usize) -> String {
    format!("related:{item_id}:{limit}")
}

fn channel_key(channel_id: &str, limit: usize) -> String {
    format!("chflat:{channel_id}:{limit}")
}

/// Adapter + cache + selector orchestration.
pub struct StreamResolver {
    extractor: Arc<dyn MediaExtractor>,
    cache: Arc<MetadataCache>,
    ttls: CacheTtls,
    channel_listing_limit: usize,
}

impl StreamResolver {
    pub fn new(extractor: Arc<dyn MediaExtractor>, cache: Arc<MetadataCache>) -> Self {
        Self {
            extractor,
            cache,
            ttls: CacheTtls::default(),
            channel_listing_limit: DEFAULT_CHANNEL_LISTING_LIMIT,
        }
    }

    pub fn with_ttls(mut self, ttls: CacheTtls) -> Self {
        self.ttls = ttls;
        self
    }

    /// Set the maximum number of entries requested for a channel listing.
    pub fn with_channel_listing_limit(mut self, limit: usize) -> Self {
        self.channel_listing_limit = limit.max(1);
        self
    }

    pub fn cache(&self) -> &Arc<MetadataCache> {
        &self.cache
    }

    pub fn channel_listing_limit(&self) -> usize {
        self.channel_listing_limit
    }

    /// Raw item info, served from the cache when fresh.
    pub async fn resolve_info(&self, item_id: &str) -> Result<Arc<MediaInfo>> {
        if let Some(CachedValue::Info(info)) = self.cache.get(item_id) {
            debug!(item_id, "Item info cache hit");
            return Ok(info);
        }

        let info = self
            .extractor
            .extract(item_id)
            .await
            .map_err(|e| Error::extraction(item_id, &e))?;
        let info = Arc::new(info);
        self.cache
            .set(item_id, CachedValue::Info(Arc::clone(&info)), self.ttls.info);
        Ok(info)
    }

    /// Forces the next [`resolve_info`](Self::resolve_info) to hit the adapter.
    pub fn invalidate_info(&self, item_id: &str) {
        self.cache.invalidate(item_id);
    }

    /// Best playable representation: progressive, then HLS, then DASH.
    pub async fn resolve_stream_manifest(&self, item_id: &str) -> Result<StreamDescriptor> {
        let info = self.resolve_info(item_id).await?;
        let source = match select_manifest(&info.formats) {
            Some(ManifestSelection::Progressive { url, ext }) => StreamSource::Progressive {
                stream_url: url,
                ext,
            },
            Some(ManifestSelection::Hls { manifest_url }) => StreamSource::Hls { manifest_url },
            Some(ManifestSelection::Dash { manifest_url }) => StreamSource::Dash { manifest_url },
            None => return Err(Error::NoPlayableFormat(item_id.to_string())),
        };
        debug!(item_id, stream_type = %source.stream_type(), "Resolved stream manifest");
        Ok(describe(item_id, &info, source))
    }

    /// Best audio-only representation.
    pub async fn resolve_audio_stream(&self, item_id: &str) -> Result<StreamDescriptor> {
        let info = self.resolve_info(item_id).await?;
        let source = select_best_audio(&info.formats)
            .and_then(|format| {
                Some(StreamSource::Audio {
                    stream_url: format.playable_url()?.to_string(),
                    ext: format.extension().map(str::to_string),
                    acodec: format.acodec.clone(),
                })
            })
            .ok_or_else(|| Error::NoAudioStream(item_id.to_string()))?;
        Ok(describe(item_id, &info, source))
    }

    /// Up to `max` top comments. An adapter failure yields an empty list.
    pub async fn resolve_comments(&self, item_id: &str, max: usize) -> Arc<Vec<Comment>> {
        let key = comments_key(item_id, max);
        if let Some(CachedValue::Comments(comments)) = self.cache.get(&key) {
            return comments;
        }

        match self.extractor.extract_comments(item_id, max).await {
            Ok(info) => {
                let comments: Arc<Vec<Comment>> =
                    Arc::new(info.comments.iter().take(max).map(Comment::from).collect());
                self.cache.set(
                    key,
                    CachedValue::Comments(Arc::clone(&comments)),
                    self.ttls.comments,
                );
                comments
            }
            Err(e) => {
                warn!(item_id, error = %e.diagnostic(), "Failed to fetch comments");
                Arc::new(Vec::new())
            }
        }
    }

    /// Up to `limit` related items, derived from the item info.
    pub async fn resolve_related(
        &self,
        item_id: &str,
        limit: usize,
    ) -> Result<Arc<Vec<RelatedItem>>> {
        let key = related_key(item_id, limit);
        if let Some(CachedValue::Related(related)) = self.cache.get(&key) {
            return Ok(related);
        }

        let info = self.resolve_info(item_id).await?;
        let related: Arc<Vec<RelatedItem>> = Arc::new(
            info.related_entries()
                .iter()
                .filter_map(RelatedItem::from_entry)
                .take(limit)
                .collect(),
        );
        self.cache.set(
            key,
            CachedValue::Related(Arc::clone(&related)),
            self.ttls.related,
        );
        Ok(related)
    }

    /// Flat listing of a channel, capped at the configured ceiling.
    pub async fn list_channel_entries(
        &self,
        channel_id: &str,
        limit: Option<usize>,
    ) -> Result<Arc<Vec<ChannelEntry>>> {
        let limit = limit
            .unwrap_or(self.channel_listing_limit)
            .clamp(1, self.channel_listing_limit);
        let key = channel_key(channel_id, limit);
        if let Some(CachedValue::ChannelEntries(entries)) = self.cache.get(&key) {
            return Ok(entries);
        }

        let entries = self
            .extractor
            .list_channel_entries(channel_id, limit)
            .await
            .map_err(|e| Error::extraction(channel_id, &e))?;
        let entries: Arc<Vec<ChannelEntry>> = Arc::new(
            entries
                .iter()
                .filter_map(ChannelEntry::from_entry)
                .take(limit)
                .collect(),
        );
        self.cache.set(
            key,
            CachedValue::ChannelEntries(Arc::clone(&entries)),
            self.ttls.channel,
        );
        Ok(entries)
    }

    /// Drops the cached listing of `channel_id` at the given (clamped) limit.
    pub fn invalidate_channel_entries(&self, channel_id: &str, limit: Option<usize>) {
        let limit = limit
            .unwrap_or(self.channel_listing_limit)
            .clamp(1, self.channel_listing_limit);
        self.cache.invalidate(&channel_key(channel_id, limit));
    }

    /// Channel-level metadata. Not cached.
    pub async fn channel_metadata(&self, channel_id: &str) -> Result<ChannelMetadata> {
        let info = self
            .extractor
            .extract_channel(channel_id)
            .await
            .map_err(|e| Error::extraction(channel_id, &e))?;
        Ok(ChannelMetadata::from(&info))
    }
}

fn describe(item_id: &str, info: &MediaInfo, source: StreamSource) -> StreamDescriptor {
    StreamDescriptor {
        item_id: item_id.to_string(),
        title: info.title.clone(),
        thumbnail: info.best_thumbnail().map(str::to_string),
        duration_seconds: info.duration_secs(),
        channel_name: info.channel_name().map(str::to_string),
        upload_date: info.upload_date.clone(),
        source,
    }
}
