use async_trait::async_trait;

use super::error::ExtractorError;
use crate::media::{MediaInfo, PlaylistEntry};

/// Source of structured media metadata.
///
/// Implementations must be cheap to share across tasks; callers hold them
/// behind an `Arc<dyn MediaExtractor>`.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Full description of an item, including its delivery formats.
    async fn extract(&self, item_id: &str) -> Result<MediaInfo, ExtractorError>;

    /// Item description with up to `max_comments` top comments attached.
    async fn extract_comments(
        &self,
        item_id: &str,
        max_comments: usize,
    ) -> Result<MediaInfo, ExtractorError>;

    /// Channel-level metadata (title, description, counts).
    async fn extract_channel(&self, channel_id: &str) -> Result<MediaInfo, ExtractorError>;

    /// Flat listing of at most `limit` items published by a channel.
    async fn list_channel_entries(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<PlaylistEntry>, ExtractorError>;
}
