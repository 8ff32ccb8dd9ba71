//! Catalog database models.
//!
//! The `apply_*` methods merge freshly resolved metadata into a stored
//! record and report whether anything changed, so callers only write back
//! on change. Absent values (empty strings, `None`) never overwrite stored
//! ones.

use chrono::NaiveDate;
use media_extractor::MediaInfo;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::resolver::{ChannelMetadata, VideoMetadata};

/// Channel database model.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ChannelRecord {
    /// Origin channel id.
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
}

impl ChannelRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn apply_metadata(&mut self, meta: &ChannelMetadata) -> bool {
        let mut changed = false;
        changed |= merge_text(&mut self.title, &meta.title);
        changed |= merge_text(&mut self.description, &meta.description);
        changed |= merge_text(&mut self.thumbnail, &meta.thumbnail);
        changed |= merge_opt(&mut self.subscriber_count, meta.subscriber_count);
        changed |= merge_opt(&mut self.video_count, meta.video_count);
        changed
    }
}

/// Video database model.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct VideoRecord {
    /// Origin item id.
    pub id: String,
    pub title: String,
    pub description: String,
    /// Duration in whole seconds.
    pub duration: Option<i64>,
    pub upload_date: Option<NaiveDate>,
    pub thumbnail: String,
    /// Catalog channel this video belongs to.
    pub channel_id: Option<String>,
    pub channel_title: String,
    pub channel_external_id: String,
    pub uploader: String,
    pub uploader_id: String,
}

impl VideoRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn apply_metadata(&mut self, meta: &VideoMetadata) -> bool {
        let mut changed = false;
        changed |= merge_text(&mut self.title, &meta.title);
        changed |= merge_text(&mut self.description, &meta.description);
        changed |= merge_opt(&mut self.duration, meta.duration);
        changed |= merge_opt(&mut self.upload_date, meta.upload_date);
        changed |= merge_text(&mut self.thumbnail, &meta.thumbnail);
        changed |= merge_text(&mut self.channel_title, &meta.channel_title);
        changed |= merge_text(&mut self.channel_external_id, &meta.channel_external_id);
        changed |= merge_text(&mut self.uploader, &meta.uploader);
        changed |= merge_text(&mut self.uploader_id, &meta.uploader_id);
        changed
    }

    /// Attaches the video to `channel_id` unless it already has a channel.
    pub fn adopt_channel(&mut self, channel_id: &str) -> bool {
        if self.channel_id.is_some() {
            return false;
        }
        self.channel_id = Some(channel_id.to_string());
        true
    }

    pub fn set_title(&mut self, title: &str) -> bool {
        merge_text(&mut self.title, title)
    }
}

/// Music track database model.
#[derive(Debug, Clone, Default, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct TrackRecord {
    /// Origin item id.
    pub id: String,
    pub title: String,
    pub artist: String,
    pub album: String,
    pub duration: Option<i64>,
}

impl TrackRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Merges title, artist (falling back to the uploader), album and duration.
    pub fn apply_info(&mut self, info: &MediaInfo) -> bool {
        let artist = info
            .artist
            .as_deref()
            .filter(|a| !a.is_empty())
            .or(info.uploader.as_deref())
            .unwrap_or_default();
        let duration = info.duration_secs().and_then(|d| i64::try_from(d).ok());

        let mut changed = false;
        changed |= merge_text(&mut self.title, info.title.as_deref().unwrap_or_default());
        changed |= merge_text(&mut self.artist, artist);
        changed |= merge_text(&mut self.album, info.album.as_deref().unwrap_or_default());
        changed |= merge_opt(&mut self.duration, duration);
        changed
    }
}

fn merge_text(stored: &mut String, fresh: &str) -> bool {
    if fresh.is_empty() || stored == fresh {
        return false;
    }
    *stored = fresh.to_string();
    true
}

fn merge_opt<T: PartialEq>(stored: &mut Option<T>, fresh: Option<T>) -> bool {
    match fresh {
        Some(value) if stored.as_ref() != Some(&value) => {
            *stored = Some(value);
            true
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn video_apply_metadata_reports_changes_only() {
        let mut video = VideoRecord::new("abc");
        let meta = VideoMetadata {
            title: "Talk".to_string(),
            duration: Some(60),
            upload_date: NaiveDate::from_ymd_opt(2024, 5, 1),
            ..Default::default()
        };
        assert!(video.apply_metadata(&meta));
        assert_eq!(video.title, "Talk");
        assert!(!video.apply_metadata(&meta));
    }

    #[test]
    fn absent_values_do_not_clear_stored_ones() {
        let mut video = VideoRecord {
            description: "kept".to_string(),
            duration: Some(10),
            ..VideoRecord::new("abc")
        };
        assert!(!video.apply_metadata(&VideoMetadata::default()));
        assert_eq!(video.description, "kept");
        assert_eq!(video.duration, Some(10));
    }

    #[test]
    fn adopt_channel_keeps_existing() {
        let mut video = VideoRecord::new("abc");
        assert!(video.adopt_channel("c1"));
        assert!(!video.adopt_channel("c2"));
        assert_eq!(video.channel_id.as_deref(), Some("c1"));
    }

    #[test]
    fn track_artist_falls_back_to_uploader() {
        let mut track = TrackRecord::new("t1");
        let info = MediaInfo {
            title: Some("Song".to_string()),
            uploader: Some("Band - Topic".to_string()),
            album: Some("LP".to_string()),
            duration: Some(201.9),
            ..Default::default()
        };
        assert!(track.apply_info(&info));
        assert_eq!(track.artist, "Band - Topic");
        assert_eq!(track.duration, Some(201));
        assert!(!track.apply_info(&info));
    }

    #[test]
    fn channel_apply_metadata() {
        let mut channel = ChannelRecord::new("UC1");
        let meta = ChannelMetadata {
            title: "Chan".to_string(),
            subscriber_count: Some(5),
            ..Default::default()
        };
        assert!(channel.apply_metadata(&meta));
        assert_eq!(channel.subscriber_count, Some(5));
        assert!(!channel.apply_metadata(&meta));
    }
}
