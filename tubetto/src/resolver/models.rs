//! Normalized views of extractor output.

use chrono::NaiveDate;
use media_extractor::media::{CommentInfo, MediaInfo, PlaylistEntry, RelatedEntry};
use serde::{Deserialize, Serialize};

/// Persistable item metadata. Empty strings mean "not reported".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub duration: Option<i64>,
    pub upload_date: Option<NaiveDate>,
    pub thumbnail: String,
    pub channel_title: String,
    pub channel_external_id: String,
    pub uploader: String,
    pub uploader_id: String,
}

impl VideoMetadata {
    pub fn from_info(info: &MediaInfo) -> Self {
        Self {
            title: text(info.title.as_deref()),
            description: text(info.description.as_deref()),
            duration: info.duration_secs().and_then(|d| i64::try_from(d).ok()),
            upload_date: info.upload_date.as_deref().and_then(parse_upload_date),
            thumbnail: text(info.thumbnail.as_deref()),
            channel_title: text(info.channel.as_deref()),
            channel_external_id: text(
                non_empty(info.channel_id.as_deref()).or(info.channel_url.as_deref()),
            ),
            uploader: text(info.uploader.as_deref()),
            uploader_id: text(info.uploader_id.as_deref()),
        }
    }
}

/// Parses the origin's `YYYYMMDD` date; anything else is absent.
pub fn parse_upload_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y%m%d").ok()
}

/// A top comment on an item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub text: String,
    pub like_count: u64,
    pub timestamp: i64,
    pub published: String,
}

impl From<&CommentInfo> for Comment {
    fn from(c: &CommentInfo) -> Self {
        Self {
            author: text(c.author.as_deref()),
            text: text(c.text.as_deref()),
            like_count: c.like_count.unwrap_or(0),
            timestamp: c.timestamp.unwrap_or(0),
            published: text(c.published.as_deref()),
        }
    }
}

/// A suggested item.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedItem {
    pub item_id: String,
    pub title: String,
    pub thumbnail_url: String,
    pub channel: String,
}

impl RelatedItem {
    /// `None` when the entry carries no usable id.
    pub fn from_entry(entry: &RelatedEntry) -> Option<Self> {
        let item_id = entry.item_id()?.to_string();
        Some(Self {
            item_id,
            title: text(entry.title.as_deref()),
            thumbnail_url: text(entry.best_thumbnail()),
            channel: text(non_empty(entry.uploader.as_deref()).or(entry.channel.as_deref())),
        })
    }
}

/// One item of a channel's flat listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelEntry {
    pub item_id: String,
    pub title: String,
}

impl ChannelEntry {
    pub fn from_entry(entry: &PlaylistEntry) -> Option<Self> {
        let item_id = non_empty(entry.id.as_deref())?.to_string();
        Some(Self {
            item_id,
            title: text(entry.title.as_deref()),
        })
    }
}

/// Channel-level metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadata {
    pub title: String,
    pub description: String,
    pub thumbnail: String,
    pub subscriber_count: Option<i64>,
    pub video_count: Option<i64>,
}

impl From<&MediaInfo> for ChannelMetadata {
    fn from(info: &MediaInfo) -> Self {
        Self {
            title: text(info.channel_name()),
            description: text(info.description.as_deref()),
            thumbnail: text(info.best_thumbnail()),
            subscriber_count: positive_count(info.channel_follower_count),
            video_count: positive_count(info.playlist_count),
        }
    }
}

fn positive_count(value: Option<u64>) -> Option<i64> {
    value.filter(|v| *v > 0).and_then(|v| i64::try_from(v).ok())
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn text(value: Option<&str>) -> String {
    value.unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use media_extractor::media::Thumbnail;

    #[test]
    fn video_metadata_normalizes_fields() {
        let info: MediaInfo = serde_json::from_value(serde_json::json!({
            "title": "Talk",
            "duration": "3605.9",
            "upload_date": "20240131",
            "channel": "Conf",
            "channel_id": "",
            "channel_url": "https://www.youtube.com/channel/UC1",
            "uploader": "conf-uploads",
            "uploader_id": null
        }))
        .unwrap();

        let meta = VideoMetadata::from_info(&info);
        assert_eq!(meta.title, "Talk");
        assert_eq!(meta.duration, Some(3605));
        assert_eq!(meta.upload_date, NaiveDate::from_ymd_opt(2024, 1, 31));
        assert_eq!(meta.channel_external_id, "https://www.youtube.com/channel/UC1");
        assert_eq!(meta.uploader_id, "");
        assert_eq!(meta.description, "");
    }

    #[test]
    fn invalid_upload_date_is_absent() {
        assert!(parse_upload_date("2024-01-31").is_none());
        assert!(parse_upload_date("20241341").is_none());
        assert_eq!(parse_upload_date("19991231"), NaiveDate::from_ymd_opt(1999, 12, 31));
    }

    #[test]
    fn related_item_requires_an_id() {
        let entry = RelatedEntry {
            url: Some("https://www.youtube.com/watch?v=xyz&t=3".to_string()),
            thumbnails: vec![
                Thumbnail {
                    url: Some("small".to_string()),
                },
                Thumbnail {
                    url: Some("big".to_string()),
                },
            ],
            channel: Some("Chan".to_string()),
            ..Default::default()
        };
        let item = RelatedItem::from_entry(&entry).unwrap();
        assert_eq!(item.item_id, "xyz");
        assert_eq!(item.thumbnail_url, "big");
        assert_eq!(item.channel, "Chan");

        assert!(RelatedItem::from_entry(&RelatedEntry::default()).is_none());
    }

    #[test]
    fn comment_defaults_missing_fields() {
        let comment = Comment::from(&CommentInfo {
            text: Some("nice".to_string()),
            ..Default::default()
        });
        assert_eq!(comment.text, "nice");
        assert_eq!(comment.author, "");
        assert_eq!(comment.like_count, 0);
    }

    #[test]
    fn channel_metadata_prefers_channel_name() {
        let info = MediaInfo {
            uploader: Some("Uploader".to_string()),
            channel_follower_count: Some(0),
            playlist_count: Some(42),
            ..Default::default()
        };
        let meta = ChannelMetadata::from(&info);
        assert_eq!(meta.title, "Uploader");
        assert_eq!(meta.subscriber_count, None);
        assert_eq!(meta.video_count, Some(42));
    }
}
