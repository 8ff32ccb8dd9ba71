use serde::{Deserialize, Deserializer, Serialize};

use super::media_format::FormatDescriptor;

/// Structured description of a media item, channel page or playlist as
/// emitted by `yt-dlp --dump-single-json`.
///
/// Only the fields this workspace consumes are modelled; anything else in
/// the tool output is ignored. Missing and `null` values both map to the
/// field default so a partially populated payload still deserializes.
///
/// # Examples
///
/// ```rust
/// use media_extractor::media::MediaInfo;
///
/// let info: MediaInfo = serde_json::from_str(
///     r#"{"id":"abc","title":"Song","duration":"212.4","formats":null}"#,
/// )
/// .unwrap();
/// assert_eq!(info.duration_secs(), Some(212));
/// assert!(info.formats.is_empty());
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct MediaInfo {
    pub id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(deserialize_with = "deserialize_seconds")]
    pub duration: Option<f64>,
    pub thumbnail: Option<String>,
    #[serde(deserialize_with = "nullable_vec")]
    pub thumbnails: Vec<Thumbnail>,
    pub channel: Option<String>,
    pub channel_id: Option<String>,
    pub channel_url: Option<String>,
    pub uploader: Option<String>,
    pub uploader_id: Option<String>,
    // Upload date as YYYYMMDD
    pub upload_date: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub channel_follower_count: Option<u64>,
    pub playlist_count: Option<u64>,
    #[serde(deserialize_with = "nullable_vec")]
    pub formats: Vec<FormatDescriptor>,
    #[serde(deserialize_with = "nullable_vec")]
    pub related_videos: Vec<RelatedEntry>,
    /// Older key for the same list; see [`MediaInfo::related_entries`].
    #[serde(deserialize_with = "nullable_vec")]
    pub related: Vec<RelatedEntry>,
    #[serde(deserialize_with = "nullable_vec")]
    pub comments: Vec<CommentInfo>,
    #[serde(deserialize_with = "nullable_vec")]
    pub entries: Vec<PlaylistEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct Thumbnail {
    pub url: Option<String>,
}

/// A suggested item attached to a media item.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RelatedEntry {
    pub id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    #[serde(deserialize_with = "nullable_vec")]
    pub thumbnails: Vec<Thumbnail>,
    pub uploader: Option<String>,
    pub channel: Option<String>,
}

/// A comment as returned with `--write-comments`.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct CommentInfo {
    pub author: Option<String>,
    pub text: Option<String>,
    pub like_count: Option<u64>,
    pub timestamp: Option<i64>,
    #[serde(alias = "_time_text")]
    pub published: Option<String>,
}

/// One entry of a flat playlist listing (`--flat-playlist`).
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct PlaylistEntry {
    pub id: Option<String>,
    pub title: Option<String>,
    pub url: Option<String>,
}

impl MediaInfo {
    /// Duration truncated to whole seconds.
    pub fn duration_secs(&self) -> Option<u64> {
        self.duration
            .filter(|d| d.is_finite() && *d >= 0.0)
            .map(|d| d.trunc() as u64)
    }

    /// Explicit thumbnail, falling back to the last (largest) listed one.
    pub fn best_thumbnail(&self) -> Option<&str> {
        non_empty(self.thumbnail.as_deref())
            .or_else(|| last_thumbnail(&self.thumbnails))
    }

    /// `related_videos`, or `related` when the former is empty.
    pub fn related_entries(&self) -> &[RelatedEntry] {
        if self.related_videos.is_empty() {
            &self.related
        } else {
            &self.related_videos
        }
    }

    /// Display name of the owning channel.
    pub fn channel_name(&self) -> Option<&str> {
        non_empty(self.channel.as_deref()).or_else(|| non_empty(self.uploader.as_deref()))
    }
}

impl RelatedEntry {
    /// Item id from `id`, or from the `v=` parameter of `url`.
    pub fn item_id(&self) -> Option<&str> {
        non_empty(self.id.as_deref()).or_else(|| {
            let (_, rest) = self.url.as_deref()?.rsplit_once("v=")?;
            non_empty(rest.split('&').next())
        })
    }

    pub fn best_thumbnail(&self) -> Option<&str> {
        last_thumbnail(&self.thumbnails).or_else(|| {
            self.thumbnails
                .first()
                .and_then(|t| non_empty(t.url.as_deref()))
        })
    }
}

fn last_thumbnail(thumbnails: &[Thumbnail]) -> Option<&str> {
    thumbnails.last().and_then(|t| non_empty(t.url.as_deref()))
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

fn nullable_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts a number, a numeric string or null.
fn deserialize_seconds<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Seconds {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Seconds>::deserialize(deserializer)? {
        Some(Seconds::Number(n)) => Some(n),
        Some(Seconds::Text(s)) => s.trim().parse::<f64>().ok(),
        None => None,
    })
}
