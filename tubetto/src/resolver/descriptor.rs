use serde::{Deserialize, Serialize};
use std::fmt;

/// How a resolved item is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Progressive,
    Hls,
    Dash,
    Audio,
}

impl StreamType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Progressive => "progressive",
            StreamType::Hls => "hls",
            StreamType::Dash => "dash",
            StreamType::Audio => "audio",
        }
    }
}

impl fmt::Display for StreamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upstream location of a resolved stream.
///
/// File-like kinds carry a `stream_url`, manifest kinds a `manifest_url`;
/// never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stream_type", rename_all = "lowercase")]
pub enum StreamSource {
    Progressive {
        stream_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ext: Option<String>,
    },
    Hls {
        manifest_url: String,
    },
    Dash {
        manifest_url: String,
    },
    Audio {
        stream_url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        ext: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        acodec: Option<String>,
    },
}

impl StreamSource {
    pub fn stream_type(&self) -> StreamType {
        match self {
            StreamSource::Progressive { .. } => StreamType::Progressive,
            StreamSource::Hls { .. } => StreamType::Hls,
            StreamSource::Dash { .. } => StreamType::Dash,
            StreamSource::Audio { .. } => StreamType::Audio,
        }
    }

    /// The single upstream URL, whichever kind it is.
    pub fn upstream_url(&self) -> &str {
        match self {
            StreamSource::Progressive { stream_url, .. }
            | StreamSource::Audio { stream_url, .. } => stream_url,
            StreamSource::Hls { manifest_url } | StreamSource::Dash { manifest_url } => {
                manifest_url
            }
        }
    }
}

/// Normalized result of stream resolution, shared by every proxy endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamDescriptor {
    pub item_id: String,
    pub title: Option<String>,
    pub thumbnail: Option<String>,
    pub duration_seconds: Option<u64>,
    pub channel_name: Option<String>,
    /// Upload date as reported by the origin (YYYYMMDD).
    pub upload_date: Option<String>,
    #[serde(flatten)]
    pub source: StreamSource,
}

impl StreamDescriptor {
    pub fn stream_type(&self) -> StreamType {
        self.source.stream_type()
    }

    pub fn stream_url(&self) -> Option<&str> {
        match &self.source {
            StreamSource::Progressive { stream_url, .. }
            | StreamSource::Audio { stream_url, .. } => Some(stream_url),
            _ => None,
        }
    }

    pub fn manifest_url(&self) -> Option<&str> {
        match &self.source {
            StreamSource::Hls { manifest_url } | StreamSource::Dash { manifest_url } => {
                Some(manifest_url)
            }
            _ => None,
        }
    }

    /// Upstream URL if the descriptor is of the `expected` kind.
    pub fn require(&self, expected: StreamType) -> crate::Result<&str> {
        let actual = self.stream_type();
        if actual == expected {
            Ok(self.source.upstream_url())
        } else {
            Err(crate::Error::UnexpectedStreamType {
                item_id: self.item_id.clone(),
                expected,
                actual,
            })
        }
    }
}
