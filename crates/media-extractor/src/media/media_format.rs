use serde::{Deserialize, Serialize};

/// Codec marker yt-dlp uses when a stream kind is absent from a format.
const NO_CODEC: &str = "none";

/// One delivery format of a media item as reported by the extraction tool.
///
/// Every field is optional because the tool omits or nulls fields freely
/// depending on the site and the protocol of the format.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(default)]
pub struct FormatDescriptor {
    pub format_id: Option<String>,
    // Video codec, "none" for audio-only formats
    pub vcodec: Option<String>,
    // Audio codec, "none" for video-only formats
    pub acodec: Option<String>,
    // Container / file extension, e.g. "mp4", "m4a", "webm"
    pub ext: Option<String>,
    // Transport protocol, e.g. "https", "m3u8_native", "http_dash_segments"
    pub protocol: Option<String>,
    // Total bitrate in kbit/s
    pub tbr: Option<f64>,
    // Audio bitrate in kbit/s
    pub abr: Option<f64>,
    pub url: Option<String>,
    pub manifest_url: Option<String>,
}

fn is_present_codec(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if !c.is_empty() && c != NO_CODEC)
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

impl FormatDescriptor {
    pub fn has_video(&self) -> bool {
        is_present_codec(self.vcodec.as_deref())
    }

    pub fn has_audio(&self) -> bool {
        is_present_codec(self.acodec.as_deref())
    }

    /// Audio track with no video stream attached.
    pub fn is_audio_only(&self) -> bool {
        !self.has_video() && self.has_audio()
    }

    /// The format URL, if any, ignoring empty strings.
    pub fn playable_url(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.is_empty())
    }

    pub fn extension(&self) -> Option<&str> {
        self.ext.as_deref().filter(|e| !e.is_empty())
    }

    pub fn has_extension(&self, ext: &str) -> bool {
        self.extension()
            .is_some_and(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Total bitrate, zero when unknown.
    pub fn total_bitrate(&self) -> f64 {
        positive(self.tbr).unwrap_or(0.0)
    }

    /// Bitrate used to rank audio tracks: total bitrate, then audio bitrate, then zero.
    pub fn audio_bitrate(&self) -> f64 {
        positive(self.tbr).or(positive(self.abr)).unwrap_or(0.0)
    }

    /// Plain HTTP(S) download, i.e. a single file rather than a segmented protocol.
    pub fn is_http_transport(&self) -> bool {
        matches!(self.protocol.as_deref(), Some("http" | "https"))
    }

    /// HLS playlist, identified by protocol (`m3u8`, `m3u8_native`) or by URL.
    pub fn is_hls(&self) -> bool {
        let hls_protocol = self
            .protocol
            .as_deref()
            .is_some_and(|p| p.starts_with("m3u8"));
        hls_protocol || self.url.as_deref().is_some_and(|u| u.contains("m3u8"))
    }

    /// DASH representation: carries a manifest URL or points at an `.mpd` file.
    pub fn is_dash(&self) -> bool {
        self.manifest_url.as_deref().is_some_and(|m| !m.is_empty())
            || self.url.as_deref().is_some_and(|u| u.ends_with(".mpd"))
    }

    /// URL of the DASH manifest for this format.
    pub fn dash_manifest_url(&self) -> Option<&str> {
        self.manifest_url
            .as_deref()
            .filter(|m| !m.is_empty())
            .or_else(|| self.playable_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn none_codec_is_absent() {
        let format = FormatDescriptor {
            vcodec: Some("none".to_string()),
            acodec: Some("opus".to_string()),
            ..Default::default()
        };
        assert!(!format.has_video());
        assert!(format.has_audio());
        assert!(format.is_audio_only());
    }

    #[test]
    fn audio_bitrate_falls_back_to_abr() {
        let format = FormatDescriptor {
            tbr: Some(0.0),
            abr: Some(129.5),
            ..Default::default()
        };
        assert_eq!(format.audio_bitrate(), 129.5);
        assert_eq!(format.total_bitrate(), 0.0);
    }

    #[test]
    fn hls_detected_by_protocol_or_url() {
        let by_protocol = FormatDescriptor {
            protocol: Some("m3u8_native".to_string()),
            ..Default::default()
        };
        let by_url = FormatDescriptor {
            url: Some("https://cdn.example.com/index.m3u8?sig=1".to_string()),
            ..Default::default()
        };
        assert!(by_protocol.is_hls());
        assert!(by_url.is_hls());
        assert!(!FormatDescriptor::default().is_hls());
    }

    #[test]
    fn dash_manifest_prefers_manifest_url() {
        let format = FormatDescriptor {
            url: Some("https://cdn.example.com/video.mpd".to_string()),
            manifest_url: Some("https://cdn.example.com/manifest.mpd".to_string()),
            ..Default::default()
        };
        assert!(format.is_dash());
        assert_eq!(
            format.dash_manifest_url(),
            Some("https://cdn.example.com/manifest.mpd")
        );
    }

    #[test]
    fn deserializes_nulls_and_unknown_fields() {
        let json = r#"{"format_id":"18","vcodec":"avc1.42001E","acodec":null,"tbr":null,"fps":30,"url":"https://x"}"#;
        let format: FormatDescriptor = serde_json::from_str(json).unwrap();
        assert_eq!(format.format_id.as_deref(), Some("18"));
        assert!(format.acodec.is_none());
        assert_eq!(format.total_bitrate(), 0.0);
    }
}
