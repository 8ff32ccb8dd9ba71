//! Playable format selection.
//!
//! All selectors are pure: the same format list always yields the same
//! choice. Ranking is descending on the sort key and ties keep the format
//! that appears first in the list.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::media::FormatDescriptor;

/// Containers preferred for audio-only playback.
const PREFERRED_AUDIO_CONTAINERS: &[&str] = &["m4a", "mp4", "mp4a"];

/// Outcome of the tiered manifest selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ManifestSelection {
    /// Single muxed file served over HTTP(S).
    Progressive { url: String, ext: Option<String> },
    /// HLS playlist.
    Hls { manifest_url: String },
    /// DASH manifest.
    Dash { manifest_url: String },
}

/// Best audio-only format.
///
/// Candidates have no video codec, a real audio codec and a URL. They are
/// ranked by `(preferred container, bitrate)`, so an `m4a` track beats a
/// higher-bitrate `webm` one.
pub fn select_best_audio(formats: &[FormatDescriptor]) -> Option<&FormatDescriptor> {
    first_max_by(
        formats
            .iter()
            .filter(|f| f.is_audio_only() && f.playable_url().is_some()),
        |a, b| {
            preferred_audio_container(a)
                .cmp(&preferred_audio_container(b))
                .then_with(|| a.audio_bitrate().total_cmp(&b.audio_bitrate()))
        },
    )
}

/// Best progressive (muxed audio+video over plain HTTP) format, preferring
/// `mp4`, then bitrate.
pub fn select_progressive(formats: &[FormatDescriptor]) -> Option<&FormatDescriptor> {
    first_max_by(
        formats.iter().filter(|f| {
            f.has_video() && f.has_audio() && f.is_http_transport() && f.playable_url().is_some()
        }),
        |a, b| {
            a.has_extension("mp4")
                .cmp(&b.has_extension("mp4"))
                .then_with(|| a.total_bitrate().total_cmp(&b.total_bitrate()))
        },
    )
}

/// Tiered selection: progressive, then the highest-bitrate HLS playlist,
/// then the first DASH manifest.
///
/// Returns `None` when every tier is empty.
pub fn select_manifest(formats: &[FormatDescriptor]) -> Option<ManifestSelection> {
    if let Some(progressive) = select_progressive(formats)
        && let Some(url) = progressive.playable_url()
    {
        return Some(ManifestSelection::Progressive {
            url: url.to_string(),
            ext: progressive.extension().map(str::to_string),
        });
    }

    let hls = first_max_by(
        formats
            .iter()
            .filter(|f| f.is_hls() && f.playable_url().is_some()),
        |a, b| a.total_bitrate().total_cmp(&b.total_bitrate()),
    );
    if let Some(url) = hls.and_then(FormatDescriptor::playable_url) {
        return Some(ManifestSelection::Hls {
            manifest_url: url.to_string(),
        });
    }

    formats
        .iter()
        .filter(|f| f.is_dash())
        .find_map(FormatDescriptor::dash_manifest_url)
        .map(|manifest_url| ManifestSelection::Dash {
            manifest_url: manifest_url.to_string(),
        })
}

fn preferred_audio_container(format: &FormatDescriptor) -> bool {
    PREFERRED_AUDIO_CONTAINERS
        .iter()
        .any(|ext| format.has_extension(ext))
}

/// Maximum under `cmp`, keeping the earliest element among equals.
fn first_max_by<'a, I, F>(candidates: I, mut cmp: F) -> Option<&'a FormatDescriptor>
where
    I: Iterator<Item = &'a FormatDescriptor>,
    F: FnMut(&FormatDescriptor, &FormatDescriptor) -> Ordering,
{
    candidates.reduce(|best, candidate| {
        if cmp(candidate, best) == Ordering::Greater {
            candidate
        } else {
            best
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(vcodec: Option<&str>, acodec: Option<&str>, ext: &str, tbr: f64, url: &str) -> FormatDescriptor {
        FormatDescriptor {
            vcodec: vcodec.map(str::to_string),
            acodec: acodec.map(str::to_string),
            ext: Some(ext.to_string()),
            protocol: Some("https".to_string()),
            tbr: Some(tbr),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn hls(tbr: f64, url: &str) -> FormatDescriptor {
        FormatDescriptor {
            vcodec: Some("avc1".to_string()),
            acodec: Some("none".to_string()),
            ext: Some("mp4".to_string()),
            protocol: Some("m3u8_native".to_string()),
            tbr: Some(tbr),
            url: Some(url.to_string()),
            ..Default::default()
        }
    }

    fn dash(url: &str) -> FormatDescriptor {
        FormatDescriptor {
            vcodec: Some("vp9".to_string()),
            acodec: Some("none".to_string()),
            protocol: Some("http_dash_segments".to_string()),
            url: Some(format!("{url}/fragment")),
            manifest_url: Some(url.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn audio_container_preference_beats_bitrate() {
        let formats = vec![
            FormatDescriptor {
                acodec: Some("none".to_string()),
                url: Some("v".to_string()),
                ..Default::default()
            },
            format(Some("none"), Some("aac"), "webm", 90.0, "a"),
            format(Some("none"), Some("aac"), "m4a", 80.0, "b"),
        ];
        let best = select_best_audio(&formats).unwrap();
        assert_eq!(best.url.as_deref(), Some("b"));
    }

    #[test]
    fn audio_requires_url_and_codec() {
        let formats = vec![
            format(Some("none"), Some("opus"), "webm", 160.0, ""),
            format(None, Some("none"), "m4a", 128.0, "x"),
        ];
        assert!(select_best_audio(&formats).is_none());
    }

    #[test]
    fn audio_ties_keep_first() {
        let formats = vec![
            format(None, Some("mp4a"), "m4a", 128.0, "first"),
            format(None, Some("mp4a"), "m4a", 128.0, "second"),
        ];
        assert_eq!(
            select_best_audio(&formats).unwrap().url.as_deref(),
            Some("first")
        );
    }

    #[test]
    fn progressive_prefers_mp4_then_bitrate() {
        let formats = vec![
            format(Some("vp9"), Some("opus"), "webm", 2000.0, "webm"),
            format(Some("avc1"), Some("mp4a"), "mp4", 500.0, "low"),
            format(Some("avc1"), Some("mp4a"), "mp4", 900.0, "high"),
        ];
        assert_eq!(
            select_progressive(&formats).unwrap().url.as_deref(),
            Some("high")
        );
    }

    #[test]
    fn progressive_absent_without_muxed_format() {
        let formats = vec![
            format(Some("avc1"), Some("none"), "mp4", 900.0, "video"),
            format(Some("none"), Some("mp4a"), "m4a", 128.0, "audio"),
        ];
        assert!(select_progressive(&formats).is_none());
    }

    #[test]
    fn progressive_requires_plain_http() {
        let mut muxed = format(Some("avc1"), Some("mp4a"), "mp4", 900.0, "x");
        muxed.protocol = Some("m3u8_native".to_string());
        assert!(select_progressive(&[muxed]).is_none());
    }

    #[test]
    fn manifest_prefers_progressive() {
        let formats = vec![
            hls(5000.0, "https://o/hls.m3u8"),
            format(Some("avc1"), Some("mp4a"), "mp4", 500.0, "https://o/file.mp4"),
        ];
        assert_eq!(
            select_manifest(&formats),
            Some(ManifestSelection::Progressive {
                url: "https://o/file.mp4".to_string(),
                ext: Some("mp4".to_string()),
            })
        );
    }

    #[test]
    fn manifest_prefers_hls_over_dash() {
        let formats = vec![
            dash("https://o/manifest.mpd"),
            hls(800.0, "https://o/low.m3u8"),
            hls(2400.0, "https://o/high.m3u8"),
        ];
        assert_eq!(
            select_manifest(&formats),
            Some(ManifestSelection::Hls {
                manifest_url: "https://o/high.m3u8".to_string()
            })
        );
    }

    #[test]
    fn manifest_falls_back_to_first_dash() {
        let formats = vec![
            format(Some("none"), Some("opus"), "webm", 160.0, "https://o/audio"),
            dash("https://o/first.mpd"),
            dash("https://o/second.mpd"),
        ];
        assert_eq!(
            select_manifest(&formats),
            Some(ManifestSelection::Dash {
                manifest_url: "https://o/first.mpd".to_string()
            })
        );
    }

    #[test]
    fn manifest_none_when_all_tiers_empty() {
        let formats = vec![format(Some("none"), Some("opus"), "webm", 160.0, "https://o/a")];
        assert!(select_manifest(&formats).is_none());
        assert!(select_manifest(&[]).is_none());
    }
}
