//! Media metadata extraction and playable format selection.
//!
//! The [`extractor`] module wraps the external `yt-dlp` tool behind the
//! [`MediaExtractor`] trait and returns typed [`media::MediaInfo`] values.
//! The [`selector`] module picks the representation to play from the
//! format list of an item.

pub mod extractor;
pub mod media;
pub mod selector;

pub use extractor::{ExtractorError, MediaExtractor, YtDlpConfig, YtDlpExtractor};
pub use media::{FormatDescriptor, MediaInfo};
pub use selector::{ManifestSelection, select_best_audio, select_manifest, select_progressive};
