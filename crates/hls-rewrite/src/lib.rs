//! # hls-rewrite
//!
//! Rewrites HLS playlists so that every segment and encryption key is
//! fetched through a same-origin proxy. Each upstream reference is resolved
//! against the playlist URL and carried, percent-encoded, in the `u` query
//! parameter of the proxy path.
//!
//! The crate has two layers:
//!
//! - [`line`] classifies playlist lines and rewrites them one at a time,
//!   reporting an explicit [`LineOutcome`] for each.
//! - [`resolve`] follows a master playlist to its first variant through a
//!   caller-supplied [`PlaylistFetcher`] before rewriting.

pub mod line;
pub mod resolve;
pub mod rewrite;

pub use line::{LineOutcome, MalformedManifestLine, ManifestLine};
pub use resolve::{PlaylistFetcher, find_first_variant, is_master_playlist, resolve_and_rewrite};
pub use rewrite::{ProxyPaths, RewrittenPlaylist, rewrite_media_playlist};

/// Content type of HLS playlists.
pub const HLS_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";
