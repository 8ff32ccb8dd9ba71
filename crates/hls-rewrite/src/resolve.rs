//! Master-to-media playlist resolution.

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::rewrite::{ProxyPaths, RewrittenPlaylist, rewrite_media_playlist};

const STREAM_INF_TAG: &str = "#EXT-X-STREAM-INF";

/// Fetches playlist text over the network.
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    type Error: Send;

    async fn fetch_playlist(&self, url: &Url) -> Result<String, Self::Error>;
}

/// True if any line is a stream-variant directive.
pub fn is_master_playlist(text: &str) -> bool {
    text.lines()
        .any(|line| line.trim().starts_with(STREAM_INF_TAG))
}

/// URI of the first variant: the first non-blank, non-directive line after
/// the first `#EXT-X-STREAM-INF`.
pub fn find_first_variant(text: &str) -> Option<&str> {
    let mut lines = text.lines().map(str::trim);
    lines.find(|line| line.starts_with(STREAM_INF_TAG))?;
    lines.find(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Rewrites the playlist at `manifest_url` whose text has already been
/// fetched.
///
/// A master playlist is followed one level: its first variant is fetched
/// and rewritten against its own URL. When no variant can be located the
/// original text is rewritten as-is. Only a failed variant fetch is an
/// error.
pub async fn resolve_and_rewrite<F>(
    fetcher: &F,
    manifest_url: &Url,
    text: &str,
    paths: &ProxyPaths,
) -> Result<RewrittenPlaylist, F::Error>
where
    F: PlaylistFetcher + ?Sized,
{
    if is_master_playlist(text) {
        let variant = find_first_variant(text).and_then(|uri| match manifest_url.join(uri) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(%manifest_url, uri, error = %e, "Unresolvable variant URI");
                None
            }
        });

        match variant {
            Some(variant_url) => {
                debug!(%manifest_url, %variant_url, "Following first variant of master playlist");
                let media = fetcher.fetch_playlist(&variant_url).await?;
                return Ok(rewrite_media_playlist(&media, &variant_url, paths));
            }
            None => {
                warn!(%manifest_url, "Master playlist has no usable variant, rewriting as-is");
            }
        }
    }

    Ok(rewrite_media_playlist(text, manifest_url, paths))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeFetcher {
        playlists: HashMap<String, String>,
        requested: Mutex<Vec<String>>,
    }

    impl FakeFetcher {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.playlists.insert(url.to_string(), body.to_string());
            self
        }

        fn requested(&self) -> Vec<String> {
            self.requested.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PlaylistFetcher for FakeFetcher {
        type Error = String;

        async fn fetch_playlist(&self, url: &Url) -> Result<String, String> {
            self.requested.lock().unwrap().push(url.to_string());
            self.playlists
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| format!("404 {url}"))
        }
    }

    const MASTER: &str = "#EXTM3U\n\
        #EXT-X-STREAM-INF:BANDWIDTH=800000\n\
        \n\
        v1.m3u8\n\
        #EXT-X-STREAM-INF:BANDWIDTH=2400000\n\
        v2.m3u8\n";

    #[test]
    fn finds_first_variant() {
        assert_eq!(find_first_variant(MASTER), Some("v1.m3u8"));
        assert!(is_master_playlist(MASTER));
        assert!(!is_master_playlist("#EXTM3U\nseg.ts"));
    }

    #[test]
    fn variant_skips_interleaved_directives() {
        let text = "#EXT-X-STREAM-INF:BANDWIDTH=1\n#EXT-X-CUSTOM\n  lo/index.m3u8  \n";
        assert_eq!(find_first_variant(text), Some("lo/index.m3u8"));
        assert_eq!(find_first_variant("#EXT-X-STREAM-INF:BANDWIDTH=1\n\n"), None);
    }

    #[tokio::test]
    async fn rewrites_fetched_variant_not_master() {
        let fetcher = FakeFetcher::default().with(
            "http://o/live/v1.m3u8",
            "#EXTM3U\n#EXTINF:4,\nchunk-1.ts\n#EXTINF:4,\nchunk-2.ts",
        );
        let master_url = Url::parse("http://o/live/master.m3u8").unwrap();
        let paths = ProxyPaths::for_stream("abc");

        let out = resolve_and_rewrite(&fetcher, &master_url, MASTER, &paths)
            .await
            .unwrap();

        assert_eq!(fetcher.requested(), vec!["http://o/live/v1.m3u8"]);
        assert!(!out.text.contains("STREAM-INF"));
        assert!(!out.text.contains("v2.m3u8"));
        assert!(out.text.contains("chunk-1.ts"));
        assert_eq!(out.rewritten, 2);
    }

    #[tokio::test]
    async fn media_playlist_is_rewritten_without_fetching() {
        let fetcher = FakeFetcher::default();
        let url = Url::parse("http://o/x/index.m3u8").unwrap();
        let out = resolve_and_rewrite(&fetcher, &url, "seg1.ts\nseg2.ts", &ProxyPaths::for_stream("abc"))
            .await
            .unwrap();
        assert!(fetcher.requested().is_empty());
        assert_eq!(out.rewritten, 2);
    }

    #[tokio::test]
    async fn master_without_variant_uri_is_rewritten_as_is() {
        let fetcher = FakeFetcher::default();
        let url = Url::parse("http://o/x/master.m3u8").unwrap();
        let text = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1";
        let out = resolve_and_rewrite(&fetcher, &url, text, &ProxyPaths::for_stream("abc"))
            .await
            .unwrap();
        assert!(fetcher.requested().is_empty());
        assert_eq!(out.text, text);
    }

    #[tokio::test]
    async fn variant_fetch_failure_is_an_error() {
        let fetcher = FakeFetcher::default();
        let url = Url::parse("http://o/x/master.m3u8").unwrap();
        let err = resolve_and_rewrite(&fetcher, &url, MASTER, &ProxyPaths::for_stream("abc"))
            .await
            .unwrap_err();
        assert_eq!(err, "404 http://o/x/v1.m3u8");
    }
}
