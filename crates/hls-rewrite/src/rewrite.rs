//! Media playlist rewriting.

use tracing::{debug, warn};
use url::Url;

use crate::line::{LineOutcome, MalformedManifestLine, ManifestLine, split_key_uri};

/// Query parameter carrying the upstream URL on proxy paths.
pub const UPSTREAM_PARAM: &str = "u";

/// Same-origin proxy paths that rewritten references point at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyPaths {
    segment: String,
    key: String,
}

impl ProxyPaths {
    pub fn new(segment: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            key: key.into(),
        }
    }

    /// `/stream/{item_id}/seg` and `/stream/{item_id}/key`.
    pub fn for_stream(item_id: &str) -> Self {
        Self::new(
            format!("/stream/{item_id}/seg"),
            format!("/stream/{item_id}/key"),
        )
    }

    pub fn segment_url(&self, upstream: &Url) -> String {
        with_upstream(&self.segment, upstream)
    }

    pub fn key_url(&self, upstream: &Url) -> String {
        with_upstream(&self.key, upstream)
    }
}

fn with_upstream(path: &str, upstream: &Url) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .append_pair(UPSTREAM_PARAM, upstream.as_str())
        .finish();
    format!("{path}?{query}")
}

/// A rewritten playlist together with per-line accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewrittenPlaylist {
    pub text: String,
    /// Number of segment and key references redirected through the proxy.
    pub rewritten: usize,
    /// Rewrite candidates emitted unchanged, with their zero-based line index.
    pub malformed: Vec<(usize, MalformedManifestLine)>,
}

/// Rewrites lines of a single media playlist against a base URL.
#[derive(Debug, Clone, Copy)]
pub struct PlaylistRewriter<'a> {
    base: &'a Url,
    paths: &'a ProxyPaths,
}

impl<'a> PlaylistRewriter<'a> {
    pub fn new(base: &'a Url, paths: &'a ProxyPaths) -> Self {
        Self { base, paths }
    }

    pub fn rewrite_line(&self, line: &str) -> LineOutcome {
        match ManifestLine::classify(line) {
            ManifestLine::Blank | ManifestLine::Directive(_) => LineOutcome::unchanged(line),
            ManifestLine::Key(directive) => self.rewrite_key(line, directive),
            ManifestLine::Uri(uri) => match self.resolve(uri) {
                Ok(upstream) => LineOutcome::Rewritten(self.paths.segment_url(&upstream)),
                Err(reason) => LineOutcome::malformed(line, reason),
            },
        }
    }

    fn rewrite_key(&self, line: &str, directive: &str) -> LineOutcome {
        let key = match split_key_uri(directive) {
            Ok(key) => key,
            Err(reason) => return LineOutcome::malformed(line, reason),
        };
        match self.resolve(key.value) {
            Ok(upstream) => LineOutcome::Rewritten(key.replace_value(&self.paths.key_url(&upstream))),
            Err(reason) => LineOutcome::malformed(line, reason),
        }
    }

    fn resolve(&self, uri: &str) -> Result<Url, MalformedManifestLine> {
        self.base
            .join(uri)
            .map_err(|e| MalformedManifestLine::Unresolvable {
                uri: uri.to_string(),
                reason: e.to_string(),
            })
    }
}

/// Rewrites every segment and key reference of `text` into a proxy URL.
///
/// References are resolved against `base` (normally the playlist URL
/// itself). Lines that cannot be rewritten are kept verbatim and logged;
/// the rewrite never fails as a whole. Output lines are joined with `\n`.
pub fn rewrite_media_playlist(text: &str, base: &Url, paths: &ProxyPaths) -> RewrittenPlaylist {
    let rewriter = PlaylistRewriter::new(base, paths);
    let mut out = RewrittenPlaylist::default();
    let mut lines = Vec::new();

    for (index, line) in text.lines().enumerate() {
        let outcome = rewriter.rewrite_line(line);
        if outcome.is_rewritten() {
            out.rewritten += 1;
        }
        if let Some(reason) = outcome.malformed_reason() {
            warn!(line = index + 1, %reason, "Passing malformed playlist line through");
            out.malformed.push((index, reason.clone()));
        }
        lines.push(outcome.into_line());
    }

    debug!(
        base = %base,
        rewritten = out.rewritten,
        malformed = out.malformed.len(),
        "Rewrote media playlist"
    );
    out.text = lines.join("\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn upstream_of(proxied: &str) -> String {
        let (_, query) = proxied.split_once('?').unwrap();
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(k, _)| k == UPSTREAM_PARAM)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    fn base() -> Url {
        Url::parse("http://o/x/index.m3u8").unwrap()
    }

    #[test]
    fn rewrites_segments_in_order() {
        let paths = ProxyPaths::for_stream("abc");
        let out = rewrite_media_playlist("seg1.ts\nseg2.ts", &base(), &paths);
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("/stream/abc/seg?u="));
        assert_eq!(upstream_of(lines[0]), "http://o/x/seg1.ts");
        assert_eq!(upstream_of(lines[1]), "http://o/x/seg2.ts");
        assert_eq!(out.rewritten, 2);
    }

    #[test]
    fn rewriting_twice_yields_same_urls() {
        let paths = ProxyPaths::for_stream("abc");
        let text = "#EXTM3U\n#EXTINF:4.0,\nseg1.ts\n#EXTINF:4.0,\nseg2.ts\n";
        assert_eq!(
            rewrite_media_playlist(text, &base(), &paths),
            rewrite_media_playlist(text, &base(), &paths)
        );
    }

    #[test]
    fn resolves_absolute_and_rooted_references() {
        let paths = ProxyPaths::for_stream("abc");
        let out = rewrite_media_playlist(
            "https://cdn/a.ts?sig=1&x=2\n/root/b.ts\n../c.ts",
            &base(),
            &paths,
        );
        let urls: Vec<String> = out.text.lines().map(upstream_of).collect();
        assert_eq!(
            urls,
            vec!["https://cdn/a.ts?sig=1&x=2", "http://o/root/b.ts", "http://o/c.ts"]
        );
    }

    #[test]
    fn directives_and_blank_lines_pass_through() {
        let paths = ProxyPaths::for_stream("abc");
        let text = "#EXTM3U\n\n#EXT-X-TARGETDURATION:4\n#EXT-X-KEY:METHOD=NONE";
        let out = rewrite_media_playlist(text, &base(), &paths);
        assert_eq!(out.text, text);
        assert_eq!(out.rewritten, 0);
        assert!(out.malformed.is_empty());
    }

    #[test]
    fn rewrites_quoted_key_uri() {
        let paths = ProxyPaths::for_stream("abc");
        let base = base();
        let rewriter = PlaylistRewriter::new(&base, &paths);
        let outcome = rewriter.rewrite_line("#EXT-X-KEY:METHOD=AES-128,URI=\"keys/k1\",IV=0x1");
        assert!(outcome.is_rewritten(), "expected rewrite, got {outcome:?}");
        let line = outcome.into_line();
        assert!(line.starts_with("#EXT-X-KEY:METHOD=AES-128,URI=\"/stream/abc/key?u="));
        assert!(line.ends_with("\",IV=0x1"));
        let proxied = line.split('"').nth(1).unwrap();
        assert_eq!(upstream_of(proxied), "http://o/x/keys/k1");
    }

    #[test]
    fn rewrites_unquoted_key_uri() {
        let paths = ProxyPaths::for_stream("abc");
        let base = base();
        let rewriter = PlaylistRewriter::new(&base, &paths);
        let outcome = rewriter.rewrite_line("#EXT-X-KEY:METHOD=AES-128,URI=https://keys/k?a=1");
        assert!(outcome.is_rewritten());
        let line = outcome.into_line();
        let proxied = line.split_once("URI=").unwrap().1;
        assert_eq!(upstream_of(proxied), "https://keys/k?a=1");
    }

    #[test]
    fn malformed_key_passes_through() {
        let paths = ProxyPaths::for_stream("abc");
        let text = "#EXT-X-KEY:METHOD=AES-128,URI=\"broken\nseg1.ts";
        let out = rewrite_media_playlist(text, &base(), &paths);
        let lines: Vec<&str> = out.text.lines().collect();
        assert_eq!(lines[0], "#EXT-X-KEY:METHOD=AES-128,URI=\"broken");
        assert_eq!(upstream_of(lines[1]), "http://o/x/seg1.ts");
        assert_eq!(out.malformed, vec![(0, MalformedManifestLine::UnterminatedQuote)]);
    }

    #[test]
    fn rewritten_playlist_still_parses() {
        let paths = ProxyPaths::for_stream("abc");
        let text = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:4\n#EXT-X-MEDIA-SEQUENCE:0\n\
                    #EXT-X-KEY:METHOD=AES-128,URI=\"key.bin\"\n#EXTINF:4.0,\nseg1.ts\n\
                    #EXTINF:4.0,\nseg2.ts\n#EXT-X-ENDLIST\n";
        let out = rewrite_media_playlist(text, &base(), &paths);
        match m3u8_rs::parse_playlist_res(out.text.as_bytes()) {
            Ok(m3u8_rs::Playlist::MediaPlaylist(pl)) => {
                assert_eq!(pl.segments.len(), 2);
                assert!(pl.segments[0].uri.starts_with("/stream/abc/seg?u="));
                let key = pl.segments[0].key.as_ref().unwrap();
                assert!(key.uri.as_deref().unwrap().starts_with("/stream/abc/key?u="));
            }
            other => panic!("expected media playlist, got {other:?}"),
        }
    }
}
