//! Streaming proxy.
//!
//! Relays an upstream byte source to the client: the `Range` header is
//! forwarded verbatim, the upstream status is passed through untouched and
//! only a fixed whitelist of response headers is copied. Bodies are streamed
//! in chunks of at most [`MAX_CHUNK_SIZE`] bytes; dropping the response
//! drops the upstream connection.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, HeaderValue, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::{TryStreamExt, stream};
use hls_rewrite::PlaylistFetcher;
use tracing::debug;
use url::{Host, Url};

use crate::utils::http_client::build_upstream_client;
use crate::{Error, Result};

/// Largest body chunk handed to the client.
pub const MAX_CHUNK_SIZE: usize = 64 * 1024;

/// Default upstream connect/read timeout.
pub const DEFAULT_UPSTREAM_TIMEOUT: Duration = Duration::from_secs(8);

/// Response headers copied from upstream, besides `Content-Type`.
const RELAYED_HEADERS: [header::HeaderName; 4] = [
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::ACCEPT_RANGES,
    header::CACHE_CONTROL,
];

/// What is being proxied; decides the fallback `Content-Type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Segment,
    Key,
    File,
    Audio,
}

impl MediaKind {
    pub fn default_content_type(&self) -> &'static str {
        match self {
            MediaKind::Segment => "video/MP2T",
            MediaKind::Key => "application/octet-stream",
            MediaKind::File => "video/mp4",
            MediaKind::Audio => "audio/mpeg",
        }
    }
}

/// Upstream HTTP client shared by every proxy endpoint.
#[derive(Clone)]
pub struct StreamProxy {
    client: reqwest::Client,
    allow_private_upstreams: bool,
}

impl StreamProxy {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            allow_private_upstreams: false,
        }
    }

    /// Proxy with its own client bounded by `timeout`.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::new(build_upstream_client(timeout))
    }

    /// Permit loopback and private upstream hosts.
    pub fn allow_private_upstreams(mut self, allow: bool) -> Self {
        self.allow_private_upstreams = allow;
        self
    }

    /// Parses a client-supplied upstream URL and applies the host guardrails.
    pub fn validate_upstream(&self, raw: &str) -> Result<Url> {
        let url = Url::parse(raw)
            .map_err(|e| Error::InvalidUpstreamUrl(format!("invalid url: {e}")))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(Error::InvalidUpstreamUrl(format!(
                    "scheme '{other}' is not allowed"
                )));
            }
        }

        let Some(host) = url.host() else {
            return Err(Error::InvalidUpstreamUrl("url has no host".to_string()));
        };

        if !self.allow_private_upstreams {
            let ip = match host {
                Host::Domain(domain) => {
                    if domain.eq_ignore_ascii_case("localhost") {
                        return Err(Error::InvalidUpstreamUrl(
                            "localhost is not allowed".to_string(),
                        ));
                    }
                    None
                }
                Host::Ipv4(v4) => Some(IpAddr::V4(v4)),
                Host::Ipv6(v6) => Some(IpAddr::V6(v6)),
            };
            if let Some(ip) = ip
                && let Some(class) = non_public_class(ip)
            {
                return Err(Error::InvalidUpstreamUrl(format!(
                    "{class} address {ip} is not allowed"
                )));
            }
        }

        Ok(url)
    }

    /// Streams `url` to the client.
    pub async fn proxy(
        &self,
        url: &Url,
        range: Option<&HeaderValue>,
        kind: MediaKind,
    ) -> Result<Response> {
        let mut request = self.client.get(url.clone());
        if let Some(range) = range {
            request = request.header(header::RANGE, range.clone());
        }

        let upstream = request
            .send()
            .await
            .map_err(|e| Error::upstream(url.as_str(), &e))?;
        let status = upstream.status();
        debug!(%url, status = status.as_u16(), ?kind, "Proxying upstream response");

        let mut headers = HeaderMap::new();
        let content_type = upstream
            .headers()
            .get(header::CONTENT_TYPE)
            .cloned()
            .unwrap_or_else(|| HeaderValue::from_static(kind.default_content_type()));
        headers.insert(header::CONTENT_TYPE, content_type);
        for name in RELAYED_HEADERS {
            if let Some(value) = upstream.headers().get(&name) {
                headers.insert(name, value.clone());
            }
        }

        let body = upstream
            .bytes_stream()
            .map_ok(|chunk| {
                stream::iter(split_chunks(chunk).into_iter().map(Ok::<_, reqwest::Error>))
            })
            .try_flatten()
            .map_err(std::io::Error::other);

        let mut response = (status, Body::from_stream(body)).into_response();
        *response.headers_mut() = headers;
        Ok(response)
    }

    /// Fetches a text document such as a playlist. Non-success statuses are
    /// upstream errors.
    pub async fn fetch_text(&self, url: &Url) -> Result<String> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::upstream(url.as_str(), &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::UpstreamError {
                url: url.to_string(),
                message: format!("upstream answered {status}"),
            });
        }

        response
            .text()
            .await
            .map_err(|e| Error::upstream(url.as_str(), &e))
    }
}

#[async_trait]
impl PlaylistFetcher for StreamProxy {
    type Error = Error;

    async fn fetch_playlist(&self, url: &Url) -> Result<String> {
        self.fetch_text(url).await
    }
}

/// Names the reserved range `ip` falls in, if it is not publicly routable.
/// IPv4-mapped IPv6 addresses are judged as their IPv4 form.
fn non_public_class(ip: IpAddr) -> Option<&'static str> {
    match ip {
        IpAddr::V4(v4) => non_public_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return non_public_v4(v4);
            }
            if v6.is_loopback() {
                Some("loopback")
            } else if v6.is_unspecified() {
                Some("unspecified")
            } else if v6.is_unicast_link_local() {
                Some("link-local")
            } else if v6.is_unique_local() {
                Some("unique-local")
            } else {
                None
            }
        }
    }
}

fn non_public_v4(v4: Ipv4Addr) -> Option<&'static str> {
    if v4.is_loopback() {
        Some("loopback")
    } else if v4.is_unspecified() {
        Some("unspecified")
    } else if v4.is_link_local() {
        Some("link-local")
    } else if v4.is_private() {
        Some("private")
    } else {
        None
    }
}

/// Splits `chunk` into zero-copy pieces of at most [`MAX_CHUNK_SIZE`] bytes.
pub fn split_chunks(mut chunk: Bytes) -> Vec<Bytes> {
    let mut pieces = Vec::with_capacity(chunk.len().div_ceil(MAX_CHUNK_SIZE).max(1));
    while chunk.len() > MAX_CHUNK_SIZE {
        pieces.push(chunk.split_to(MAX_CHUNK_SIZE));
    }
    if !chunk.is_empty() {
        pieces.push(chunk);
    }
    pieces
}
