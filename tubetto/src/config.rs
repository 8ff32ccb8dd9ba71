//! Process configuration.
//!
//! Every setting comes from an environment variable and has a default; a
//! value that fails to parse is logged and replaced by the default.

use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::api::server::ApiServerConfig;
use crate::cache::DEFAULT_MAX_ENTRIES;
use crate::proxy::DEFAULT_UPSTREAM_TIMEOUT;
use crate::resolver::{CacheTtls, DEFAULT_CHANNEL_LISTING_LIMIT};

pub const DEFAULT_DATABASE_URL: &str = "sqlite:tubetto.db?mode=rwc";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
pub const DEFAULT_EXTRACTOR_TIMEOUT: Duration = Duration::from_secs(120);

/// Runtime configuration of the service.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ApiServerConfig,
    pub database_url: String,
    pub log_dir: String,
    pub ytdlp_path: String,
    pub ytdlp_extra_args: Vec<String>,
    pub extractor_timeout: Duration,
    pub upstream_timeout: Duration,
    /// `0` = unbounded.
    pub cache_max_entries: usize,
    pub cache_ttls: CacheTtls,
    pub channel_scan_limit: usize,
    /// `None` disables the periodic sync.
    pub sync_interval: Option<Duration>,
    pub allow_private_upstreams: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ApiServerConfig::default(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            log_dir: DEFAULT_LOG_DIR.to_string(),
            ytdlp_path: DEFAULT_YTDLP_PATH.to_string(),
            ytdlp_extra_args: Vec::new(),
            extractor_timeout: DEFAULT_EXTRACTOR_TIMEOUT,
            upstream_timeout: DEFAULT_UPSTREAM_TIMEOUT,
            cache_max_entries: DEFAULT_MAX_ENTRIES,
            cache_ttls: CacheTtls::default(),
            channel_scan_limit: DEFAULT_CHANNEL_LISTING_LIMIT,
            sync_interval: None,
            allow_private_upstreams: false,
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env = Env { lookup };
        let defaults = Self::default();
        let ttls = defaults.cache_ttls;

        let mut server = defaults.server;
        if let Some(bind_address) = env.text("API_BIND_ADDRESS") {
            server.bind_address = bind_address;
        }
        server.port = env.parsed("API_PORT", server.port);

        let sync_secs = env.parsed("SYNC_INTERVAL_SECS", 0u64);

        Self {
            server,
            database_url: env.text("DATABASE_URL").unwrap_or(defaults.database_url),
            log_dir: env.text("LOG_DIR").unwrap_or(defaults.log_dir),
            ytdlp_path: env.text("YTDLP_PATH").unwrap_or(defaults.ytdlp_path),
            ytdlp_extra_args: env
                .text("YTDLP_EXTRA_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or_default(),
            extractor_timeout: env.timeout("EXTRACTOR_TIMEOUT_SECS", defaults.extractor_timeout),
            upstream_timeout: env.timeout("UPSTREAM_TIMEOUT_SECS", defaults.upstream_timeout),
            cache_max_entries: env.parsed("CACHE_MAX_ENTRIES", defaults.cache_max_entries),
            cache_ttls: CacheTtls {
                info: env.secs("CACHE_TTL_INFO_SECS", ttls.info),
                comments: env.secs("CACHE_TTL_COMMENTS_SECS", ttls.comments),
                related: env.secs("CACHE_TTL_RELATED_SECS", ttls.related),
                channel: env.secs("CACHE_TTL_CHANNEL_SECS", ttls.channel),
            },
            channel_scan_limit: env
                .parsed("CHANNEL_SCAN_LIMIT", defaults.channel_scan_limit)
                .max(1),
            sync_interval: (sync_secs > 0).then(|| Duration::from_secs(sync_secs)),
            allow_private_upstreams: env.flag("ALLOW_PRIVATE_UPSTREAMS", false),
        }
    }
}

struct Env<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Env<F> {
    fn text(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn parsed<T: FromStr + Copy>(&self, key: &str, default: T) -> T {
        let Some(raw) = self.text(key) else {
            return default;
        };
        match raw.parse() {
            Ok(value) => value,
            Err(_) => {
                warn!(key, value = %raw, "Invalid value, using default");
                default
            }
        }
    }

    fn secs(&self, key: &str, default: Duration) -> Duration {
        Duration::from_secs(self.parsed(key, default.as_secs()))
    }

    /// Like [`secs`](Self::secs), but zero is rejected: a timeout is always bounded.
    fn timeout(&self, key: &str, default: Duration) -> Duration {
        let value = self.secs(key, default);
        if value.is_zero() {
            warn!(key, "Timeout must be positive, using default");
            default
        } else {
            value
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        let Some(raw) = self.text(key) else {
            return default;
        };
        match raw.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => {
                warn!(key, value = %raw, "Invalid boolean, using default");
                default
            }
        }
    }
}
