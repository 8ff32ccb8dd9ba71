use crate::extractor::error::ExtractorError;
use crate::extractor::extractor::MediaExtractor;
use crate::media::{MediaInfo, PlaylistEntry};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

static DEFAULT_YTDLP_PATH: &str = "yt-dlp";
static DEFAULT_SITE_BASE: &str = "https://www.youtube.com";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const MAX_ID_LEN: usize = 128;

#[derive(Debug, Clone)]
pub struct YtDlpConfig {
    pub binary_path: String,
    /// Extra arguments appended to every invocation (cookies, proxies, ...).
    pub extra_args: Vec<String>,
    /// Wall-clock limit for a single invocation; the child is killed after it.
    pub timeout: Duration,
    /// Origin used to build item and channel page URLs.
    pub site_base: String,
}

impl Default for YtDlpConfig {
    fn default() -> Self {
        Self {
            binary_path: DEFAULT_YTDLP_PATH.to_string(),
            extra_args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            site_base: DEFAULT_SITE_BASE.to_string(),
        }
    }
}

/// [`MediaExtractor`] backed by the `yt-dlp` command line tool in JSON mode.
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    config: YtDlpConfig,
}

impl YtDlpExtractor {
    pub fn new(config: YtDlpConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &YtDlpConfig {
        &self.config
    }

    /// Version string of the configured binary.
    pub async fn version(&self) -> Result<String, ExtractorError> {
        let out = self.run(vec!["--version".to_string()]).await?;
        Ok(String::from_utf8_lossy(&out).trim().to_string())
    }

    fn watch_url(&self, item_id: &str) -> String {
        format!("{}/watch?v={item_id}", self.base())
    }

    fn channel_url(&self, channel_id: &str) -> String {
        format!("{}/channel/{channel_id}", self.base())
    }

    fn base(&self) -> &str {
        self.config.site_base.trim_end_matches('/')
    }

    fn info_args(&self, item_id: &str) -> Vec<String> {
        let mut args = json_args();
        args.push(self.watch_url(item_id));
        args
    }

    fn comment_args(&self, item_id: &str, max_comments: usize) -> Vec<String> {
        let mut args = json_args();
        args.push("--write-comments".to_string());
        args.push("--extractor-args".to_string());
        args.push(format!(
            "youtube:comment_sort=top;max_comments={max_comments}"
        ));
        args.push(self.watch_url(item_id));
        args
    }

    fn channel_args(&self, channel_id: &str) -> Vec<String> {
        let mut args = json_args();
        args.extend(["--flat-playlist", "--playlist-end", "1"].map(String::from));
        args.push(self.channel_url(channel_id));
        args
    }

    fn listing_args(&self, channel_id: &str, limit: usize) -> Vec<String> {
        let mut args = json_args();
        args.push("--flat-playlist".to_string());
        args.push("--playlist-end".to_string());
        args.push(limit.max(1).to_string());
        args.push(format!("{}/videos", self.channel_url(channel_id)));
        args
    }

    async fn run(&self, args: Vec<String>) -> Result<Vec<u8>, ExtractorError> {
        let mut cmd = Command::new(&self.config.binary_path);
        cmd.args(&args)
            .args(&self.config.extra_args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(binary = %self.config.binary_path, ?args, "Running extractor");

        let out = tokio::time::timeout(self.config.timeout, cmd.output())
            .await
            .map_err(|_| ExtractorError::Timeout(self.config.timeout))?
            .map_err(ExtractorError::Spawn)?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let diagnostic = diagnostic_from_stderr(&stderr);
            warn!(status = ?out.status.code(), %diagnostic, "Extractor failed");
            return Err(ExtractorError::Failed {
                status: out.status.code(),
                diagnostic,
            });
        }

        Ok(out.stdout)
    }

    async fn run_json(&self, args: Vec<String>) -> Result<MediaInfo, ExtractorError> {
        let stdout = self.run(args).await?;
        Ok(serde_json::from_slice(&stdout)?)
    }
}

impl Default for YtDlpExtractor {
    fn default() -> Self {
        Self::new(YtDlpConfig::default())
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn extract(&self, item_id: &str) -> Result<MediaInfo, ExtractorError> {
        validate_id(item_id)?;
        self.run_json(self.info_args(item_id)).await
    }

    async fn extract_comments(
        &self,
        item_id: &str,
        max_comments: usize,
    ) -> Result<MediaInfo, ExtractorError> {
        validate_id(item_id)?;
        self.run_json(self.comment_args(item_id, max_comments))
            .await
    }

    async fn extract_channel(&self, channel_id: &str) -> Result<MediaInfo, ExtractorError> {
        validate_id(channel_id)?;
        self.run_json(self.channel_args(channel_id)).await
    }

    async fn list_channel_entries(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<PlaylistEntry>, ExtractorError> {
        validate_id(channel_id)?;
        let info = self.run_json(self.listing_args(channel_id, limit)).await?;
        Ok(info
            .entries
            .into_iter()
            .filter(|e| e.id.as_deref().is_some_and(|id| !id.is_empty()))
            .take(limit)
            .collect())
    }
}

fn json_args() -> Vec<String> {
    ["--dump-single-json", "--skip-download", "--no-warnings"]
        .map(String::from)
        .to_vec()
}

/// Identifiers are interpolated into URLs, so only the characters the
/// origin uses for ids are accepted.
fn validate_id(id: &str) -> Result<(), ExtractorError> {
    let valid = !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(ExtractorError::InvalidId(id.to_string()))
    }
}

/// Picks the most useful line of the tool's stderr: the last `ERROR:` line,
/// else the last non-empty line.
fn diagnostic_from_stderr(stderr: &str) -> String {
    let lines = stderr.lines().map(str::trim).filter(|l| !l.is_empty());
    let mut last = None;
    let mut last_error = None;
    for line in lines {
        if let Some(rest) = line.strip_prefix("ERROR:") {
            last_error = Some(rest.trim());
        }
        last = Some(line);
    }
    last_error
        .or(last)
        .unwrap_or("no diagnostic output")
        .to_string()
}
