//! Batch metadata synchronization.
//!
//! Each job walks one catalog collection, re-resolves every item through
//! the resolver and writes records back only when a field changed. A
//! failure on one item is recorded in the [`SyncResult`] and the loop moves
//! on. Jobs never overlap: a job started while another runs waits for it.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::{CatalogRepository, VideoRecord};
use crate::resolver::{ChannelEntry, StreamResolver, VideoMetadata};

/// One failed item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncError {
    pub item_id: String,
    pub message: String,
}

/// Outcome of one batch job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Items handled without error.
    pub processed: usize,
    /// Existing records written back.
    pub updated: usize,
    /// Records created.
    pub created: usize,
    /// Failures, in iteration order.
    pub errors: Vec<SyncError>,
}

impl SyncResult {
    pub fn record_error(&mut self, item_id: impl Into<String>, error: impl std::fmt::Display) {
        let item_id = item_id.into();
        let message = error.to_string();
        warn!(item_id = %item_id, error = %message, "Sync item failed");
        self.errors.push(SyncError { item_id, message });
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Results of the umbrella job, one per stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    pub channels: SyncResult,
    pub scan: SyncResult,
    pub videos: SyncResult,
    pub music: SyncResult,
}

impl SyncReport {
    pub fn error_count(&self) -> usize {
        [&self.channels, &self.scan, &self.videos, &self.music]
            .iter()
            .map(|r| r.errors.len())
            .sum()
    }
}

enum ItemOutcome {
    Unchanged,
    Updated,
}

/// Runs the catalog synchronization jobs.
pub struct MetadataSync {
    resolver: Arc<StreamResolver>,
    catalog: Arc<dyn CatalogRepository>,
    run_lock: Mutex<()>,
}

impl MetadataSync {
    pub fn new(resolver: Arc<StreamResolver>, catalog: Arc<dyn CatalogRepository>) -> Self {
        Self {
            resolver,
            catalog,
            run_lock: Mutex::new(()),
        }
    }

    /// Refresh channel titles, descriptions, thumbnails and counts.
    pub async fn sync_channels_metadata(&self) -> Result<SyncResult> {
        let _guard = self.run_lock.lock().await;
        self.channels_job().await
    }

    /// List every channel and make sure each listed video is in the catalog
    /// with fresh metadata.
    pub async fn scan_channel_videos(&self) -> Result<SyncResult> {
        let _guard = self.run_lock.lock().await;
        self.scan_job().await
    }

    /// Refresh metadata of every catalog video.
    pub async fn sync_videos_metadata(&self) -> Result<SyncResult> {
        let _guard = self.run_lock.lock().await;
        self.videos_job().await
    }

    /// Refresh title, artist, album and duration of every track.
    pub async fn sync_music_tracks_metadata(&self) -> Result<SyncResult> {
        let _guard = self.run_lock.lock().await;
        self.music_job().await
    }

    /// Channels, then scan, then videos, then music.
    ///
    /// A stage that cannot even list its collection is recorded as a single
    /// error in its result and the next stage still runs.
    pub async fn run_all(&self) -> SyncReport {
        let _guard = self.run_lock.lock().await;
        let started = Instant::now();

        let report = SyncReport {
            channels: stage("channels", self.channels_job().await),
            scan: stage("scan", self.scan_job().await),
            videos: stage("videos", self.videos_job().await),
            music: stage("music", self.music_job().await),
        };

        info!(
            errors = report.error_count(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Metadata sync finished"
        );
        report
    }

    /// Run [`run_all`](Self::run_all) every `interval` until cancelled.
    pub fn spawn_periodic(
        self: Arc<Self>,
        interval: Duration,
        cancel_token: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Periodic sync shutting down");
                        break;
                    }
                    _ = ticker.tick() => {
                        tokio::select! {
                            _ = cancel_token.cancelled() => break,
                            _ = self.run_all() => {}
                        }
                    }
                }
            }
        })
    }

    async fn channels_job(&self) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        for mut channel in self.catalog.list_channels().await? {
            let outcome = async {
                let meta = self.resolver.channel_metadata(&channel.id).await?;
                if channel.apply_metadata(&meta) {
                    self.catalog.update_channel(&channel).await?;
                    return Ok(ItemOutcome::Updated);
                }
                Ok::<_, crate::Error>(ItemOutcome::Unchanged)
            }
            .await;
            tally(&mut result, &channel.id, outcome);
        }
        Ok(result)
    }

    async fn scan_job(&self) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        for channel in self.catalog.list_channels().await? {
            self.resolver.invalidate_channel_entries(&channel.id, None);
            let entries = match self.resolver.list_channel_entries(&channel.id, None).await {
                Ok(entries) if entries.is_empty() => {
                    result.record_error(&channel.id, "channel listing returned no videos");
                    continue;
                }
                Ok(entries) => entries,
                Err(e) => {
                    result.record_error(&channel.id, e);
                    continue;
                }
            };
            debug!(channel_id = %channel.id, count = entries.len(), "Scanning channel");

            for entry in entries.iter() {
                match self.scan_entry(&channel.id, entry, &mut result.created).await {
                    Ok(outcome) => {
                        if matches!(outcome, ItemOutcome::Updated) {
                            result.updated += 1;
                        }
                        result.processed += 1;
                    }
                    Err(e) => result.record_error(&entry.item_id, e),
                }
            }
        }
        Ok(result)
    }

    async fn scan_entry(
        &self,
        channel_id: &str,
        entry: &ChannelEntry,
        created_count: &mut usize,
    ) -> Result<ItemOutcome> {
        self.catalog
            .link_channel_video(channel_id, &entry.item_id, &entry.title)
            .await?;

        let (mut video, created) = match self.catalog.get_video(&entry.item_id).await? {
            Some(video) => (video, false),
            None => {
                let mut video = VideoRecord::new(&entry.item_id);
                video.title = if entry.title.is_empty() {
                    entry.item_id.clone()
                } else {
                    entry.title.clone()
                };
                video.channel_id = Some(channel_id.to_string());
                self.catalog.create_video(&video).await?;
                *created_count += 1;
                (video, true)
            }
        };

        self.resolver.invalidate_info(&entry.item_id);
        let info = self.resolver.resolve_info(&entry.item_id).await?;
        let mut changed = video.apply_metadata(&VideoMetadata::from_info(&info));
        changed |= video.adopt_channel(channel_id);
        changed |= video.set_title(&entry.title);

        if changed {
            self.catalog.update_video(&video).await?;
        }
        Ok(if changed && !created {
            ItemOutcome::Updated
        } else {
            ItemOutcome::Unchanged
        })
    }

    async fn videos_job(&self) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        for mut video in self.catalog.list_videos().await? {
            let outcome = async {
                self.resolver.invalidate_info(&video.id);
                let info = self.resolver.resolve_info(&video.id).await?;
                if video.apply_metadata(&VideoMetadata::from_info(&info)) {
                    self.catalog.update_video(&video).await?;
                    return Ok(ItemOutcome::Updated);
                }
                Ok::<_, crate::Error>(ItemOutcome::Unchanged)
            }
            .await;
            tally(&mut result, &video.id, outcome);
        }
        Ok(result)
    }

    async fn music_job(&self) -> Result<SyncResult> {
        let mut result = SyncResult::default();
        for mut track in self.catalog.list_tracks().await? {
            let outcome = async {
                self.resolver.invalidate_info(&track.id);
                let info = self.resolver.resolve_info(&track.id).await?;
                if track.apply_info(&info) {
                    self.catalog.update_track(&track).await?;
                    return Ok(ItemOutcome::Updated);
                }
                Ok::<_, crate::Error>(ItemOutcome::Unchanged)
            }
            .await;
            tally(&mut result, &track.id, outcome);
        }
        Ok(result)
    }
}

fn tally(result: &mut SyncResult, item_id: &str, outcome: Result<ItemOutcome>) {
    match outcome {
        Ok(ItemOutcome::Updated) => {
            result.updated += 1;
            result.processed += 1;
        }
        Ok(ItemOutcome::Unchanged) => result.processed += 1,
        Err(e) => result.record_error(item_id, e),
    }
}

fn stage(name: &str, outcome: Result<SyncResult>) -> SyncResult {
    outcome.unwrap_or_else(|e| {
        let mut result = SyncResult::default();
        result.record_error(name, e);
        result
    })
}
