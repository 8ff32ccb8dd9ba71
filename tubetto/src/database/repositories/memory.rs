//! In-process catalog for tests and embedding callers.

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::database::models::{ChannelRecord, TrackRecord, VideoRecord};
use crate::{Error, Result};

use super::catalog::CatalogRepository;

#[derive(Default)]
struct Collections {
    channels: BTreeMap<String, ChannelRecord>,
    videos: BTreeMap<String, VideoRecord>,
    channel_videos: BTreeMap<(String, String), String>,
    tracks: BTreeMap<String, TrackRecord>,
}

/// Catalog held in memory. Collections iterate in id order.
#[derive(Default)]
pub struct InMemoryCatalog {
    inner: RwLock<Collections>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_channel(&self, channel: ChannelRecord) {
        self.inner
            .write()
            .channels
            .insert(channel.id.clone(), channel);
    }

    pub fn insert_video(&self, video: VideoRecord) {
        self.inner.write().videos.insert(video.id.clone(), video);
    }

    pub fn insert_track(&self, track: TrackRecord) {
        self.inner.write().tracks.insert(track.id.clone(), track);
    }

    pub fn channel(&self, id: &str) -> Option<ChannelRecord> {
        self.inner.read().channels.get(id).cloned()
    }

    pub fn track(&self, id: &str) -> Option<TrackRecord> {
        self.inner.read().tracks.get(id).cloned()
    }

    /// `(video_id, title)` pairs linked to `channel_id`.
    pub fn channel_videos(&self, channel_id: &str) -> Vec<(String, String)> {
        self.inner
            .read()
            .channel_videos
            .iter()
            .filter(|((channel, _), _)| channel == channel_id)
            .map(|((_, video), title)| (video.clone(), title.clone()))
            .collect()
    }
}

fn insert_new<T>(map: &mut BTreeMap<String, T>, entity: &str, id: &str, value: T) -> Result<()> {
    if map.contains_key(id) {
        return Err(Error::validation(format!("{entity} {id} already exists")));
    }
    map.insert(id.to_string(), value);
    Ok(())
}

fn replace<T>(map: &mut BTreeMap<String, T>, entity: &str, id: &str, value: T) -> Result<()> {
    match map.get_mut(id) {
        Some(slot) => {
            *slot = value;
            Ok(())
        }
        None => Err(Error::not_found(entity, id)),
    }
}

#[async_trait]
impl CatalogRepository for InMemoryCatalog {
    async fn list_channels(&self) -> Result<Vec<ChannelRecord>> {
        Ok(self.inner.read().channels.values().cloned().collect())
    }

    async fn create_channel(&self, channel: &ChannelRecord) -> Result<()> {
        insert_new(
            &mut self.inner.write().channels,
            "Channel",
            &channel.id,
            channel.clone(),
        )
    }

    async fn update_channel(&self, channel: &ChannelRecord) -> Result<()> {
        replace(
            &mut self.inner.write().channels,
            "Channel",
            &channel.id,
            channel.clone(),
        )
    }

    async fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        Ok(self.inner.read().videos.values().cloned().collect())
    }

    async fn get_video(&self, id: &str) -> Result<Option<VideoRecord>> {
        Ok(self.inner.read().videos.get(id).cloned())
    }

    async fn create_video(&self, video: &VideoRecord) -> Result<()> {
        insert_new(
            &mut self.inner.write().videos,
            "Video",
            &video.id,
            video.clone(),
        )
    }

    async fn update_video(&self, video: &VideoRecord) -> Result<()> {
        replace(
            &mut self.inner.write().videos,
            "Video",
            &video.id,
            video.clone(),
        )
    }

    async fn link_channel_video(
        &self,
        channel_id: &str,
        video_id: &str,
        title: &str,
    ) -> Result<()> {
        self.inner.write().channel_videos.insert(
            (channel_id.to_string(), video_id.to_string()),
            title.to_string(),
        );
        Ok(())
    }

    async fn list_tracks(&self) -> Result<Vec<TrackRecord>> {
        Ok(self.inner.read().tracks.values().cloned().collect())
    }

    async fn get_track(&self, id: &str) -> Result<Option<TrackRecord>> {
        Ok(self.inner.read().tracks.get(id).cloned())
    }

    async fn create_track(&self, track: &TrackRecord) -> Result<()> {
        insert_new(
            &mut self.inner.write().tracks,
            "Track",
            &track.id,
            track.clone(),
        )
    }

    async fn update_track(&self, track: &TrackRecord) -> Result<()> {
        replace(
            &mut self.inner.write().tracks,
            "Track",
            &track.id,
            track.clone(),
        )
    }
}
