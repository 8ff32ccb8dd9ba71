//! Catalog repository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::Result;
use crate::database::models::{ChannelRecord, TrackRecord, VideoRecord};

/// Read/write access to the catalog collections walked by the sync jobs.
#[async_trait]
pub trait CatalogRepository: Send + Sync {
    async fn list_channels(&self) -> Result<Vec<ChannelRecord>>;
    async fn create_channel(&self, channel: &ChannelRecord) -> Result<()>;
    async fn update_channel(&self, channel: &ChannelRecord) -> Result<()>;

    async fn list_videos(&self) -> Result<Vec<VideoRecord>>;
    async fn get_video(&self, id: &str) -> Result<Option<VideoRecord>>;
    async fn create_video(&self, video: &VideoRecord) -> Result<()>;
    async fn update_video(&self, video: &VideoRecord) -> Result<()>;

    /// Records that `video_id` appears in the listing of `channel_id`.
    /// Linking twice updates the stored title.
    async fn link_channel_video(&self, channel_id: &str, video_id: &str, title: &str)
    -> Result<()>;

    async fn list_tracks(&self) -> Result<Vec<TrackRecord>>;
    async fn get_track(&self, id: &str) -> Result<Option<TrackRecord>>;
    async fn create_track(&self, track: &TrackRecord) -> Result<()>;
    async fn update_track(&self, track: &TrackRecord) -> Result<()>;
}

/// SQLx implementation of CatalogRepository.
pub struct SqlxCatalogRepository {
    pool: SqlitePool,
}

impl SqlxCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogRepository for SqlxCatalogRepository {
    async fn list_channels(&self) -> Result<Vec<ChannelRecord>> {
        let channels = sqlx::query_as::<_, ChannelRecord>("SELECT * FROM channels ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(channels)
    }

    async fn create_channel(&self, channel: &ChannelRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channels (id, title, description, thumbnail, subscriber_count, video_count)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&channel.id)
        .bind(&channel.title)
        .bind(&channel.description)
        .bind(&channel.thumbnail)
        .bind(channel.subscriber_count)
        .bind(channel.video_count)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_channel(&self, channel: &ChannelRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE channels SET
                title = ?,
                description = ?,
                thumbnail = ?,
                subscriber_count = ?,
                video_count = ?
            WHERE id = ?
            "#,
        )
        .bind(&channel.title)
        .bind(&channel.description)
        .bind(&channel.thumbnail)
        .bind(channel.subscriber_count)
        .bind(channel.video_count)
        .bind(&channel.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_videos(&self) -> Result<Vec<VideoRecord>> {
        let videos = sqlx::query_as::<_, VideoRecord>("SELECT * FROM videos ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(videos)
    }

    async fn get_video(&self, id: &str) -> Result<Option<VideoRecord>> {
        let video = sqlx::query_as::<_, VideoRecord>("SELECT * FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(video)
    }

    async fn create_video(&self, video: &VideoRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO videos (
                id, title, description, duration, upload_date, thumbnail,
                channel_id, channel_title, channel_external_id, uploader, uploader_id
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&video.id)
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.duration)
        .bind(video.upload_date)
        .bind(&video.thumbnail)
        .bind(&video.channel_id)
        .bind(&video.channel_title)
        .bind(&video.channel_external_id)
        .bind(&video.uploader)
        .bind(&video.uploader_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_video(&self, video: &VideoRecord) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE videos SET
                title = ?,
                description = ?,
                duration = ?,
                upload_date = ?,
                thumbnail = ?,
                channel_id = ?,
                channel_title = ?,
                channel_external_id = ?,
                uploader = ?,
                uploader_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&video.title)
        .bind(&video.description)
        .bind(video.duration)
        .bind(video.upload_date)
        .bind(&video.thumbnail)
        .bind(&video.channel_id)
        .bind(&video.channel_title)
        .bind(&video.channel_external_id)
        .bind(&video.uploader)
        .bind(&video.uploader_id)
        .bind(&video.id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn link_channel_video(
        &self,
        channel_id: &str,
        video_id: &str,
        title: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO channel_videos (channel_id, video_id, title)
            VALUES (?, ?, ?)
            ON CONFLICT(channel_id, video_id) DO UPDATE SET title = excluded.title
            "#,
        )
        .bind(channel_id)
        .bind(video_id)
        .bind(title)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_tracks(&self) -> Result<Vec<TrackRecord>> {
        let tracks = sqlx::query_as::<_, TrackRecord>("SELECT * FROM tracks ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(tracks)
    }

    async fn get_track(&self, id: &str) -> Result<Option<TrackRecord>> {
        let track = sqlx::query_as::<_, TrackRecord>("SELECT * FROM tracks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(track)
    }

    async fn create_track(&self, track: &TrackRecord) -> Result<()> {
        sqlx::query("INSERT INTO tracks (id, title, artist, album, duration) VALUES (?, ?, ?, ?, ?)")
            .bind(&track.id)
            .bind(&track.title)
            .bind(&track.artist)
            .bind(&track.album)
            .bind(track.duration)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_track(&self, track: &TrackRecord) -> Result<()> {
        sqlx::query("UPDATE tracks SET title = ?, artist = ?, album = ?, duration = ? WHERE id = ?")
            .bind(&track.title)
            .bind(&track.artist)
            .bind(&track.album)
            .bind(track.duration)
            .bind(&track.id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{init_pool, run_migrations};
    use chrono::NaiveDate;

    async fn repository() -> (tempfile::TempDir, SqlxCatalogRepository) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite:{}", dir.path().join("catalog.db").display());
        let pool = init_pool(&url).await.unwrap();
        run_migrations(&pool).await.unwrap();
        (dir, SqlxCatalogRepository::new(pool))
    }

    #[tokio::test]
    async fn video_round_trips_through_sqlite() {
        let (_dir, repo) = repository().await;
        repo.create_channel(&ChannelRecord::new("c1")).await.unwrap();

        let mut video = VideoRecord::new("abc");
        video.channel_id = Some("c1".to_string());
        repo.create_video(&video).await.unwrap();

        video.title = "Talk".to_string();
        video.upload_date = NaiveDate::from_ymd_opt(2024, 2, 29);
        video.duration = Some(3600);
        repo.update_video(&video).await.unwrap();

        let stored = repo.get_video("abc").await.unwrap().unwrap();
        assert_eq!(stored, video);
        assert!(repo.get_video("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn link_channel_video_is_an_upsert() {
        let (_dir, repo) = repository().await;
        repo.create_channel(&ChannelRecord::new("c1")).await.unwrap();
        repo.link_channel_video("c1", "v1", "First").await.unwrap();
        repo.link_channel_video("c1", "v1", "Renamed").await.unwrap();

        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT video_id, title FROM channel_videos")
                .fetch_all(&repo.pool)
                .await
                .unwrap();
        assert_eq!(rows, vec![("v1".to_string(), "Renamed".to_string())]);
    }

    #[tokio::test]
    async fn tracks_and_channels_update() {
        let (_dir, repo) = repository().await;
        repo.create_track(&TrackRecord::new("t1")).await.unwrap();
        let mut track = repo.get_track("t1").await.unwrap().unwrap();
        track.artist = "Band".to_string();
        repo.update_track(&track).await.unwrap();
        assert_eq!(repo.list_tracks().await.unwrap(), vec![track]);

        let mut channel = ChannelRecord::new("c1");
        repo.create_channel(&channel).await.unwrap();
        channel.subscriber_count = Some(10);
        repo.update_channel(&channel).await.unwrap();
        assert_eq!(repo.list_channels().await.unwrap(), vec![channel]);
    }
}
