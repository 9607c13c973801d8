use crate::config::{Config, PlatformConfig};
use crate::error::{GatewayError, Result};
use crate::models::{UploadedFile, Video, VideoRecord};
use crate::platform::{Filter, Platform, RestPlatform, RowQuery, UploadOptions};
use crate::session::{listener, Session, Subscription};
use crate::upload::{build_file_id, storage_path, UploadFile};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

const NOT_CONFIGURED: &str =
    "Platform not configured. Please set SUPABASE_URL and SUPABASE_ANON_KEY.";
const BUCKET_NOT_CONFIGURED: &str = "Platform not configured. Please set SUPABASE_BUCKET.";

/// Gateway to the hosted backend: auth, video uploads and video metadata
///
/// Holds an explicitly constructed platform client. When the platform is not
/// configured every operation fails fast with [`GatewayError::NotConfigured`];
/// without a bucket, uploads and deletes do.
pub struct Gateway {
    platform: Option<Arc<dyn Platform>>,
    bucket: Option<String>,
    settings: PlatformConfig,
}

impl Gateway {
    /// Build a gateway from configuration, connecting a [`RestPlatform`]
    pub fn new(config: &Config) -> Result<Self> {
        let settings = config.platform.clone();

        let platform: Option<Arc<dyn Platform>> = match settings.credentials() {
            Some((url, key)) => Some(Arc::new(RestPlatform::new(url, key, &settings)?)),
            None => {
                warn!("Platform url or anon key missing; auth and data operations are disabled");
                None
            }
        };

        if settings.bucket().is_none() {
            warn!("Storage bucket missing; uploads and deletes are disabled");
        }

        Ok(Self {
            platform,
            bucket: settings.bucket().map(String::from),
            settings,
        })
    }

    /// Build a gateway around an existing platform client
    pub fn with_platform(
        platform: Arc<dyn Platform>,
        bucket: Option<String>,
        settings: PlatformConfig,
    ) -> Self {
        Self {
            platform: Some(platform),
            bucket: bucket.filter(|b| !b.trim().is_empty()),
            settings,
        }
    }

    /// True when auth and data operations are available
    pub fn is_configured(&self) -> bool {
        self.platform.is_some()
    }

    fn ensure_platform(&self) -> Result<&dyn Platform> {
        self.platform
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured(NOT_CONFIGURED.to_string()))
    }

    fn ensure_bucket(&self) -> Result<&str> {
        self.bucket
            .as_deref()
            .ok_or_else(|| GatewayError::NotConfigured(BUCKET_NOT_CONFIGURED.to_string()))
    }

    /// Current session, if signed in
    pub async fn get_current_session(&self) -> Result<Option<Session>> {
        let platform = self.ensure_platform()?;
        platform.get_session().await
    }

    /// Call `callback` with the session on every auth transition
    ///
    /// The callback fires once immediately with the current session. Drop or
    /// unsubscribe the returned handle to stop.
    pub fn on_auth_state_change<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(Option<&Session>) + Send + Sync + 'static,
    {
        let platform = self.ensure_platform()?;
        Ok(platform.on_auth_state_change(listener(move |_event, session| callback(session))))
    }

    pub async fn sign_in_with_email(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let platform = self.ensure_platform()?;
        let session = platform.sign_in_with_password(email, password).await?;
        metrics::counter!("gateway.auth.sign_ins").increment(1);
        Ok(session)
    }

    pub async fn sign_up_with_email(&self, email: &str, password: &str) -> Result<Option<Session>> {
        let platform = self.ensure_platform()?;
        let session = platform.sign_up(email, password).await?;
        metrics::counter!("gateway.auth.sign_ups").increment(1);
        Ok(session)
    }

    pub async fn sign_out(&self) -> Result<()> {
        let platform = self.ensure_platform()?;
        platform.sign_out().await
    }

    /// Upload a video to `videos/<id>.<ext>` and resolve its public URL
    ///
    /// Never overwrites an existing object.
    #[instrument(skip(self, file), fields(file_name = %file.name, size_bytes = file.data.len()))]
    pub async fn upload_video_file(&self, file: &UploadFile) -> Result<UploadedFile> {
        let platform = self.ensure_platform()?;
        let bucket = self.ensure_bucket()?;

        let file_id = build_file_id();
        let path = storage_path(&self.settings.storage_folder, &file_id, &file.name);
        let options = UploadOptions {
            cache_control_secs: self.settings.cache_control_secs,
            content_type: file.content_type().to_string(),
            upsert: false,
        };

        debug!(path = %path, content_type = %options.content_type, "Uploading video");

        platform.upload(bucket, &path, file, &options).await?;
        let public_url = platform.public_url(bucket, &path);

        metrics::counter!("gateway.videos.uploaded").increment(1);
        info!(path = %path, "Video uploaded");

        Ok(UploadedFile { public_url, path })
    }

    /// Upsert the metadata row for `video`, owned by `user_id`
    #[instrument(skip(self, video), fields(video_id = video.id))]
    pub async fn save_video_metadata(&self, video: &Video, user_id: &str) -> Result<()> {
        let platform = self.ensure_platform()?;

        let record = VideoRecord::from_video(video, user_id);
        let row = serde_json::to_value(&record).map_err(|e| GatewayError::Decode(e.to_string()))?;

        platform.upsert(&self.settings.videos_table, row).await?;

        metrics::counter!("gateway.videos.saved").increment(1);
        debug!("Video metadata saved");
        Ok(())
    }

    /// All videos of `user_id`, newest upload first
    #[instrument(skip(self))]
    pub async fn fetch_videos(&self, user_id: &str) -> Result<Vec<Video>> {
        let platform = self.ensure_platform()?;

        let query = RowQuery::new()
            .eq("user_id", user_id)
            .order("upload_date", false);
        let rows = platform.select(&self.settings.videos_table, &query).await?;

        let videos = rows
            .into_iter()
            .map(|row| {
                serde_json::from_value::<VideoRecord>(row)
                    .map(Video::from)
                    .map_err(|e| GatewayError::Decode(e.to_string()))
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(count = videos.len(), "Videos fetched");
        Ok(videos)
    }

    /// Delete a video: its stored object first, then its row
    ///
    /// A failed object removal aborts before the row is touched.
    #[instrument(skip(self, video), fields(video_id = video.id))]
    pub async fn delete_remote_video(&self, video: &Video, user_id: &str) -> Result<()> {
        let platform = self.ensure_platform()?;
        let bucket = self.ensure_bucket()?;

        if let Some(path) = video.storage_path.as_deref().filter(|p| !p.is_empty()) {
            platform.remove(bucket, &[path.to_string()]).await?;
            debug!(path = %path, "Stored object removed");
        }

        let filters = [Filter::eq("id", video.id), Filter::eq("user_id", user_id)];
        platform
            .delete(&self.settings.videos_table, &filters)
            .await?;

        metrics::counter!("gateway.videos.deleted").increment(1);
        info!("Video deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Orientation;
    use crate::platform::MockPlatform;
    use mockall::predicate::*;
    use mockall::Sequence;

    fn sample_video(storage_path: Option<&str>) -> Video {
        Video {
            id: 42,
            title: "Dock at dusk".to_string(),
            duration: "00:15".to_string(),
            orientation: Orientation::Landscape,
            has_human: false,
            color: "orange".to_string(),
            height_class: "high".to_string(),
            upload_date: "2024-05-01T18:30:00Z".to_string(),
            is_deleted: false,
            is_favorite: false,
            url: storage_path.map(|p| format!("https://cdn.test/{p}")),
            thumbnail: None,
            project_id: None,
            storage_path: storage_path.map(String::from),
        }
    }

    fn gateway(mock: MockPlatform, bucket: Option<&str>) -> Gateway {
        Gateway::with_platform(
            Arc::new(mock),
            bucket.map(String::from),
            PlatformConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_fails_fast() {
        let gateway = Gateway::new(&Config::default()).unwrap();
        assert!(!gateway.is_configured());

        let err = gateway.get_current_session().await.unwrap_err();
        assert!(matches!(err, GatewayError::NotConfigured(_)));
        assert!(err.message().contains("SUPABASE_URL"));

        assert!(matches!(
            gateway.fetch_videos("u1").await,
            Err(GatewayError::NotConfigured(_))
        ));
        assert!(gateway.on_auth_state_change(|_| {}).is_err());
    }

    #[tokio::test]
    async fn test_upload_without_bucket_makes_no_call() {
        let mut mock = MockPlatform::new();
        mock.expect_upload().never();

        let gateway = gateway(mock, None);
        let err = gateway
            .upload_video_file(&UploadFile::new("a.mp4", vec![0u8; 4]))
            .await
            .unwrap_err();

        assert!(err.message().contains("SUPABASE_BUCKET"));
    }

    #[tokio::test]
    async fn test_upload_builds_path_and_options() {
        let mut mock = MockPlatform::new();
        mock.expect_upload()
            .withf(|bucket, path, file, options| {
                bucket == "clips"
                    && path.starts_with("videos/")
                    && path.ends_with(".mov")
                    && file.name == "harbor.mov"
                    && options.cache_control_secs == 3600
                    && options.content_type == "video/mp4"
                    && !options.upsert
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));
        mock.expect_public_url()
            .returning(|bucket, path| format!("https://proj.test/public/{bucket}/{path}"));

        let gateway = gateway(mock, Some("clips"));
        let uploaded = gateway
            .upload_video_file(&UploadFile::new("harbor.mov", vec![1u8, 2, 3]))
            .await
            .unwrap();

        assert!(uploaded.path.ends_with(".mov"));
        assert_eq!(
            uploaded.public_url,
            format!("https://proj.test/public/clips/{}", uploaded.path)
        );
    }

    #[tokio::test]
    async fn test_upload_error_propagates() {
        let mut mock = MockPlatform::new();
        mock.expect_upload()
            .returning(|_, _, _, _| Err(GatewayError::platform(409, "The resource already exists")));
        mock.expect_public_url().never();

        let gateway = gateway(mock, Some("clips"));
        let err = gateway
            .upload_video_file(&UploadFile::new("a.mp4", vec![0u8]))
            .await
            .unwrap_err();

        assert_eq!(err, GatewayError::platform(409, "The resource already exists"));
    }

    #[tokio::test]
    async fn test_delete_removes_object_before_row() {
        let mut seq = Sequence::new();
        let mut mock = MockPlatform::new();

        mock.expect_remove()
            .with(eq("clips"), eq(vec!["videos/abc.mp4".to_string()]))
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        mock.expect_delete()
            .withf(|table, filters| {
                table == "videos"
                    && filters == [Filter::eq("id", 42), Filter::eq("user_id", "u1")]
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));

        let gateway = gateway(mock, Some("clips"));
        gateway
            .delete_remote_video(&sample_video(Some("videos/abc.mp4")), "u1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_delete_aborts_when_object_removal_fails() {
        let mut mock = MockPlatform::new();
        mock.expect_remove()
            .times(1)
            .returning(|_, _| Err(GatewayError::platform(500, "storage unavailable")));
        mock.expect_delete().never();

        let gateway = gateway(mock, Some("clips"));
        let err = gateway
            .delete_remote_video(&sample_video(Some("videos/abc.mp4")), "u1")
            .await
            .unwrap_err();

        assert_eq!(err.message(), "storage unavailable");
    }

    #[tokio::test]
    async fn test_delete_without_storage_path_skips_removal() {
        let mut mock = MockPlatform::new();
        mock.expect_remove().never();
        mock.expect_delete().times(1).returning(|_, _| Ok(()));

        let gateway = gateway(mock, Some("clips"));
        gateway
            .delete_remote_video(&sample_video(None), "u1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_save_maps_to_snake_case_row() {
        let mut mock = MockPlatform::new();
        mock.expect_upsert()
            .withf(|table, row| {
                table == "videos"
                    && row["user_id"] == "u1"
                    && row["has_human"] == false
                    && row["height_class"] == "high"
                    && row["is_favorite"] == false
                    && row["thumbnail"].is_null()
                    && row["project_id"].is_null()
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let gateway = gateway(mock, None);
        gateway
            .save_video_metadata(&sample_video(None), "u1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_fetch_queries_newest_first() {
        let mut mock = MockPlatform::new();
        mock.expect_select()
            .withf(|table, query| {
                table == "videos"
                    && *query == RowQuery::new().eq("user_id", "u1").order("upload_date", false)
            })
            .returning(|_, _| {
                Ok(vec![serde_json::json!({
                    "id": 42, "user_id": "u1", "title": "Dock at dusk",
                    "duration": "00:15", "orientation": "landscape",
                    "has_human": false, "color": "orange", "height_class": "high",
                    "upload_date": "2024-05-01T18:30:00Z",
                    "is_deleted": false, "is_favorite": false,
                    "url": null, "thumbnail": null, "project_id": null,
                    "storage_path": null
                })])
            });

        let gateway = gateway(mock, None);
        let videos = gateway.fetch_videos("u1").await.unwrap();

        assert_eq!(videos, vec![sample_video(None)]);
    }

    #[tokio::test]
    async fn test_fetch_rejects_malformed_rows() {
        let mut mock = MockPlatform::new();
        mock.expect_select()
            .returning(|_, _| Ok(vec![serde_json::json!({ "id": "not-a-number" })]));

        let gateway = gateway(mock, None);
        assert!(matches!(
            gateway.fetch_videos("u1").await,
            Err(GatewayError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn test_sign_in_error_propagates_unchanged() {
        let mut mock = MockPlatform::new();
        mock.expect_sign_in_with_password()
            .with(eq("a@b.test"), eq("secret1"))
            .returning(|_, _| Err(GatewayError::platform(400, "Invalid login credentials")));

        let gateway = gateway(mock, None);
        let err = gateway
            .sign_in_with_email("a@b.test", "secret1")
            .await
            .unwrap_err();

        assert_eq!(err, GatewayError::platform(400, "Invalid login credentials"));
    }
}
