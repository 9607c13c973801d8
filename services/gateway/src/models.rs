use serde::{Deserialize, Serialize};

/// Clip orientation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    Portrait,
    Landscape,
}

/// A clip as the front end holds it
///
/// Serialized in camelCase; absent optional fields are omitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: i64,
    pub title: String,
    /// Display duration, e.g. "00:12"
    pub duration: String,
    pub orientation: Orientation,
    pub has_human: bool,
    /// Dominant color
    pub color: String,
    pub height_class: String,
    /// ISO-8601 upload timestamp
    pub upload_date: String,
    /// Soft-delete flag
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_favorite: bool,
    /// Public URL of the stored file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<i64>,
    /// Object path inside the storage bucket
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
}

/// A row of the `videos` table
///
/// Optional columns serialize as explicit `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: i64,
    pub user_id: String,
    pub title: String,
    pub duration: String,
    pub orientation: Orientation,
    pub has_human: bool,
    pub color: String,
    pub height_class: String,
    pub upload_date: String,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default)]
    pub is_favorite: bool,
    pub url: Option<String>,
    pub thumbnail: Option<String>,
    pub project_id: Option<i64>,
    pub storage_path: Option<String>,
}

impl VideoRecord {
    /// Build the persisted row for a video owned by `user_id`
    pub fn from_video(video: &Video, user_id: &str) -> Self {
        Self {
            id: video.id,
            user_id: user_id.to_string(),
            title: video.title.clone(),
            duration: video.duration.clone(),
            orientation: video.orientation,
            has_human: video.has_human,
            color: video.color.clone(),
            height_class: video.height_class.clone(),
            upload_date: video.upload_date.clone(),
            is_deleted: video.is_deleted,
            is_favorite: video.is_favorite,
            url: video.url.clone(),
            thumbnail: video.thumbnail.clone(),
            project_id: video.project_id,
            storage_path: video.storage_path.clone(),
        }
    }
}

impl From<VideoRecord> for Video {
    fn from(r: VideoRecord) -> Self {
        Self {
            id: r.id,
            title: r.title,
            duration: r.duration,
            orientation: r.orientation,
            has_human: r.has_human,
            color: r.color,
            height_class: r.height_class,
            upload_date: r.upload_date,
            is_deleted: r.is_deleted,
            is_favorite: r.is_favorite,
            url: r.url,
            thumbnail: r.thumbnail,
            project_id: r.project_id,
            storage_path: r.storage_path,
        }
    }
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    /// Publicly resolvable URL of the object
    pub public_url: String,
    /// Object path inside the bucket
    pub path: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_video() -> Video {
        Video {
            id: 1718000000000,
            title: "Morning walk".to_string(),
            duration: "00:42".to_string(),
            orientation: Orientation::Portrait,
            has_human: true,
            color: "green".to_string(),
            height_class: "eye-level".to_string(),
            upload_date: "2024-06-10T08:00:00.000Z".to_string(),
            is_deleted: false,
            is_favorite: true,
            url: None,
            thumbnail: None,
            project_id: Some(7),
            storage_path: None,
        }
    }

    #[test]
    fn test_record_serializes_nulls() {
        let record = VideoRecord::from_video(&sample_video(), "user-1");
        let row = serde_json::to_value(&record).unwrap();

        assert_eq!(row["user_id"], "user-1");
        assert_eq!(row["has_human"], true);
        assert_eq!(row["height_class"], "eye-level");
        assert_eq!(row["orientation"], "portrait");
        assert!(row["url"].is_null());
        assert!(row["storage_path"].is_null());
        assert_eq!(row["project_id"], 7);
    }

    #[test]
    fn test_video_omits_absent_fields() {
        let json = serde_json::to_value(sample_video()).unwrap();

        assert_eq!(json["hasHuman"], true);
        assert_eq!(json["uploadDate"], "2024-06-10T08:00:00.000Z");
        assert!(json.get("url").is_none());
        assert!(json.get("storagePath").is_none());
        assert_eq!(json["projectId"], 7);
    }

    #[test]
    fn test_video_flags_default_to_false() {
        let video: Video = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "t",
            "duration": "00:01",
            "orientation": "landscape",
            "hasHuman": false,
            "color": "red",
            "heightClass": "low",
            "uploadDate": "2024-01-01T00:00:00Z"
        }))
        .unwrap();

        assert!(!video.is_deleted);
        assert!(!video.is_favorite);
        assert_eq!(video.orientation, Orientation::Landscape);
    }

    #[test]
    fn test_record_to_video() {
        let record = VideoRecord::from_video(&sample_video(), "user-1");
        let video: Video = record.into();
        assert_eq!(video, sample_video());
    }
}
