use crate::error::Result;
use bytes::Bytes;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Extension used when a file name carries none
pub const DEFAULT_EXTENSION: &str = "mp4";

/// Content type used when a file does not declare one
pub const DEFAULT_CONTENT_TYPE: &str = "video/mp4";

static FALLBACK_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A file to upload
#[derive(Debug, Clone)]
pub struct UploadFile {
    /// Original file name, used for the extension
    pub name: String,
    /// Declared MIME type
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl UploadFile {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: None,
            data: data.into(),
        }
    }

    /// Set the declared MIME type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Read a local file, inferring its content type from the extension
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default()
            .to_string();
        let content_type = guess_content_type(&name).map(String::from);

        Ok(Self {
            name,
            content_type,
            data: Bytes::from(data),
        })
    }

    /// Content type to send, falling back to `video/mp4`
    pub fn content_type(&self) -> &str {
        self.content_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// Generate a collision-resistant identifier for a stored file
///
/// Uses a random v4 UUID from the OS generator. When the generator is
/// unavailable, falls back to `<unix-millis>-<base36 suffix>`.
pub fn build_file_id() -> String {
    let mut bytes = [0u8; 16];
    match getrandom::getrandom(&mut bytes) {
        Ok(()) => uuid::Builder::from_random_bytes(bytes).into_uuid().to_string(),
        Err(_) => fallback_file_id(),
    }
}

/// Timestamp plus pseudo-random suffix
pub fn fallback_file_id() -> String {
    let now = Utc::now();
    let count = FALLBACK_COUNTER.fetch_add(1, Ordering::Relaxed);
    // Seeded by hand so no OS generator is needed
    let seed = now.timestamp_nanos_opt().unwrap_or_default() as u64 ^ count;
    let mut rng = StdRng::seed_from_u64(seed);
    // Counter in the low bits keeps ids distinct within one millisecond
    let suffix = (rng.gen::<u64>() << 16) | (count & 0xFFFF);

    format!("{}-{}", now.timestamp_millis(), to_base36(suffix))
}

/// Extension of a file name, or `mp4` when it has none
pub fn file_extension(file_name: &str) -> &str {
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext,
        _ => DEFAULT_EXTENSION,
    }
}

/// Object path for an uploaded file: `{folder}/{file_id}.{ext}`
pub fn storage_path(folder: &str, file_id: &str, file_name: &str) -> String {
    format!(
        "{folder}/{file_id}.{ext}",
        folder = folder.trim_matches('/'),
        file_id = file_id,
        ext = file_extension(file_name)
    )
}

/// Content type for common video extensions
pub fn guess_content_type(file_name: &str) -> Option<&'static str> {
    let (_, ext) = file_name.rsplit_once('.')?;
    match ext.to_lowercase().as_str() {
        "mp4" => Some("video/mp4"),
        "m4v" => Some("video/x-m4v"),
        "mov" => Some("video/quicktime"),
        "webm" => Some("video/webm"),
        "mkv" => Some("video/x-matroska"),
        "avi" => Some("video/x-msvideo"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        _ => None,
    }
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
