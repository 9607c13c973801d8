use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the gateway
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Backend platform configuration
    #[serde(default)]
    pub platform: PlatformConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Backend platform configuration
///
/// `url` and `anon_key` gate every auth and data operation; `bucket` gates
/// uploads and deletes. A missing value does not fail loading, it disables
/// the operations that need it.
#[derive(Debug, Clone, Deserialize)]
pub struct PlatformConfig {
    /// Platform base URL
    pub url: Option<String>,
    /// Anonymous (public) API key
    pub anon_key: Option<String>,
    /// Storage bucket holding uploaded videos
    pub bucket: Option<String>,
    /// HTTP request timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Cache-Control max-age sent with uploads
    #[serde(default = "default_cache_control_secs")]
    pub cache_control_secs: u64,
    /// Table holding video metadata rows
    #[serde(default = "default_videos_table")]
    pub videos_table: String,
    /// Folder inside the bucket for uploaded videos
    #[serde(default = "default_storage_folder")]
    pub storage_folder: String,
    /// Refresh a session this many seconds before it expires
    #[serde(default = "default_refresh_margin_secs")]
    pub refresh_margin_secs: u64,
}

// Default value functions
fn default_service_name() -> String {
    "clipdeck-gateway".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_cache_control_secs() -> u64 {
    3600
}

fn default_videos_table() -> String {
    "videos".to_string()
}

fn default_storage_folder() -> String {
    "videos".to_string()
}

fn default_refresh_margin_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from config files and environment
    pub fn load() -> anyhow::Result<Self> {
        use anyhow::Context;

        let config = config::Config::builder()
            .set_default("service.name", default_service_name())?
            .set_default("service.log_level", default_log_level())?
            .add_source(config::File::with_name("config/clipdeck").required(false))
            .add_source(config::File::with_name("/etc/clipdeck/gateway").required(false))
            // CLIPDECK__PLATFORM__BUCKET -> platform.bucket
            .add_source(
                config::Environment::with_prefix("CLIPDECK")
                    .prefix_separator("__")
                    .separator("__"),
            )
            // Conventional platform variables win over everything else
            .set_override_option("platform.url", std::env::var("SUPABASE_URL").ok())?
            .set_override_option("platform.anon_key", std::env::var("SUPABASE_ANON_KEY").ok())?
            .set_override_option("platform.bucket", std::env::var("SUPABASE_BUCKET").ok())?
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Configuration pointing at a platform, mostly for tests and embedding
    pub fn for_platform(url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            service: ServiceConfig::default(),
            platform: PlatformConfig {
                url: Some(url.into()),
                anon_key: Some(anon_key.into()),
                ..PlatformConfig::default()
            },
        }
    }

    /// Set the storage bucket
    pub fn with_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.platform.bucket = Some(bucket.into());
        self
    }
}

impl PlatformConfig {
    /// Base URL and anon key, when both are present and non-empty
    pub fn credentials(&self) -> Option<(&str, &str)> {
        let url = self.url.as_deref().filter(|s| !s.trim().is_empty())?;
        let key = self.anon_key.as_deref().filter(|s| !s.trim().is_empty())?;
        Some((url, key))
    }

    /// Bucket name, when present and non-empty
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref().filter(|s| !s.trim().is_empty())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get refresh margin as Duration
    pub fn refresh_margin(&self) -> Duration {
        Duration::from_secs(self.refresh_margin_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            url: None,
            anon_key: None,
            bucket: None,
            request_timeout_secs: default_request_timeout_secs(),
            cache_control_secs: default_cache_control_secs(),
            videos_table: default_videos_table(),
            storage_folder: default_storage_folder(),
            refresh_margin_secs: default_refresh_margin_secs(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service: ServiceConfig::default(),
            platform: PlatformConfig::default(),
        }
    }
}
