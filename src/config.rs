use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub google: GoogleConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub faces: FacesConfig,

    #[serde(default)]
    pub vision: VisionConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    #[serde(default = "default_photos_endpoint")]
    pub photos_endpoint: String,

    #[serde(default = "default_storage_endpoint")]
    pub storage_endpoint: String,

    #[serde(default = "default_vision_endpoint")]
    pub vision_endpoint: String,

    /// JSON file holding an access token written by an external OAuth helper.
    #[serde(default)]
    pub token_file: Option<PathBuf>,

    /// Literal access token. `FACE_HARVESTER_TOKEN` takes precedence.
    #[serde(default)]
    pub access_token: Option<String>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_photos_endpoint() -> String {
    "https://photoslibrary.googleapis.com".to_string()
}

fn default_storage_endpoint() -> String {
    "https://storage.googleapis.com".to_string()
}

fn default_vision_endpoint() -> String {
    "https://vision.googleapis.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            photos_endpoint: default_photos_endpoint(),
            storage_endpoint: default_storage_endpoint(),
            vision_endpoint: default_vision_endpoint(),
            token_file: None,
            access_token: None,
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl GoogleConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

fn default_bucket() -> String {
    "test-bucket-gpa".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: default_bucket(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacesConfig {
    /// Every face crop filename starts with this; the daily listing skips
    /// anything carrying it.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_album_title")]
    pub album_title: String,

    #[serde(default = "default_upload_description")]
    pub upload_description: String,

    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
}

fn default_file_prefix() -> String {
    "auto_detected_face_image_".to_string()
}

fn default_album_title() -> String {
    "auto_detected_face_images".to_string()
}

fn default_upload_description() -> String {
    "Uploaded from Ada".to_string()
}

fn default_jpeg_quality() -> u8 {
    90
}

impl Default for FacesConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
            album_title: default_album_title(),
            upload_description: default_upload_description(),
            jpeg_quality: default_jpeg_quality(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_poll_interval_secs() -> u64 {
    5
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            poll_interval_secs: default_poll_interval_secs(),
        }
    }
}

impl VisionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_ms() -> u64 {
    500
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_ms: default_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
    Journald,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub format: LogFormat,

    /// Also write a daily rolling log file into this directory.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Config {
    /// Load from `$FACE_HARVESTER_CONFIG` or the default location, falling
    /// back to defaults when no file exists. See [`Config::load_or_default`].
    pub fn load() -> Result<(Self, Option<PathBuf>)> {
        Self::load_or_default(&Self::config_path())
    }

    /// Load `path`, or the defaults if it does not exist. The second value
    /// is the missing path, so the caller can report it once logging is up.
    pub fn load_or_default(path: &Path) -> Result<(Self, Option<PathBuf>)> {
        if path.exists() {
            Ok((Self::load_from(path)?, None))
        } else {
            Ok((Self::default(), Some(path.to_path_buf())))
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))?;
        Ok(config)
    }

    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("FACE_HARVESTER_CONFIG") {
            return PathBuf::from(path);
        }

        Self::config_dir().join("config.toml")
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("face-harvester")
    }
}
