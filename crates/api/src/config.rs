use classify::TrailingContent;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Env var naming an optional JSON config file.
pub const CONFIG_FILE_VAR: &str = "RXMAP_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub addr: String,
    pub mode: ExtractionMode,
    pub fixture: FixtureConfig,
    pub vision: VisionConfig,
    pub classifier: ClassifierConfig,
    pub retry: RetryConfig,
    pub request_timeout_secs: u64,
    /// JSON test catalog; the built-in catalog is used when absent.
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    Fixture, // Canned record after a fixed delay
    Vision,  // Vision model behind an Ollama endpoint
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureConfig {
    pub delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub base_url: String,
    pub model: String,
    pub max_image_mb: f64,
    pub json_retries: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub trailing: TrailingContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: usize,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8000".to_string(),
            mode: ExtractionMode::Fixture,
            fixture: FixtureConfig::default(),
            vision: VisionConfig::default(),
            classifier: ClassifierConfig::default(),
            retry: RetryConfig::default(),
            request_timeout_secs: 120,
            catalog_path: None,
        }
    }
}

impl Default for FixtureConfig {
    fn default() -> Self {
        Self { delay_ms: 3000 }
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llava".to_string(),
            max_image_mb: 0.5,
            json_retries: 3,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 5000,
        }
    }
}

impl FromStr for ExtractionMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fixture" => Ok(Self::Fixture),
            "vision" => Ok(Self::Vision),
            _ => Err(()),
        }
    }
}

impl AppConfig {
    /// Defaults, then the file named by `RXMAP_CONFIG`, then individual
    /// `RXMAP_*` variables.
    pub fn load() -> Result<Self, ConfigError> {
        let base = match std::env::var(CONFIG_FILE_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        base.with_overrides(|key| std::env::var(key).ok())
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&json).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("RXMAP_ADDR") {
            self.addr = addr;
        }
        if let Some(mode) = lookup("RXMAP_MODE") {
            self.mode = parse_var("RXMAP_MODE", &mode)?;
        }
        if let Some(delay) = lookup("RXMAP_FIXTURE_DELAY_MS") {
            self.fixture.delay_ms = parse_var("RXMAP_FIXTURE_DELAY_MS", &delay)?;
        }
        if let Some(url) = lookup("RXMAP_OLLAMA_URL") {
            self.vision.base_url = url;
        }
        if let Some(model) = lookup("RXMAP_VISION_MODEL") {
            self.vision.model = model;
        }
        if let Some(size) = lookup("RXMAP_MAX_IMAGE_MB") {
            self.vision.max_image_mb = parse_var("RXMAP_MAX_IMAGE_MB", &size)?;
        }
        if let Some(path) = lookup("RXMAP_CATALOG") {
            self.catalog_path = Some(PathBuf::from(path));
        }
        if let Some(strict) = lookup("RXMAP_STRICT_LOCAL_PATHS") {
            self.classifier.trailing = if parse_bool("RXMAP_STRICT_LOCAL_PATHS", &strict)? {
                TrailingContent::Reject
            } else {
                TrailingContent::Greedy
            };
        }
        if let Some(secs) = lookup("RXMAP_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = parse_var("RXMAP_REQUEST_TIMEOUT_SECS", &secs)?;
        }
        if let Some(retries) = lookup("RXMAP_MAX_RETRIES") {
            self.retry.max_retries = parse_var("RXMAP_MAX_RETRIES", &retries)?;
        }

        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let size = self.vision.max_image_mb;
        if !size.is_finite() || size <= 0.0 {
            return Err(invalid("vision.max_image_mb", size));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", 0));
        }
        Ok(())
    }

    pub fn max_image_bytes(&self) -> usize {
        (self.vision.max_image_mb * 1024.0 * 1024.0) as usize
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn parse_var<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, value)),
    }
}

fn invalid(key: &str, value: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}
