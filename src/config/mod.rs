use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration
#[derive(Debug, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub annotation: AnnotationConfig,
}

/// API server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiConfig {
    /// API server address
    #[serde(default = "default_address")]
    pub address: String,
    /// API server port
    #[serde(default = "default_port")]
    pub port: u16,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_address() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL
    #[serde(default = "default_db_url")]
    pub url: String,
    /// Connection pool max size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Automatic migration on startup
    #[serde(default = "default_auto_migrate")]
    pub auto_migrate: bool,
}

fn default_db_url() -> String {
    "sqlite://satwatch.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_auto_migrate() -> bool {
    true
}

/// Image storage configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Directory for uploaded originals
    #[serde(default = "default_upload_dir")]
    pub upload_dir: PathBuf,
    /// Directory for annotated result images
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,
    /// Maximum accepted upload size in mebibytes
    #[serde(default = "default_max_upload_mb")]
    pub max_upload_mb: u64,
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_max_upload_mb() -> u64 {
    50
}

impl StorageConfig {
    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_mb * 1024 * 1024
    }
}

/// Detector backend configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DetectorConfig {
    /// Backend selection ("command" or "mock")
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Inference command for the "command" backend
    #[serde(default)]
    pub command: Option<String>,
    /// Model weights path, reported through the model-info endpoint
    #[serde(default = "default_model_path")]
    pub model_path: String,
    /// Class labels the model was trained on
    #[serde(default = "default_classes")]
    pub classes: Vec<String>,
    /// Minimum confidence for a detection to be reported
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Upper bound on a single detector invocation in seconds
    #[serde(default = "default_detector_timeout")]
    pub timeout_secs: u64,
}

fn default_backend() -> String {
    "mock".to_string()
}

fn default_model_path() -> String {
    "models/satellite_model.pt".to_string()
}

fn default_classes() -> Vec<String> {
    vec!["truck".to_string(), "warehouse".to_string()]
}

fn default_confidence_threshold() -> f64 {
    0.5
}

fn default_detector_timeout() -> u64 {
    30
}

/// Annotation rendering configuration
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct AnnotationConfig {
    /// TTF/OTF font used for box labels; boxes are drawn without labels
    /// when unset or unloadable
    #[serde(default)]
    pub font_path: Option<PathBuf>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            log_level: default_log_level(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            max_connections: default_max_connections(),
            auto_migrate: default_auto_migrate(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            results_dir: default_results_dir(),
            max_upload_mb: default_max_upload_mb(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            command: None,
            model_path: default_model_path(),
            classes: default_classes(),
            confidence_threshold: default_confidence_threshold(),
            timeout_secs: default_detector_timeout(),
        }
    }
}

/// Load configuration from a file or use default
pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
    match config_path {
        Some(path) => {
            let config_str = std::fs::read_to_string(path)
                .context(format!("Failed to read config file: {:?}", path))?;

            let config = if path.extension().map_or(false, |ext| ext == "json") {
                serde_json::from_str(&config_str).context("Failed to parse JSON config")?
            } else if path.extension().map_or(false, |ext| ext == "toml") {
                toml::from_str(&config_str).context("Failed to parse TOML config")?
            } else {
                return Err(anyhow::anyhow!("Unsupported config file format"));
            };

            Ok(config)
        }
        None => Ok(Config::default()),
    }
}
