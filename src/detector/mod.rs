use crate::config::DetectorConfig;
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

pub mod command;
pub mod mock;

pub use command::CommandDetector;
pub use mock::MockDetector;

/// One raw result from the detector backend, in source-image pixel
/// coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDetection {
    pub class_name: String,
    pub confidence: f64,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

/// Model metadata reported through the model-info endpoint
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_path: String,
    pub classes: Vec<String>,
}

/// Object-detection backend. Implementations must be reentrant: the same
/// instance is shared across concurrent pipeline runs.
#[async_trait]
pub trait Detector: Send + Sync {
    /// Run detection on a stored image. Returns the ordered candidates
    /// clearing the confidence threshold; an empty result is a valid
    /// clean scan. Errors indicate an unreadable image or an unavailable
    /// backend, never "no detections".
    async fn detect(&self, image_path: &Path, confidence_threshold: f64) -> Result<Vec<RawDetection>>;

    /// Metadata describing the loaded model
    fn model_info(&self) -> ModelInfo;

    /// Release backend resources. Called once, after the server stops.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// Build the detector backend selected by configuration
pub fn from_config(config: &DetectorConfig) -> Result<Arc<dyn Detector>> {
    match config.backend.as_str() {
        "command" => Ok(Arc::new(CommandDetector::new(config)?)),
        "mock" => Ok(Arc::new(MockDetector::new(ModelInfo {
            model_path: config.model_path.clone(),
            classes: config.classes.clone(),
        }))),
        other => Err(Error::Config(format!("Unknown detector backend: {}", other)).into()),
    }
}
