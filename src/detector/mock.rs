use crate::detector::{Detector, ModelInfo, RawDetection};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Canned detector used by tests and by the `mock` backend for running
/// the server without a model.
#[derive(Clone)]
pub struct MockDetector {
    info: ModelInfo,
    detections: Vec<RawDetection>,
    delay: Option<Duration>,
    failure: Option<String>,
}

impl MockDetector {
    pub fn new(info: ModelInfo) -> Self {
        Self {
            info,
            detections: Vec::new(),
            delay: None,
            failure: None,
        }
    }

    /// Results to hand back; anything below the call's threshold is
    /// filtered out like a real backend would.
    pub fn with_detections(mut self, detections: Vec<RawDetection>) -> Self {
        self.detections = detections;
        self
    }

    /// Sleep before answering, to exercise timeout and in-flight paths
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Fail every call with the given message
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }
}

#[async_trait]
impl Detector for MockDetector {
    async fn detect(&self, _image_path: &Path, confidence_threshold: f64) -> Result<Vec<RawDetection>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.failure {
            return Err(Error::Detection(message.clone()).into());
        }

        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .cloned()
            .collect())
    }

    fn model_info(&self) -> ModelInfo {
        self.info.clone()
    }
}
