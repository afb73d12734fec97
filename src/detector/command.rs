use crate::config::DetectorConfig;
use crate::detector::{Detector, ModelInfo, RawDetection};
use crate::error::Error;
use anyhow::Result;
use async_trait::async_trait;
use log::{debug, info};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Detector backend that shells out to a configured inference command,
/// one subprocess per call.
///
/// Invocation: `<command> --model <path> --image <path> --confidence <t>`.
/// The command prints a JSON array of detections on stdout, each object
/// carrying `class_name`, `confidence` and the pixel box corners
/// (`x_min`, `y_min`, `x_max`, `y_max`). A non-zero exit, a spawn error
/// or unparseable output is a detection failure.
pub struct CommandDetector {
    command: String,
    model_path: String,
    classes: Vec<String>,
}

impl CommandDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        let command = config
            .command
            .clone()
            .ok_or_else(|| Error::Config("detector.command is required for the command backend".to_string()))?;

        info!("Using inference command: {} (model: {})", command, config.model_path);

        Ok(Self {
            command,
            model_path: config.model_path.clone(),
            classes: config.classes.clone(),
        })
    }
}

#[async_trait]
impl Detector for CommandDetector {
    async fn detect(&self, image_path: &Path, confidence_threshold: f64) -> Result<Vec<RawDetection>> {
        let output = Command::new(&self.command)
            .arg("--model")
            .arg(&self.model_path)
            .arg("--image")
            .arg(image_path)
            .arg("--confidence")
            .arg(confidence_threshold.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| Error::Detection(format!("Failed to run inference command: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Detection(format!(
                "Inference command exited with {}: {}",
                output.status,
                stderr.trim()
            ))
            .into());
        }

        let detections: Vec<RawDetection> = serde_json::from_slice(&output.stdout)
            .map_err(|e| Error::Detection(format!("Invalid inference command output: {}", e)))?;

        debug!(
            "Inference command returned {} detections for {}",
            detections.len(),
            image_path.display()
        );

        Ok(detections)
    }

    fn model_info(&self) -> ModelInfo {
        ModelInfo {
            model_path: self.model_path.clone(),
            classes: self.classes.clone(),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        // Nothing held between calls; each invocation is its own process.
        Ok(())
    }
}

#[cfg(test)]
#[cfg(unix)]
mod tests {
    use super::*;

    fn stub_config(command: &Path) -> DetectorConfig {
        DetectorConfig {
            backend: "command".to_string(),
            command: Some(command.to_string_lossy().to_string()),
            ..DetectorConfig::default()
        }
    }

    fn write_script(dir: &Path, body: &str) -> std::path::PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("detect.sh");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[tokio::test]
    async fn parses_stub_output() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(
            dir.path(),
            r#"echo '[{"class_name":"truck","confidence":0.87,"x_min":10,"y_min":20,"x_max":110,"y_max":90}]'"#,
        );

        let detector = CommandDetector::new(&stub_config(&script)).unwrap();
        let detections = detector.detect(Path::new("ignored.png"), 0.5).await.unwrap();

        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].class_name, "truck");
        assert_eq!(detections[0].confidence, 0.87);
        assert_eq!(detections[0].x_max, 110.0);
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo 'model not found' >&2\nexit 3");

        let detector = CommandDetector::new(&stub_config(&script)).unwrap();
        let result = detector.detect(Path::new("ignored.png"), 0.5).await;

        let err = result.unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }

    #[tokio::test]
    async fn garbage_output_is_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "echo 'not json'");

        let detector = CommandDetector::new(&stub_config(&script)).unwrap();
        assert!(detector.detect(Path::new("ignored.png"), 0.5).await.is_err());
    }

    #[tokio::test]
    async fn missing_command_fails_to_spawn() {
        let config = DetectorConfig {
            backend: "command".to_string(),
            command: Some("/nonexistent/inference-binary".to_string()),
            ..DetectorConfig::default()
        };

        let detector = CommandDetector::new(&config).unwrap();
        assert!(detector.detect(Path::new("ignored.png"), 0.5).await.is_err());
    }

    #[test]
    fn command_backend_requires_a_command() {
        let config = DetectorConfig::default();
        assert!(CommandDetector::new(&config).is_err());
    }
}
