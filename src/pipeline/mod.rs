use crate::config::{AnnotationConfig, DetectorConfig, StorageConfig};
use crate::db::models::alert_models::Alert;
use crate::db::models::detection_models::{BoundingBox, Detection};
use crate::db::models::image_models::Image;
use crate::db::repositories::alerts::AlertsRepository;
use crate::db::repositories::detections::DetectionsRepository;
use crate::db::repositories::images::ImagesRepository;
use crate::detector::{Detector, RawDetection};
use crate::error::Error;
use anyhow::Result;
use log::{error, info, warn};
use sqlx::SqlitePool;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

pub mod annotate;
pub mod validate;

pub use annotate::AnnotationRenderer;

/// End-to-end result of one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub image: Image,
    pub detections: Vec<Detection>,
    pub alerts: Vec<Alert>,
    pub annotated_image: Option<String>,
}

/// Sequences one upload through validation, detection, persistence,
/// alert synthesis and annotation rendering.
pub struct DetectionPipeline {
    images: ImagesRepository,
    detections: DetectionsRepository,
    alerts: AlertsRepository,
    detector: Arc<dyn Detector>,
    renderer: Arc<AnnotationRenderer>,
    upload_dir: PathBuf,
    results_dir: PathBuf,
    max_upload_bytes: u64,
    confidence_threshold: f64,
    detector_timeout: Duration,
    /// Images with a detection pass currently in flight
    in_flight: Mutex<HashSet<Uuid>>,
}

impl DetectionPipeline {
    pub fn new(
        pool: Arc<SqlitePool>,
        detector: Arc<dyn Detector>,
        storage: &StorageConfig,
        detector_config: &DetectorConfig,
        annotation: &AnnotationConfig,
    ) -> Self {
        Self {
            images: ImagesRepository::new(pool.clone()),
            detections: DetectionsRepository::new(pool.clone()),
            alerts: AlertsRepository::new(pool),
            detector,
            renderer: Arc::new(AnnotationRenderer::new(annotation)),
            upload_dir: storage.upload_dir.clone(),
            results_dir: storage.results_dir.clone(),
            max_upload_bytes: storage.max_upload_bytes(),
            confidence_threshold: detector_config.confidence_threshold,
            detector_timeout: Duration::from_secs(detector_config.timeout_secs),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Validate, store and process one upload end to end. Validation
    /// failures leave no file and no record behind.
    pub async fn process_upload(&self, original_filename: &str, data: &[u8]) -> Result<PipelineOutcome> {
        validate::validate_upload(original_filename, data.len() as u64, self.max_upload_bytes)?;

        let stored_name = validate::stored_filename(original_filename, chrono::Utc::now());
        let file_path = self.upload_dir.join(&stored_name);

        tokio::fs::write(&file_path, data)
            .await
            .map_err(|e| Error::Io(format!("Failed to store upload: {}", e)))?;

        let image = Image::new(stored_name, original_filename.to_string(), &file_path, data.len() as i64);
        let image = match self.images.create(&image).await {
            Ok(image) => image,
            Err(e) => {
                if let Err(remove_err) = tokio::fs::remove_file(&file_path).await {
                    warn!("Failed to remove orphaned upload {}: {}", file_path.display(), remove_err);
                }
                return Err(e);
            }
        };

        info!(
            "Stored upload {} as {} ({} bytes)",
            image.original_filename, image.filename, image.file_size
        );

        self.process_image(image).await
    }

    /// Run the detection pass for a stored image. At most one pass may be
    /// in flight per image; a concurrent re-trigger is rejected.
    pub async fn process_image(&self, image: Image) -> Result<PipelineOutcome> {
        let _claim = self.claim(image.id)?;
        self.run(&image).await
    }

    /// Claim the in-flight slot for an image. The returned guard frees the
    /// slot when dropped, so a pass cancelled at an await point cannot
    /// leave the image claimed.
    fn claim(&self, id: Uuid) -> Result<InFlightClaim<'_>> {
        let mut in_flight = self.in_flight.lock().unwrap();
        if !in_flight.insert(id) {
            return Err(Error::AlreadyProcessing(format!("Image {} is already being processed", id)).into());
        }
        Ok(InFlightClaim {
            in_flight: &self.in_flight,
            id,
        })
    }

    async fn run(&self, image: &Image) -> Result<PipelineOutcome> {
        let source_path = PathBuf::from(&image.file_path);

        let raw_detections = match tokio::time::timeout(
            self.detector_timeout,
            self.detector.detect(&source_path, self.confidence_threshold),
        )
        .await
        {
            Ok(Ok(detections)) => detections,
            Ok(Err(e)) => {
                error!("Detection failed for image {}: {}", image.id, e);
                return Err(e);
            }
            Err(_) => {
                error!(
                    "Detection timed out for image {} after {}s",
                    image.id,
                    self.detector_timeout.as_secs()
                );
                return Err(Error::Detection(format!(
                    "Detector timed out after {} seconds",
                    self.detector_timeout.as_secs()
                ))
                .into());
            }
        };

        info!(
            "Detector returned {} candidates for image {}",
            raw_detections.len(),
            image.id
        );

        let mut detections = Vec::new();
        let mut alerts = Vec::new();

        for raw in &raw_detections {
            match self.store_detection(image, raw).await {
                Ok((detection, alert)) => {
                    detections.push(detection);
                    if let Some(alert) = alert {
                        alerts.push(alert);
                    }
                }
                Err(e) => {
                    // One bad unit must not sink the remaining detections.
                    error!("Failed to store detection for image {}: {}", image.id, e);
                }
            }
        }

        self.images.mark_processed(&image.id).await?;

        // Decode/draw/encode happens off the async workers.
        let render = {
            let renderer = Arc::clone(&self.renderer);
            let detections = detections.clone();
            let results_dir = self.results_dir.clone();
            tokio::task::spawn_blocking(move || renderer.render(&source_path, &detections, &results_dir)).await
        };
        let annotated_image = match render {
            Ok(Ok(name)) => Some(name),
            Ok(Err(e)) => {
                error!("Annotation failed for image {}: {}", image.id, e);
                None
            }
            Err(e) => {
                error!("Annotation task failed for image {}: {}", image.id, e);
                None
            }
        };

        let mut image = image.clone();
        image.processed = true;

        Ok(PipelineOutcome {
            image,
            detections,
            alerts,
            annotated_image,
        })
    }

    /// One per-detection unit: the detection row first, then its alert.
    /// An alert failure keeps the stored detection.
    async fn store_detection(&self, image: &Image, raw: &RawDetection) -> Result<(Detection, Option<Alert>)> {
        let bounding_box = BoundingBox {
            x_min: raw.x_min,
            y_min: raw.y_min,
            x_max: raw.x_max,
            y_max: raw.y_max,
        };

        if !bounding_box.is_valid() {
            return Err(Error::Detection(format!(
                "Invalid bounding box from detector: {:?}",
                bounding_box
            ))
            .into());
        }

        let detection = self
            .detections
            .create(&Detection::new(
                image.id,
                raw.class_name.clone(),
                raw.confidence,
                bounding_box,
            ))
            .await?;

        let alert = match self
            .alerts
            .create(&Alert::for_detection(&detection, &image.original_filename))
            .await
        {
            Ok(alert) => Some(alert),
            Err(e) => {
                error!("Failed to create alert for detection {}: {}", detection.id, e);
                None
            }
        };

        Ok((detection, alert))
    }

    /// Administrative delete: cascade the rows in one transaction, then
    /// remove the stored original and its annotated copy best-effort.
    pub async fn delete_image(&self, id: &Uuid) -> Result<Option<Image>> {
        let image = match self.images.delete_cascade(id).await? {
            Some(image) => image,
            None => return Ok(None),
        };

        let source_path = PathBuf::from(&image.file_path);
        if let Err(e) = tokio::fs::remove_file(&source_path).await {
            warn!("Failed to remove stored image {}: {}", source_path.display(), e);
        }

        if let Some(stem) = source_path.file_stem().and_then(|s| s.to_str()) {
            let annotated_path = self.results_dir.join(format!("result_{}.jpg", stem));
            if let Err(e) = tokio::fs::remove_file(&annotated_path).await {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove annotated image {}: {}", annotated_path.display(), e);
                }
            }
        }

        info!("Deleted image {} ({})", image.id, image.filename);

        Ok(Some(image))
    }
}

/// Releases an image's in-flight slot when dropped
struct InFlightClaim<'a> {
    in_flight: &'a Mutex<HashSet<Uuid>>,
    id: Uuid,
}

impl Drop for InFlightClaim<'_> {
    fn drop(&mut self) {
        if let Ok(mut in_flight) = self.in_flight.lock() {
            in_flight.remove(&self.id);
        }
    }
}
