use chrono::{DateTime, Utc};
use image::{ImageBuffer, Rgb};
use satwatch::api::rest::{build_router, AppState};
use satwatch::config::{AnnotationConfig, DatabaseConfig, DetectorConfig, StorageConfig};
use satwatch::db::models::alert_models::Alert;
use satwatch::db::models::detection_models::{BoundingBox, Detection};
use satwatch::db::models::image_models::Image;
use satwatch::db::repositories::alerts::AlertsRepository;
use satwatch::db::repositories::detections::DetectionsRepository;
use satwatch::db::repositories::images::ImagesRepository;
use satwatch::db::DatabaseService;
use satwatch::detector::{Detector, ModelInfo, RawDetection};
use satwatch::pipeline::DetectionPipeline;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use uuid::Uuid;

/// Migrated SQLite database in a temp directory. Keep the TempDir alive
/// for the duration of the test.
pub async fn temp_db() -> (Arc<SqlitePool>, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("test.db").display()),
        max_connections: 5,
        auto_migrate: true,
    };
    let service = DatabaseService::new(&config)
        .await
        .expect("Failed to create test database");
    (service.pool, dir)
}

/// Storage layout under a test's temp directory
pub fn storage_config(dir: &TempDir) -> StorageConfig {
    StorageConfig {
        upload_dir: dir.path().join("uploads"),
        results_dir: dir.path().join("results"),
        max_upload_mb: 5,
    }
}

/// Pipeline over a migrated temp database, with storage directories
/// under the same temp directory.
pub async fn make_pipeline(
    detector: Arc<dyn Detector>,
    detector_config: DetectorConfig,
) -> (Arc<DetectionPipeline>, Arc<SqlitePool>, TempDir) {
    let (pool, dir) = temp_db().await;
    let storage = storage_config(&dir);
    std::fs::create_dir_all(&storage.upload_dir).expect("Failed to create upload dir");
    std::fs::create_dir_all(&storage.results_dir).expect("Failed to create results dir");

    let pipeline = Arc::new(DetectionPipeline::new(
        pool.clone(),
        detector,
        &storage,
        &detector_config,
        &AnnotationConfig::default(),
    ));

    (pipeline, pool, dir)
}

/// Full API router over a temp database and the given detector
pub async fn test_router(detector: Arc<dyn Detector>) -> (axum::Router, Arc<SqlitePool>, TempDir) {
    let (pool, dir) = temp_db().await;
    let storage = storage_config(&dir);
    std::fs::create_dir_all(&storage.upload_dir).expect("Failed to create upload dir");
    std::fs::create_dir_all(&storage.results_dir).expect("Failed to create results dir");

    let pipeline = Arc::new(DetectionPipeline::new(
        pool.clone(),
        detector.clone(),
        &storage,
        &DetectorConfig::default(),
        &AnnotationConfig::default(),
    ));

    let state = AppState {
        db_pool: pool.clone(),
        pipeline,
        detector,
        storage,
    };

    (build_router(state), pool, dir)
}

/// Model metadata matching the default configuration
pub fn model_info() -> ModelInfo {
    ModelInfo {
        model_path: "models/satellite_model.pt".to_string(),
        classes: vec!["truck".to_string(), "warehouse".to_string()],
    }
}

pub fn raw_detection(class_name: &str, confidence: f64) -> RawDetection {
    RawDetection {
        class_name: class_name.to_string(),
        confidence,
        x_min: 20.0,
        y_min: 30.0,
        x_max: 80.0,
        y_max: 90.0,
    }
}

/// Write a 200x120 dark test image under `dir` and return its path
pub fn write_test_png(dir: &Path, name: &str) -> PathBuf {
    let img = ImageBuffer::from_fn(200, 120, |_, _| Rgb([30u8, 30u8, 30u8]));
    let path = dir.join(name);
    img.save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    path
}

/// In-memory PNG bytes for upload bodies
pub fn test_png_bytes() -> Vec<u8> {
    let img = ImageBuffer::from_fn(200, 120, |_, _| Rgb([30u8, 30u8, 30u8]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    img.write_to(&mut bytes, image::ImageFormat::Png)
        .expect("Failed to encode test image");
    bytes.into_inner()
}

/// Insert an image row directly, bypassing the pipeline
pub async fn seed_image(pool: &Arc<SqlitePool>, original: &str, uploaded: DateTime<Utc>) -> Image {
    let mut image = Image::new(
        format!("{}_{}", Uuid::new_v4().simple(), original),
        original.to_string(),
        Path::new("/nonexistent/source.png"),
        1024,
    );
    image.upload_timestamp = uploaded;
    ImagesRepository::new(pool.clone())
        .create(&image)
        .await
        .expect("Failed to seed image")
}

/// Insert a detection row directly with an explicit timestamp
pub async fn seed_detection(
    pool: &Arc<SqlitePool>,
    image_id: Uuid,
    class_name: &str,
    confidence: f64,
    at: DateTime<Utc>,
) -> Detection {
    let mut detection = Detection::new(
        image_id,
        class_name.to_string(),
        confidence,
        BoundingBox {
            x_min: 10.0,
            y_min: 10.0,
            x_max: 60.0,
            y_max: 60.0,
        },
    );
    detection.detection_timestamp = at;
    DetectionsRepository::new(pool.clone())
        .create(&detection)
        .await
        .expect("Failed to seed detection")
}

/// Insert the alert for a seeded detection with an explicit timestamp
pub async fn seed_alert(pool: &Arc<SqlitePool>, detection: &Detection, at: DateTime<Utc>) -> Alert {
    let mut alert = Alert::for_detection(detection, "seed.png");
    alert.alert_timestamp = at;
    AlertsRepository::new(pool.clone())
        .create(&alert)
        .await
        .expect("Failed to seed alert")
}

/// Hand-rolled multipart body with a single field holding file data
pub fn multipart_body(boundary: &str, field: &str, filename: &str, data: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
            field, filename
        )
        .as_bytes(),
    );
    body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}
