//! Integration tests for the detection pipeline: upload ingestion,
//! detector invocation, persistence, alert synthesis and cleanup.

mod common;

use chrono::Utc;
use common::*;
use satwatch::config::DetectorConfig;
use satwatch::db::models::alert_models::Severity;
use satwatch::db::repositories::alerts::AlertsRepository;
use satwatch::db::repositories::detections::DetectionsRepository;
use satwatch::db::repositories::images::ImagesRepository;
use satwatch::detector::{MockDetector, RawDetection};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn upload_with_detection_stores_rows_and_alert() -> anyhow::Result<()> {
    let detector = Arc::new(
        MockDetector::new(model_info()).with_detections(vec![raw_detection("truck", 0.875)]),
    );
    let (pipeline, pool, dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let outcome = pipeline.process_upload("scene.png", &test_png_bytes()).await?;

    assert!(outcome.image.processed);
    assert!(outcome.image.filename.ends_with("_scene.png"));
    assert_eq!(outcome.detections.len(), 1);
    assert_eq!(outcome.detections[0].class_name, "truck");
    assert_eq!(outcome.detections[0].confidence, 0.875);
    assert_eq!(outcome.alerts.len(), 1);
    assert_eq!(
        outcome.alerts[0].message,
        "TRUCK detected in scene.png with 87.50% confidence"
    );
    assert_eq!(outcome.alerts[0].severity, Severity::Medium);
    assert_eq!(outcome.alerts[0].detection_id, outcome.detections[0].id);
    assert!(!outcome.alerts[0].acknowledged);

    // Stored original and annotated copy both exist on disk
    let uploaded = dir.path().join("uploads").join(&outcome.image.filename);
    assert!(uploaded.is_file());
    let annotated = outcome
        .annotated_image
        .clone()
        .expect("annotated image should be rendered");
    assert!(annotated.starts_with("result_"));
    assert!(annotated.ends_with(".jpg"));
    assert!(dir.path().join("results").join(&annotated).is_file());

    // The rows are queryable afterwards
    let stored = ImagesRepository::new(pool.clone())
        .get_by_id(&outcome.image.id)
        .await?
        .expect("image row should exist");
    assert!(stored.processed);
    assert_eq!(DetectionsRepository::new(pool.clone()).count(None).await?, 1);
    assert_eq!(AlertsRepository::new(pool.clone()).count(None, None).await?, 1);

    Ok(())
}

#[tokio::test]
async fn clean_scan_is_processed_with_no_rows() -> anyhow::Result<()> {
    let detector = Arc::new(MockDetector::new(model_info()));
    let (pipeline, pool, _dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let outcome = pipeline
        .process_upload("empty_field.png", &test_png_bytes())
        .await?;

    assert!(outcome.image.processed);
    assert!(outcome.detections.is_empty());
    assert!(outcome.alerts.is_empty());
    // A clean scan still gets its annotated copy
    assert!(outcome.annotated_image.is_some());
    assert_eq!(DetectionsRepository::new(pool.clone()).count(None).await?, 0);

    Ok(())
}

#[tokio::test]
async fn below_threshold_candidates_are_dropped() -> anyhow::Result<()> {
    let detector = Arc::new(MockDetector::new(model_info()).with_detections(vec![
        raw_detection("truck", 0.875),
        raw_detection("warehouse", 0.3),
    ]));
    let (pipeline, pool, _dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let outcome = pipeline.process_upload("scene.png", &test_png_bytes()).await?;

    assert_eq!(outcome.detections.len(), 1);
    assert_eq!(outcome.detections[0].class_name, "truck");
    assert_eq!(DetectionsRepository::new(pool.clone()).count(None).await?, 1);

    Ok(())
}

#[tokio::test]
async fn detector_failure_leaves_image_unprocessed() -> anyhow::Result<()> {
    let detector = Arc::new(MockDetector::new(model_info()).failing("model exploded"));
    let (pipeline, pool, _dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let err = pipeline
        .process_upload("scene.png", &test_png_bytes())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("model exploded"));

    // The image record survives, still unprocessed, with no detections
    let images = ImagesRepository::new(pool.clone());
    assert_eq!(images.count().await?, 1);
    let page = images.list(None, None).await?;
    assert!(!page.items[0].processed);
    assert_eq!(page.items[0].detection_count, 0);
    assert_eq!(DetectionsRepository::new(pool.clone()).count(None).await?, 0);

    Ok(())
}

#[tokio::test]
async fn slow_detector_times_out() -> anyhow::Result<()> {
    let detector = Arc::new(
        MockDetector::new(model_info())
            .with_detections(vec![raw_detection("truck", 0.95)])
            .with_delay(Duration::from_millis(1500)),
    );
    let config = DetectorConfig {
        timeout_secs: 1,
        ..Default::default()
    };
    let (pipeline, pool, _dir) = make_pipeline(detector, config).await;

    let err = pipeline
        .process_upload("scene.png", &test_png_bytes())
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timed out"));

    let page = ImagesRepository::new(pool.clone()).list(None, None).await?;
    assert_eq!(page.total, 1);
    assert!(!page.items[0].processed);
    assert_eq!(DetectionsRepository::new(pool.clone()).count(None).await?, 0);

    Ok(())
}

#[tokio::test]
async fn rejected_uploads_leave_no_trace() -> anyhow::Result<()> {
    let detector = Arc::new(MockDetector::new(model_info()));
    let (pipeline, pool, dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let err = pipeline
        .process_upload("notes.txt", b"not an image")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("File type not allowed"));

    let err = pipeline.process_upload("scene.png", b"").await.unwrap_err();
    assert!(err.to_string().contains("empty"));

    let err = pipeline.process_upload("", b"data").await.unwrap_err();
    assert!(err.to_string().contains("No file selected"));

    assert_eq!(ImagesRepository::new(pool.clone()).count().await?, 0);
    let uploads = std::fs::read_dir(dir.path().join("uploads"))?.count();
    assert_eq!(uploads, 0);

    Ok(())
}

#[tokio::test]
async fn concurrent_processing_of_one_image_is_rejected() -> anyhow::Result<()> {
    let detector = Arc::new(MockDetector::new(model_info()).with_delay(Duration::from_millis(300)));
    let (pipeline, pool, _dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let image = seed_image(&pool, "racy.png", Utc::now()).await;

    let first = {
        let pipeline = pipeline.clone();
        let image = image.clone();
        tokio::spawn(async move { pipeline.process_image(image).await })
    };

    // Give the first pass time to claim the image
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = pipeline.process_image(image.clone()).await.unwrap_err();
    assert!(err.to_string().contains("already being processed"));

    // The first pass completes and releases the claim
    let outcome = first.await??;
    assert!(outcome.image.processed);

    // A later re-run of the same image is allowed again
    let rerun = pipeline.process_image(image).await;
    assert!(rerun.is_ok());

    Ok(())
}

#[tokio::test]
async fn cancelled_processing_releases_the_image_claim() -> anyhow::Result<()> {
    let detector = Arc::new(
        MockDetector::new(model_info())
            .with_detections(vec![raw_detection("truck", 0.875)])
            .with_delay(Duration::from_millis(300)),
    );
    let (pipeline, pool, _dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let image = seed_image(&pool, "dropped.png", Utc::now()).await;

    let first = {
        let pipeline = pipeline.clone();
        let image = image.clone();
        tokio::spawn(async move { pipeline.process_image(image).await })
    };

    // Let the first pass claim the image, then drop it mid-detection, the
    // way a disconnecting client drops its upload handler.
    tokio::time::sleep(Duration::from_millis(50)).await;
    first.abort();
    assert!(first.await.unwrap_err().is_cancelled());

    // The claim is gone with the cancelled pass; a fresh run goes through
    let outcome = pipeline.process_image(image).await?;
    assert!(outcome.image.processed);
    assert_eq!(outcome.detections.len(), 1);

    Ok(())
}

#[tokio::test]
async fn alert_write_failure_keeps_the_detection() -> anyhow::Result<()> {
    let detector = Arc::new(
        MockDetector::new(model_info()).with_detections(vec![raw_detection("truck", 0.875)]),
    );
    let (pipeline, pool, _dir) = make_pipeline(detector, DetectorConfig::default()).await;

    // Sabotage alert persistence only
    sqlx::query("DROP TABLE alerts").execute(&*pool).await?;

    let outcome = pipeline.process_upload("scene.png", &test_png_bytes()).await?;

    assert!(outcome.image.processed);
    assert_eq!(outcome.detections.len(), 1);
    assert!(outcome.alerts.is_empty());
    assert_eq!(DetectionsRepository::new(pool.clone()).count(None).await?, 1);

    Ok(())
}

#[tokio::test]
async fn degenerate_bounding_box_is_dropped_without_sinking_the_run() -> anyhow::Result<()> {
    let inverted = RawDetection {
        class_name: "truck".to_string(),
        confidence: 0.9,
        x_min: 80.0,
        y_min: 30.0,
        x_max: 20.0,
        y_max: 90.0,
    };
    let detector = Arc::new(
        MockDetector::new(model_info())
            .with_detections(vec![inverted, raw_detection("warehouse", 0.8)]),
    );
    let (pipeline, pool, _dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let outcome = pipeline.process_upload("scene.png", &test_png_bytes()).await?;

    assert!(outcome.image.processed);
    assert_eq!(outcome.detections.len(), 1);
    assert_eq!(outcome.detections[0].class_name, "warehouse");
    assert_eq!(DetectionsRepository::new(pool.clone()).count(None).await?, 1);

    Ok(())
}

#[tokio::test]
async fn delete_image_removes_rows_and_files() -> anyhow::Result<()> {
    let detector = Arc::new(
        MockDetector::new(model_info()).with_detections(vec![raw_detection("truck", 0.92)]),
    );
    let (pipeline, pool, dir) = make_pipeline(detector, DetectorConfig::default()).await;

    let outcome = pipeline.process_upload("scene.png", &test_png_bytes()).await?;
    let annotated = outcome
        .annotated_image
        .clone()
        .expect("annotated image should be rendered");
    let uploaded = dir.path().join("uploads").join(&outcome.image.filename);
    let rendered = dir.path().join("results").join(&annotated);
    assert!(uploaded.is_file());
    assert!(rendered.is_file());

    let deleted = pipeline.delete_image(&outcome.image.id).await?;
    assert!(deleted.is_some());

    assert_eq!(ImagesRepository::new(pool.clone()).count().await?, 0);
    assert_eq!(DetectionsRepository::new(pool.clone()).count(None).await?, 0);
    assert_eq!(AlertsRepository::new(pool.clone()).count(None, None).await?, 0);
    assert!(!uploaded.exists());
    assert!(!rendered.exists());

    // Deleting again finds nothing
    assert!(pipeline.delete_image(&outcome.image.id).await?.is_none());

    Ok(())
}
