use anyhow::Result;
use log::info;
use satwatch::api::rest::RestApi;
use satwatch::config;
use satwatch::db::DatabaseService;
use satwatch::detector;
use satwatch::pipeline::DetectionPipeline;
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Optional config file path as the single CLI argument
    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref())?;

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(&config.api.log_level),
    )
    .init();

    info!("Starting satellite imagery detection backend");

    // Storage areas for originals and annotated copies
    std::fs::create_dir_all(&config.storage.upload_dir)?;
    std::fs::create_dir_all(&config.storage.results_dir)?;

    let db = DatabaseService::new(&config.database).await?;

    let detector = detector::from_config(&config.detector)?;
    info!("Detector backend ready: {}", config.detector.backend);

    let pipeline = Arc::new(DetectionPipeline::new(
        db.pool.clone(),
        detector.clone(),
        &config.storage,
        &config.detector,
        &config.annotation,
    ));

    let api = RestApi::new(
        &config.api,
        db.pool.clone(),
        pipeline,
        detector.clone(),
        &config.storage,
    )?;
    api.run().await?;

    detector.shutdown().await?;
    info!("Shutdown complete");

    Ok(())
}
