use crate::api::rest::{ApiResult, AppState};
use crate::db::repositories::alerts::AlertsRepository;
use crate::db::repositories::detections::DetectionsRepository;
use crate::db::repositories::images::ImagesRepository;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Create statistics controller router with AppState
pub fn create_router() -> Router<AppState> {
    Router::new().route("/api/statistics", get(get_statistics))
}

/// Aggregate counts over everything stored so far
#[derive(Debug, Serialize)]
pub struct StatisticsResponse {
    pub total_images: i64,
    pub total_detections: i64,
    pub total_alerts: i64,
    pub unacknowledged_alerts: i64,
    /// Detection frequency per class label
    pub class_statistics: HashMap<String, i64>,
    /// Alert frequency per severity tier
    pub severity_statistics: HashMap<String, i64>,
}

pub async fn get_statistics(State(state): State<AppState>) -> ApiResult<Json<StatisticsResponse>> {
    let images = ImagesRepository::new(Arc::clone(&state.db_pool));
    let detections = DetectionsRepository::new(Arc::clone(&state.db_pool));
    let alerts = AlertsRepository::new(Arc::clone(&state.db_pool));

    Ok(Json(StatisticsResponse {
        total_images: images.count().await?,
        total_detections: detections.count(None).await?,
        total_alerts: alerts.count(None, None).await?,
        unacknowledged_alerts: alerts.unacknowledged_count().await?,
        class_statistics: detections.class_counts().await?.into_iter().collect(),
        severity_statistics: alerts.severity_counts().await?.into_iter().collect(),
    }))
}
