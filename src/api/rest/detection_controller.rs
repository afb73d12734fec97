use crate::api::rest::{ApiResult, AppState};
use crate::db::models::detection_models::Detection;
use crate::db::repositories::detections::DetectionsRepository;
use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Create detection controller router with AppState
pub fn create_router() -> Router<AppState> {
    Router::new().route("/api/detections", get(list_detections))
}

/// Pagination and filter parameters for the detection listing
#[derive(Debug, Deserialize)]
pub struct ListDetectionsParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Restrict to one class label
    pub class: Option<String>,
}

/// Paginated detection listing, newest first
#[derive(Debug, Serialize)]
pub struct DetectionListResponse {
    pub detections: Vec<Detection>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
}

pub async fn list_detections(
    State(state): State<AppState>,
    Query(params): Query<ListDetectionsParams>,
) -> ApiResult<Json<DetectionListResponse>> {
    let repo = DetectionsRepository::new(Arc::clone(&state.db_pool));
    let page = repo
        .list(params.page, params.per_page, params.class.as_deref())
        .await?;

    Ok(Json(DetectionListResponse {
        detections: page.items,
        total: page.total,
        pages: page.pages,
        current_page: page.current_page,
    }))
}
