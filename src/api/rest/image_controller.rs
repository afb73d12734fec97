use crate::api::rest::{ApiError, ApiResult, AppState};
use crate::db::models::alert_models::Alert;
use crate::db::models::detection_models::Detection;
use crate::db::models::image_models::ImageSummary;
use crate::db::repositories::alerts::AlertsRepository;
use crate::db::repositories::detections::DetectionsRepository;
use crate::db::repositories::images::ImagesRepository;
use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Create image controller router with AppState
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/images", get(list_images))
        .route("/api/images/:id", get(get_image).delete(delete_image))
}

/// Pagination parameters for the image listing
#[derive(Debug, Deserialize)]
pub struct ListImagesParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Paginated image listing
#[derive(Debug, Serialize)]
pub struct ImageListResponse {
    pub images: Vec<ImageSummary>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
    pub per_page: i64,
}

/// One image with its detections and their alerts
#[derive(Debug, Serialize)]
pub struct ImageDetailResponse {
    pub image: ImageSummary,
    pub detections: Vec<Detection>,
    pub alerts: Vec<Alert>,
}

/// Response for an administrative image delete
#[derive(Debug, Serialize)]
pub struct DeleteImageResponse {
    pub success: bool,
    pub image_id: Uuid,
}

pub async fn list_images(
    State(state): State<AppState>,
    Query(params): Query<ListImagesParams>,
) -> ApiResult<Json<ImageListResponse>> {
    let repo = ImagesRepository::new(Arc::clone(&state.db_pool));
    let page = repo.list(params.page, params.per_page).await?;

    Ok(Json(ImageListResponse {
        images: page.items,
        total: page.total,
        pages: page.pages,
        current_page: page.current_page,
        per_page: page.per_page,
    }))
}

pub async fn get_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<ImageDetailResponse>> {
    let images = ImagesRepository::new(Arc::clone(&state.db_pool));
    let image = images
        .get_summary(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Image not found: {}", id)))?;

    let detections = DetectionsRepository::new(Arc::clone(&state.db_pool))
        .get_by_image(&id)
        .await?;
    let alerts = AlertsRepository::new(Arc::clone(&state.db_pool))
        .get_by_image(&id)
        .await?;

    Ok(Json(ImageDetailResponse {
        image,
        detections,
        alerts,
    }))
}

/// Remove an image with its detections, alerts and stored files
pub async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DeleteImageResponse>> {
    match state.pipeline.delete_image(&id).await? {
        Some(_) => Ok(Json(DeleteImageResponse {
            success: true,
            image_id: id,
        })),
        None => Err(ApiError::not_found(format!("Image not found: {}", id))),
    }
}
