use crate::api::rest::{ApiError, ApiResult, AppState};
use crate::db::models::alert_models::Alert;
use crate::db::models::detection_models::Detection;
use crate::pipeline::validate;
use axum::body::StreamBody;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use tokio_util::io::ReaderStream;
use uuid::Uuid;

/// Create upload controller router with AppState
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/upload", post(upload_image))
        .route("/api/results/:filename", get(get_result_image))
}

/// Response for a fully processed upload
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub success: bool,
    pub image_id: Uuid,
    pub filename: String,
    pub detections_count: usize,
    pub detections: Vec<Detection>,
    pub alerts: Vec<Alert>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotated_image: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Accept a multipart upload (field `image`) and run it through the
/// detection pipeline, blocking until detections and alerts are stored.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let mut upload = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?
    {
        if field.name() == Some("image") {
            let filename = field.file_name().unwrap_or_default().to_string();
            let data = field
                .bytes()
                .await
                .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;
            upload = Some((filename, data));
            break;
        }
    }

    let (filename, data) = upload.ok_or_else(|| ApiError::bad_request("No image provided"))?;

    let outcome = state.pipeline.process_upload(&filename, &data).await?;

    info!(
        "Upload {} processed: {} detections, {} alerts",
        outcome.image.id,
        outcome.detections.len(),
        outcome.alerts.len()
    );

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            success: true,
            image_id: outcome.image.id,
            filename: outcome.image.filename,
            detections_count: outcome.detections.len(),
            detections: outcome.detections,
            alerts: outcome.alerts,
            annotated_image: outcome.annotated_image,
            timestamp: Utc::now(),
        }),
    ))
}

/// Stream an annotated result image. The requested name is sanitized
/// before touching the filesystem.
pub async fn get_result_image(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Response {
    let safe_name = validate::sanitize_filename(&filename);
    let path = state.storage.results_dir.join(&safe_name);

    match tokio::fs::File::open(&path).await {
        Ok(file) => {
            let stream = ReaderStream::new(file);
            let body = StreamBody::new(stream);

            let content_type = match path.extension().and_then(|e| e.to_str()) {
                Some("jpg") | Some("jpeg") => "image/jpeg",
                Some("png") => "image/png",
                Some("gif") => "image/gif",
                Some("bmp") => "image/bmp",
                _ => "application/octet-stream",
            };

            let headers = HeaderMap::from_iter([
                (header::CONTENT_TYPE, content_type.parse().unwrap()),
                (header::CACHE_CONTROL, "max-age=3600".parse().unwrap()),
            ]);

            (StatusCode::OK, headers, body).into_response()
        }
        Err(_) => ApiError::not_found(format!("Result image not found: {}", filename)).into_response(),
    }
}
