use crate::api::rest::{ApiError, ApiResult, AppState};
use crate::db::models::alert_models::{Alert, Severity};
use crate::db::repositories::alerts::AlertsRepository;
use axum::extract::{Path, Query, State};
use axum::routing::{get, put};
use axum::{Json, Router};
use log::info;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

/// Create alert controller router with AppState
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/api/alerts", get(list_alerts))
        .route("/api/alerts/:id/acknowledge", put(acknowledge_alert))
}

/// Pagination and filter parameters for the alert listing
#[derive(Debug, Deserialize)]
pub struct ListAlertsParams {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    /// Restrict to one severity tier
    pub severity: Option<Severity>,
    /// Restrict by acknowledged flag
    pub acknowledged: Option<bool>,
}

/// Paginated alert listing, newest first
#[derive(Debug, Serialize)]
pub struct AlertListResponse {
    pub alerts: Vec<Alert>,
    pub total: i64,
    pub pages: i64,
    pub current_page: i64,
}

/// Response for the acknowledge operation
#[derive(Debug, Serialize)]
pub struct AcknowledgeResponse {
    pub success: bool,
    pub alert: Alert,
}

pub async fn list_alerts(
    State(state): State<AppState>,
    Query(params): Query<ListAlertsParams>,
) -> ApiResult<Json<AlertListResponse>> {
    let repo = AlertsRepository::new(Arc::clone(&state.db_pool));
    let page = repo
        .list(params.page, params.per_page, params.severity, params.acknowledged)
        .await?;

    Ok(Json(AlertListResponse {
        alerts: page.items,
        total: page.total,
        pages: page.pages,
        current_page: page.current_page,
    }))
}

/// Acknowledge an alert. Every call sets the flag and refreshes the
/// acknowledged timestamp, repeats included.
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<AcknowledgeResponse>> {
    let repo = AlertsRepository::new(Arc::clone(&state.db_pool));
    let alert = repo
        .acknowledge(&id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Alert not found: {}", id)))?;

    info!("Alert {} acknowledged", id);

    Ok(Json(AcknowledgeResponse { success: true, alert }))
}
