use crate::config::{ApiConfig, StorageConfig};
use crate::detector::Detector;
use crate::error::Error;
use crate::pipeline::DetectionPipeline;
use anyhow::Result;
use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

pub mod alert_controller;
pub mod detection_controller;
pub mod image_controller;
pub mod stats_controller;
pub mod upload_controller;

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: Arc<SqlitePool>,
    pub pipeline: Arc<DetectionPipeline>,
    pub detector: Arc<dyn Detector>,
    pub storage: StorageConfig,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Error body carries a single human-readable field; the status code
/// travels out of band.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip)]
    pub status: u16,
}

impl ApiError {
    pub fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            status: status.as_u16(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        match err {
            Error::Validation(_) => ApiError {
                error: err.to_string(),
                status: StatusCode::BAD_REQUEST.as_u16(),
            },
            Error::NotFound(_) => ApiError {
                error: err.to_string(),
                status: StatusCode::NOT_FOUND.as_u16(),
            },
            Error::AlreadyProcessing(_) => ApiError {
                error: err.to_string(),
                status: StatusCode::CONFLICT.as_u16(),
            },
            Error::Detection(_) | Error::Database(_) | Error::Io(_) => ApiError {
                error: err.to_string(),
                status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            },
            _ => ApiError {
                error: err.to_string(),
                status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            },
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        if let Some(err) = err.downcast_ref::<Error>() {
            return err.clone().into();
        }

        ApiError {
            error: err.to_string(),
            status: StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
        }
    }
}

/// Implement IntoResponse for ApiError
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = Json(self);
        (status, body).into_response()
    }
}

/// Assemble the full API router over the shared state. Kept separate
/// from RestApi so tests can drive the router directly.
pub fn build_router(state: AppState) -> Router {
    // Requests a bit over the validator cap still reach the validator's
    // clearer message; anything grossly larger dies in the extractor.
    let body_limit = state.storage.max_upload_bytes() as usize + 1024 * 1024;

    // CORS layer that allows all origins and preflight requests
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_credentials(false)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/model-info", get(model_info))
        .merge(upload_controller::create_router())
        .merge(image_controller::create_router())
        .merge(detection_controller::create_router())
        .merge(alert_controller::create_router())
        .merge(stats_controller::create_router())
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
        .layer(cors)
}

pub struct RestApi {
    config: ApiConfig,
    state: AppState,
}

impl RestApi {
    pub fn new(
        config: &ApiConfig,
        db_pool: Arc<SqlitePool>,
        pipeline: Arc<DetectionPipeline>,
        detector: Arc<dyn Detector>,
        storage: &StorageConfig,
    ) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
            state: AppState {
                db_pool,
                pipeline,
                detector,
                storage: storage.clone(),
            },
        })
    }

    /// Serve until ctrl-c
    pub async fn run(&self) -> Result<()> {
        let app = build_router(self.state.clone());

        let addr = self.config.address.clone() + ":" + &self.config.port.to_string();
        let addr: SocketAddr = addr.parse()?;

        info!("API server listening on {}", addr);

        let listener = TcpListener::bind(addr).await?;

        axum::Server::from_tcp(listener.into_std()?)?
            .serve(app.into_make_service())
            .with_graceful_shutdown(async {
                let _ = tokio::signal::ctrl_c().await;
                info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub model_path: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: Utc::now(),
        model_path: state.detector.model_info().model_path,
    })
}

#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_path: String,
    pub classes: Vec<String>,
    pub num_classes: usize,
}

async fn model_info(State(state): State<AppState>) -> Json<ModelInfoResponse> {
    let info = state.detector.model_info();
    Json(ModelInfoResponse {
        num_classes: info.classes.len(),
        model_path: info.model_path,
        classes: info.classes,
    })
}
