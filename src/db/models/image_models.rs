use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use uuid::Uuid;

/// Uploaded image record
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Image {
    pub id: Uuid,
    /// Stored (collision-resistant) filename, unique per upload
    pub filename: String,
    /// Filename as declared by the uploader
    pub original_filename: String,
    pub upload_timestamp: DateTime<Utc>,
    pub file_size: i64,
    /// Absolute location of the stored original; not exposed over the API
    #[serde(skip_serializing)]
    pub file_path: String,
    pub processed: bool,
}

impl Image {
    pub fn new(filename: String, original_filename: String, file_path: &Path, file_size: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            filename,
            original_filename,
            upload_timestamp: Utc::now(),
            file_size,
            file_path: file_path.to_string_lossy().to_string(),
            processed: false,
        }
    }
}

/// Image record plus its detection count, as returned by listings
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ImageSummary {
    pub id: Uuid,
    pub filename: String,
    pub original_filename: String,
    pub upload_timestamp: DateTime<Utc>,
    pub file_size: i64,
    pub processed: bool,
    pub detection_count: i64,
}
