use crate::db::models::detection_models::{Detection, DetectionRow};
use crate::db::repositories::{clamp_page, page_count, page_offset, Paginated};
use crate::error::Error;
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const DETECTION_COLUMNS: &str =
    "id, image_id, class_name, confidence, x_min, y_min, x_max, y_max, detection_timestamp";

/// Detections repository for handling stored detection results
#[derive(Clone)]
pub struct DetectionsRepository {
    pool: Arc<SqlitePool>,
}

impl DetectionsRepository {
    /// Create a new detections repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create a new detection record
    pub async fn create(&self, detection: &Detection) -> Result<Detection> {
        let result = sqlx::query_as::<_, DetectionRow>(&format!(
            r#"
            INSERT INTO detections (
                id, image_id, class_name, confidence, x_min, y_min, x_max, y_max, detection_timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            DETECTION_COLUMNS
        ))
        .bind(detection.id)
        .bind(detection.image_id)
        .bind(&detection.class_name)
        .bind(detection.confidence)
        .bind(detection.bounding_box.x_min)
        .bind(detection.bounding_box.y_min)
        .bind(detection.bounding_box.x_max)
        .bind(detection.bounding_box.y_max)
        .bind(detection.detection_timestamp)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create detection: {}", e)))?;

        Ok(result.into())
    }

    /// Get all detections for an image, in detection order
    pub async fn get_by_image(&self, image_id: &Uuid) -> Result<Vec<Detection>> {
        let rows = sqlx::query_as::<_, DetectionRow>(&format!(
            r#"
            SELECT {}
            FROM detections
            WHERE image_id = ?
            ORDER BY detection_timestamp ASC
            "#,
            DETECTION_COLUMNS
        ))
        .bind(image_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get detections for image: {}", e)))?;

        Ok(rows.into_iter().map(Detection::from).collect())
    }

    /// List detections newest-first, paginated, optionally filtered by class
    pub async fn list(
        &self,
        page: Option<i64>,
        per_page: Option<i64>,
        class_name: Option<&str>,
    ) -> Result<Paginated<Detection>> {
        let (page, per_page) = clamp_page(page, per_page, 20);
        let total = self.count(class_name).await?;

        let mut sql = format!("SELECT {} FROM detections WHERE 1=1", DETECTION_COLUMNS);
        if class_name.is_some() {
            sql.push_str(" AND class_name = ?");
        }
        sql.push_str(" ORDER BY detection_timestamp DESC");
        sql.push_str(&format!(" LIMIT {} OFFSET {}", per_page, page_offset(page, per_page)));

        let mut query = sqlx::query_as::<_, DetectionRow>(&sql);
        if let Some(class_name) = class_name {
            query = query.bind(class_name);
        }

        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list detections: {}", e)))?;

        Ok(Paginated {
            items: rows.into_iter().map(Detection::from).collect(),
            total,
            pages: page_count(total, per_page),
            current_page: page,
            per_page,
        })
    }

    /// Total detection count, optionally restricted to one class
    pub async fn count(&self, class_name: Option<&str>) -> Result<i64> {
        let mut sql = String::from("SELECT COUNT(*) FROM detections WHERE 1=1");
        if class_name.is_some() {
            sql.push_str(" AND class_name = ?");
        }

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(class_name) = class_name {
            query = query.bind(class_name);
        }

        let count = query
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count detections: {}", e)))?;

        Ok(count)
    }

    /// Detection frequency per class label
    pub async fn class_counts(&self) -> Result<Vec<(String, i64)>> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT class_name, COUNT(*)
            FROM detections
            GROUP BY class_name
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count detections by class: {}", e)))?;

        Ok(counts)
    }
}
