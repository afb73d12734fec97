use crate::db::models::image_models::{Image, ImageSummary};
use crate::db::repositories::{clamp_page, page_count, page_offset, Paginated};
use crate::error::Error;
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Images repository for handling uploaded image records
#[derive(Clone)]
pub struct ImagesRepository {
    pool: Arc<SqlitePool>,
}

impl ImagesRepository {
    /// Create a new images repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create a new image record
    pub async fn create(&self, image: &Image) -> Result<Image> {
        let result = sqlx::query_as::<_, Image>(
            r#"
            INSERT INTO images (
                id, filename, original_filename, upload_timestamp, file_size, file_path, processed
            )
            VALUES (?, ?, ?, ?, ?, ?, ?)
            RETURNING id, filename, original_filename, upload_timestamp, file_size, file_path, processed
            "#,
        )
        .bind(image.id)
        .bind(&image.filename)
        .bind(&image.original_filename)
        .bind(image.upload_timestamp)
        .bind(image.file_size)
        .bind(&image.file_path)
        .bind(image.processed)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create image: {}", e)))?;

        Ok(result)
    }

    /// Get image by ID
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<Image>> {
        let result = sqlx::query_as::<_, Image>(
            r#"
            SELECT id, filename, original_filename, upload_timestamp, file_size, file_path, processed
            FROM images
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get image by ID: {}", e)))?;

        Ok(result)
    }

    /// Get an image summary (record plus detection count) by ID
    pub async fn get_summary(&self, id: &Uuid) -> Result<Option<ImageSummary>> {
        let result = sqlx::query_as::<_, ImageSummary>(
            r#"
            SELECT i.id, i.filename, i.original_filename, i.upload_timestamp, i.file_size, i.processed,
                   COUNT(d.id) AS detection_count
            FROM images i
            LEFT JOIN detections d ON d.image_id = i.id
            WHERE i.id = ?
            GROUP BY i.id
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get image summary: {}", e)))?;

        Ok(result)
    }

    /// List image summaries in upload order, paginated
    pub async fn list(&self, page: Option<i64>, per_page: Option<i64>) -> Result<Paginated<ImageSummary>> {
        let (page, per_page) = clamp_page(page, per_page, 10);
        let total = self.count().await?;

        let items = sqlx::query_as::<_, ImageSummary>(&format!(
            r#"
            SELECT i.id, i.filename, i.original_filename, i.upload_timestamp, i.file_size, i.processed,
                   COUNT(d.id) AS detection_count
            FROM images i
            LEFT JOIN detections d ON d.image_id = i.id
            GROUP BY i.id
            ORDER BY i.upload_timestamp ASC
            LIMIT {} OFFSET {}
            "#,
            per_page,
            page_offset(page, per_page)
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to list images: {}", e)))?;

        Ok(Paginated {
            items,
            total,
            pages: page_count(total, per_page),
            current_page: page,
            per_page,
        })
    }

    /// Flip the processed flag, once. Returns false when the image was
    /// already processed or does not exist.
    pub async fn mark_processed(&self, id: &Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE images
            SET processed = 1
            WHERE id = ? AND processed = 0
            "#,
        )
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to mark image processed: {}", e)))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete an image with its detections and their alerts in one
    /// transaction (child rows first). Returns the deleted record so the
    /// caller can remove the stored files.
    pub async fn delete_cascade(&self, id: &Uuid) -> Result<Option<Image>> {
        let image = match self.get_by_id(id).await? {
            Some(image) => image,
            None => return Ok(None),
        };

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Error::Database(format!("Failed to begin delete transaction: {}", e)))?;

        sqlx::query(
            r#"
            DELETE FROM alerts
            WHERE detection_id IN (SELECT id FROM detections WHERE image_id = ?)
            "#,
        )
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Error::Database(format!("Failed to delete alerts for image: {}", e)))?;

        sqlx::query("DELETE FROM detections WHERE image_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete detections for image: {}", e)))?;

        sqlx::query("DELETE FROM images WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| Error::Database(format!("Failed to delete image: {}", e)))?;

        tx.commit()
            .await
            .map_err(|e| Error::Database(format!("Failed to commit delete transaction: {}", e)))?;

        Ok(Some(image))
    }

    /// Total image count
    pub async fn count(&self) -> Result<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM images")
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count images: {}", e)))?;

        Ok(count)
    }
}
