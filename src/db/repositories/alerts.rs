use crate::db::models::alert_models::{Alert, Severity};
use crate::db::repositories::{clamp_page, page_count, page_offset, Paginated};
use crate::error::Error;
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

const ALERT_COLUMNS: &str =
    "id, detection_id, alert_type, message, severity, alert_timestamp, acknowledged, acknowledged_timestamp";

/// Alerts repository for handling alert operations
#[derive(Clone)]
pub struct AlertsRepository {
    pool: Arc<SqlitePool>,
}

impl AlertsRepository {
    /// Create a new alerts repository
    pub fn new(pool: Arc<SqlitePool>) -> Self {
        Self { pool }
    }

    /// Create a new alert
    pub async fn create(&self, alert: &Alert) -> Result<Alert> {
        let result = sqlx::query_as::<_, Alert>(&format!(
            r#"
            INSERT INTO alerts (
                id, detection_id, alert_type, message, severity, alert_timestamp, acknowledged, acknowledged_timestamp
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(alert.id)
        .bind(alert.detection_id)
        .bind(&alert.alert_type)
        .bind(&alert.message)
        .bind(alert.severity)
        .bind(alert.alert_timestamp)
        .bind(alert.acknowledged)
        .bind(alert.acknowledged_timestamp)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to create alert: {}", e)))?;

        Ok(result)
    }

    /// Get alert by ID
    pub async fn get_by_id(&self, id: &Uuid) -> Result<Option<Alert>> {
        let result = sqlx::query_as::<_, Alert>(&format!(
            r#"
            SELECT {}
            FROM alerts
            WHERE id = ?
            "#,
            ALERT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get alert by ID: {}", e)))?;

        Ok(result)
    }

    /// Get the alerts belonging to an image's detections
    pub async fn get_by_image(&self, image_id: &Uuid) -> Result<Vec<Alert>> {
        let result = sqlx::query_as::<_, Alert>(
            r#"
            SELECT a.id, a.detection_id, a.alert_type, a.message, a.severity,
                   a.alert_timestamp, a.acknowledged, a.acknowledged_timestamp
            FROM alerts a
            JOIN detections d ON a.detection_id = d.id
            WHERE d.image_id = ?
            ORDER BY a.alert_timestamp ASC
            "#,
        )
        .bind(image_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to get alerts for image: {}", e)))?;

        Ok(result)
    }

    /// List alerts newest-first, paginated, with optional severity and
    /// acknowledged filters
    pub async fn list(
        &self,
        page: Option<i64>,
        per_page: Option<i64>,
        severity: Option<Severity>,
        acknowledged: Option<bool>,
    ) -> Result<Paginated<Alert>> {
        let (page, per_page) = clamp_page(page, per_page, 20);
        let total = self.count(severity, acknowledged).await?;

        let mut sql = format!("SELECT {} FROM alerts{}", ALERT_COLUMNS, filter_clause(severity, acknowledged));
        sql.push_str(" ORDER BY alert_timestamp DESC");
        sql.push_str(&format!(" LIMIT {} OFFSET {}", per_page, page_offset(page, per_page)));

        let mut query = sqlx::query_as::<_, Alert>(&sql);
        if let Some(severity) = severity {
            query = query.bind(severity);
        }

        let items = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to list alerts: {}", e)))?;

        Ok(Paginated {
            items,
            total,
            pages: page_count(total, per_page),
            current_page: page,
            per_page,
        })
    }

    /// Alert count under the same filters as list
    pub async fn count(&self, severity: Option<Severity>, acknowledged: Option<bool>) -> Result<i64> {
        let sql = format!("SELECT COUNT(*) FROM alerts{}", filter_clause(severity, acknowledged));

        let mut query = sqlx::query_scalar::<_, i64>(&sql);
        if let Some(severity) = severity {
            query = query.bind(severity);
        }

        let count = query
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| Error::Database(format!("Failed to count alerts: {}", e)))?;

        Ok(count)
    }

    /// Acknowledge an alert. Sets the flag and overwrites the
    /// acknowledged timestamp on every call, including repeats.
    pub async fn acknowledge(&self, id: &Uuid) -> Result<Option<Alert>> {
        let result = sqlx::query_as::<_, Alert>(&format!(
            r#"
            UPDATE alerts
            SET acknowledged = 1, acknowledged_timestamp = ?
            WHERE id = ?
            RETURNING {}
            "#,
            ALERT_COLUMNS
        ))
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to acknowledge alert: {}", e)))?;

        Ok(result)
    }

    /// Count of alerts not yet acknowledged
    pub async fn unacknowledged_count(&self) -> Result<i64> {
        self.count(None, Some(false)).await
    }

    /// Alert frequency per severity tier
    pub async fn severity_counts(&self) -> Result<Vec<(String, i64)>> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT severity, COUNT(*)
            FROM alerts
            GROUP BY severity
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| Error::Database(format!("Failed to count alerts by severity: {}", e)))?;

        Ok(counts)
    }
}

/// WHERE clause shared by list and count. The severity value is bound by
/// the caller; acknowledged is a plain flag comparison.
fn filter_clause(severity: Option<Severity>, acknowledged: Option<bool>) -> String {
    let mut clause = String::from(" WHERE 1=1");
    if severity.is_some() {
        clause.push_str(" AND severity = ?");
    }
    if let Some(acknowledged) = acknowledged {
        clause.push_str(&format!(" AND acknowledged = {}", if acknowledged { 1 } else { 0 }));
    }
    clause
}
