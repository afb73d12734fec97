use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::models::detection_models::Detection;

/// Alert type tag for alerts synthesized by the detection pipeline
pub const ALERT_TYPE_OBJECT_DETECTED: &str = "object_detected";

/// Severity tier derived from detection confidence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    /// Boundary values 0.7 and 0.9 fall into the lower tier
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence > 0.9 {
            Severity::High
        } else if confidence > 0.7 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl sqlx::Type<sqlx::Sqlite> for Severity {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <&str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for Severity {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>> {
        <String as sqlx::Encode<'q, sqlx::Sqlite>>::encode(self.to_string(), buf)
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for Severity {
    fn decode(
        value: sqlx::sqlite::SqliteValueRef<'r>,
    ) -> Result<Self, Box<dyn std::error::Error + Send + Sync + 'static>> {
        let text = <String as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        match text.as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            other => Err(format!("Invalid severity value: {}", other).into()),
        }
    }
}

/// Alert model
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Alert {
    pub id: Uuid,
    pub detection_id: Uuid,
    pub alert_type: String,
    pub message: String,
    pub severity: Severity,
    pub alert_timestamp: DateTime<Utc>,
    pub acknowledged: bool,
    pub acknowledged_timestamp: Option<DateTime<Utc>>,
}

impl Alert {
    /// Synthesize the alert for a freshly stored detection. Exactly one
    /// alert is created per detection, with no cross-detection
    /// deduplication.
    pub fn for_detection(detection: &Detection, original_filename: &str) -> Self {
        let message = format!(
            "{} detected in {} with {:.2}% confidence",
            detection.class_name.to_uppercase(),
            original_filename,
            detection.confidence * 100.0
        );

        Self {
            id: Uuid::new_v4(),
            detection_id: detection.id,
            alert_type: ALERT_TYPE_OBJECT_DETECTED.to_string(),
            message,
            severity: Severity::from_confidence(detection.confidence),
            alert_timestamp: Utc::now(),
            acknowledged: false,
            acknowledged_timestamp: None,
        }
    }
}
