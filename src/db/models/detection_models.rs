use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Axis-aligned box in source-image pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Finite coordinates with positive extent on both axes
    pub fn is_valid(&self) -> bool {
        [self.x_min, self.y_min, self.x_max, self.y_max]
            .iter()
            .all(|v| v.is_finite())
            && self.x_min < self.x_max
            && self.y_min < self.y_max
    }
}

/// One classification result for an image; immutable once stored
#[derive(Debug, Clone, Serialize)]
pub struct Detection {
    pub id: Uuid,
    pub image_id: Uuid,
    pub class_name: String,
    #[serde(serialize_with = "round4")]
    pub confidence: f64,
    pub bounding_box: BoundingBox,
    pub detection_timestamp: DateTime<Utc>,
}

impl Detection {
    pub fn new(image_id: Uuid, class_name: String, confidence: f64, bounding_box: BoundingBox) -> Self {
        Self {
            id: Uuid::new_v4(),
            image_id,
            class_name,
            confidence,
            bounding_box,
            detection_timestamp: Utc::now(),
        }
    }
}

/// Database representation with flattened box columns
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DetectionRow {
    pub id: Uuid,
    pub image_id: Uuid,
    pub class_name: String,
    pub confidence: f64,
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
    pub detection_timestamp: DateTime<Utc>,
}

impl From<DetectionRow> for Detection {
    fn from(row: DetectionRow) -> Self {
        Self {
            id: row.id,
            image_id: row.image_id,
            class_name: row.class_name,
            confidence: row.confidence,
            bounding_box: BoundingBox {
                x_min: row.x_min,
                y_min: row.y_min,
                x_max: row.x_max,
                y_max: row.y_max,
            },
            detection_timestamp: row.detection_timestamp,
        }
    }
}

// Confidence is stored at full precision and rounded only for display.
fn round4<S>(value: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_f64((value * 10_000.0).round() / 10_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounding_box_validity() {
        let good = BoundingBox { x_min: 10.0, y_min: 20.0, x_max: 110.0, y_max: 90.0 };
        assert!(good.is_valid());

        let inverted = BoundingBox { x_min: 110.0, y_min: 20.0, x_max: 10.0, y_max: 90.0 };
        assert!(!inverted.is_valid());

        let flat = BoundingBox { x_min: 10.0, y_min: 20.0, x_max: 10.0, y_max: 90.0 };
        assert!(!flat.is_valid());

        let nan = BoundingBox { x_min: f64::NAN, y_min: 20.0, x_max: 10.0, y_max: 90.0 };
        assert!(!nan.is_valid());
    }

    #[test]
    fn confidence_serializes_rounded() {
        let detection = Detection::new(
            Uuid::new_v4(),
            "truck".to_string(),
            0.123456789,
            BoundingBox { x_min: 0.0, y_min: 0.0, x_max: 1.0, y_max: 1.0 },
        );
        let json = serde_json::to_value(&detection).unwrap();
        assert_eq!(json["confidence"], serde_json::json!(0.1235));
        assert_eq!(json["bounding_box"]["x_max"], serde_json::json!(1.0));
    }
}
