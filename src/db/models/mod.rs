pub mod alert_models;
pub mod detection_models;
pub mod image_models;
