pub mod api;
pub mod config;
pub mod db;
pub mod detector;
pub mod error;
pub mod pipeline;

pub use error::Error;
