use crate::error::Error;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

/// Upload extensions accepted by the ingestion validator
pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "bmp"];

static UNSAFE_CHARS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());
static LEADING_JUNK: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[._-]+").unwrap());

/// Accept or reject an upload before anything is written. Checks run in
/// order: filename present, extension allowed, size within the cap.
pub fn validate_upload(original_filename: &str, size: u64, max_bytes: u64) -> Result<(), Error> {
    if original_filename.trim().is_empty() {
        return Err(Error::Validation("No file selected".to_string()));
    }

    if !has_allowed_extension(original_filename) {
        return Err(Error::Validation(format!(
            "File type not allowed. Accepted types: {}",
            ALLOWED_EXTENSIONS.join(", ")
        )));
    }

    if size == 0 {
        return Err(Error::Validation("Uploaded file is empty".to_string()));
    }

    if size > max_bytes {
        return Err(Error::Validation(format!(
            "File too large: {} bytes exceeds the {} byte limit",
            size, max_bytes
        )));
    }

    Ok(())
}

/// Extension check on the last dot-separated segment, case-insensitive.
/// Dotfiles like ".png" count as having an extension.
pub fn has_allowed_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| {
            let ext = ext.to_ascii_lowercase();
            ALLOWED_EXTENSIONS.iter().any(|allowed| *allowed == ext)
        })
        .unwrap_or(false)
}

/// Strip a declared filename down to filesystem-safe characters. Path
/// separators and anything else unexpected collapse to underscores;
/// leading dots and dashes are dropped.
pub fn sanitize_filename(filename: &str) -> String {
    let safe = UNSAFE_CHARS.replace_all(filename, "_");
    let safe = LEADING_JUNK.replace(&safe, "");
    safe.to_string()
}

/// Collision-resistant stored name: microsecond timestamp prefix plus the
/// sanitized original name.
pub fn stored_filename(original_filename: &str, now: DateTime<Utc>) -> String {
    format!("{}_{}", now.timestamp_micros(), sanitize_filename(original_filename))
}
