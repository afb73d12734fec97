use anyhow::{Context, Result};
use log::info;
use sqlx::{Executor, SqlitePool};

/// Migrations embedded in apply order. Table creation first, indexes
/// last, matching the file numbering.
const MIGRATIONS: &[(&str, &str)] = &[
    ("001_create_images.sql", include_str!("sql/001_create_images.sql")),
    ("002_create_detections.sql", include_str!("sql/002_create_detections.sql")),
    ("003_create_alerts.sql", include_str!("sql/003_create_alerts.sql")),
    ("add_indexes.sql", include_str!("sql/add_indexes.sql")),
];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for (name, sql) in MIGRATIONS {
        pool.execute(*sql)
            .await
            .context(format!("Failed to apply migration: {}", name))?;
        info!("Applied migration: {}", name);
    }

    Ok(())
}
