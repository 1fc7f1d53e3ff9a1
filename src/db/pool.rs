use crate::config::DatabaseConfig;
use crate::types::AppResult;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Open the history database, creating the file and running migrations
pub async fn create_pool(config: &DatabaseConfig) -> AppResult<SqlitePool> {
    if let Some(parent) = database_file(&config.url).and_then(|p| p.parent()) {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await?;

    info!("Running database migrations...");
    MIGRATOR.run(&pool).await?;
    info!("Database migrations completed");

    Ok(pool)
}

/// Private in-memory database with the schema applied
pub async fn create_memory_pool() -> AppResult<SqlitePool> {
    // one connection: every in-memory connection is a separate database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true))
        .await?;
    MIGRATOR.run(&pool).await?;
    Ok(pool)
}

pub async fn health_check(pool: &SqlitePool) -> AppResult<bool> {
    sqlx::query("SELECT 1").fetch_one(pool).await?;
    Ok(true)
}

/// Filesystem path of a `sqlite:` URL; `None` for in-memory databases
fn database_file(url: &str) -> Option<&Path> {
    let rest = url
        .strip_prefix("sqlite://")
        .or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        None
    } else {
        Some(Path::new(path))
    }
}
