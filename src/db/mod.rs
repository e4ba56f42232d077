use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use crate::config::DatabaseConfig;
use anyhow::Result;

pub use operations::*;
pub use pool::*;

pub mod pool;
pub mod operations;

pub async fn create_pool(config: &DatabaseConfig) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&config.url)?.create_if_missing(true);

    // Every connection to `:memory:` is its own database, so pin to one.
    let in_memory = config.url.contains(":memory:");
    let mut pool_options = SqlitePoolOptions::new();
    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
    } else {
        pool_options
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
    };

    let pool = pool_options.connect_with(options).await?;

    // Test connection
    health_check(&pool).await?;

    Ok(pool)
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))
}

/// In-memory database with the schema applied.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let pool = create_pool(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        max_connections: 1,
        min_connections: 1,
    })
    .await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
