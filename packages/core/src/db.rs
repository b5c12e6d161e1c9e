//! Connection pool construction and schema migrations.
//!
//! `create_pool` is the single entry point used by `main.rs` and by every
//! test: it opens the pool and applies the embedded `migrations/` before
//! returning, so callers always see the current schema.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use crate::error::AppError;

const MAX_CONNECTIONS: u32 = 5;

/// Open a pool for `database_url` and run pending migrations.
///
/// In-memory databases are private to one connection, so the pool is
/// pinned to a single connection for them.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    let max_connections = if database_url.contains(":memory:") {
        1
    } else {
        MAX_CONNECTIONS
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::debug!("Database pool ready ({} max connections)", max_connections);
    Ok(pool)
}
