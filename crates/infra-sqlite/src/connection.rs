// SQLite Connection Pool Setup

use crate::error::map_sqlx_error;
use porter_core::error::{AppError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_CONNECTIONS: u32 = 10;

/// Create the state database pool: WAL mode, busy timeout, created if missing.
///
/// An in-memory URL gets a single long-lived connection, since every
/// connection to `:memory:` would otherwise see its own empty database.
pub async fn create_pool(database_url: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(map_sqlx_error)?
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT)
        .create_if_missing(true);

    let in_memory = database_url.contains(":memory:");
    let mut pool_options = SqlitePoolOptions::new();
    pool_options = if in_memory {
        pool_options
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    } else {
        pool_options.max_connections(MAX_CONNECTIONS)
    };

    let pool = pool_options
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)?;

    debug!(url = %database_url, in_memory = in_memory, "State database pool ready");
    Ok(pool)
}

/// Open the external catalogue database. Read-only, never created or migrated.
pub async fn open_catalog_pool(path: &Path) -> Result<SqlitePool> {
    if !path.is_file() {
        return Err(AppError::NotFound(format!(
            "Catalogue database not found at {}",
            path.display()
        )));
    }

    let options = SqliteConnectOptions::new()
        .filename(path)
        .read_only(true)
        .busy_timeout(BUSY_TIMEOUT);

    SqlitePoolOptions::new()
        .max_connections(2)
        .connect_with(options)
        .await
        .map_err(map_sqlx_error)
}

/// Writable pool on a fresh file in rollback-journal mode, for building
/// catalogue fixtures that are then reopened read-only
#[cfg(test)]
pub(crate) async fn fixture_pool(path: &Path) -> SqlitePool {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .journal_mode(SqliteJournalMode::Delete)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .unwrap()
}
