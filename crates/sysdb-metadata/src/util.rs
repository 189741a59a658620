use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use sysdb_core::{CoreError, CoreResult};

use crate::MIGRATOR;

/// Connection pool sizing for the metadata store.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    /// How long a writer waits on a locked database before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_connections: 8,
            acquire_timeout: Duration::from_secs(5),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Creates a SQLite connection pool configured for metadata workloads.
pub async fn create_sqlite_pool(
    database_url: &str,
    options: PoolOptions,
) -> Result<SqlitePool, sqlx::Error> {
    let connect = database_url
        .parse::<SqliteConnectOptions>()?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(options.busy_timeout)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(options.max_connections)
        .acquire_timeout(options.acquire_timeout)
        .connect_with(connect)
        .await
}

/// Runs all outstanding migrations against the provided connection pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

/// Fixed-width RFC 3339 form, so stored timestamps compare correctly as text.
pub(crate) fn encode_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Epoch milliseconds. Orders correctly over the whole `DateTime` range.
pub(crate) fn encode_millis(time: &DateTime<Utc>) -> i64 {
    time.timestamp_millis()
}

pub(crate) fn decode_millis(column: &str, value: i64) -> CoreResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(value)
        .ok_or_else(|| CoreError::internal(format!("invalid {column}: {value} is out of range")))
}

pub(crate) fn decode_time(column: &str, value: &str) -> CoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| CoreError::internal(format!("invalid {column}: {err}")))
}
