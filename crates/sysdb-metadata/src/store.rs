use sqlx::error::ErrorKind;
use sqlx::sqlite::SqliteRow;
use sqlx::{Decode, Row, Sqlite, SqlitePool, Transaction, Type};
use sysdb_core::{CoreError, CoreResult};

/// How a storage failure relates to the domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFault {
    /// A uniqueness constraint rejected the write.
    Conflict,
    /// The write referenced a row that does not exist.
    NotFound,
    /// Anything else, including constraint kinds we do not recognise.
    Other,
}

/// Shared handle on the backing store given to every access object.
///
/// Cloning is cheap; all clones share one connection pool.
#[derive(Clone, Debug)]
pub struct MetaStore {
    pool: SqlitePool,
}

impl MetaStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Opens a transaction scope. Dropping it without commit rolls back.
    pub async fn begin(&self) -> CoreResult<Transaction<'static, Sqlite>> {
        self.pool
            .begin()
            .await
            .map_err(|err| CoreError::internal(err.to_string()))
    }

    /// Classifies a driver error without inspecting raw SQLite codes.
    pub fn classify(err: &sqlx::Error) -> StoreFault {
        match err {
            sqlx::Error::Database(db_err) => match db_err.kind() {
                ErrorKind::UniqueViolation => StoreFault::Conflict,
                ErrorKind::ForeignKeyViolation => StoreFault::NotFound,
                _ => StoreFault::Other,
            },
            sqlx::Error::RowNotFound => StoreFault::NotFound,
            _ => StoreFault::Other,
        }
    }

    /// Maps a driver error onto the domain taxonomy for `entity`/`id`.
    pub fn map_error(entity: &'static str, id: impl Into<String>, err: sqlx::Error) -> CoreError {
        match Self::classify(&err) {
            StoreFault::Conflict => CoreError::already_exists(entity, id),
            StoreFault::NotFound => CoreError::not_found(entity, id),
            StoreFault::Other => CoreError::internal(err.to_string()),
        }
    }
}

pub(crate) fn internal(err: sqlx::Error) -> CoreError {
    CoreError::internal(err.to_string())
}

/// Reads a column, reporting decode failures instead of panicking.
pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> CoreResult<T>
where
    T: Decode<'r, Sqlite> + Type<Sqlite>,
{
    row.try_get(name)
        .map_err(|err| CoreError::internal(format!("column `{name}`: {err}")))
}
