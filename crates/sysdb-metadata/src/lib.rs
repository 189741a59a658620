//! SQLite persistence access layer for the SysDB metadata coordinator.

mod database_repository;
mod segment_repository;
mod store;
mod tenant_catalog;
mod util;

pub use database_repository::SqliteDatabaseRepository;
pub use segment_repository::SqliteSegmentRepository;
pub use store::{MetaStore, StoreFault};
pub use tenant_catalog::SqliteTenantCatalog;
pub use util::{create_sqlite_pool, run_migrations, PoolOptions};

/// Embedded SQL migrations for the metadata database.
pub const MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");
