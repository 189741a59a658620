use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Executor, Sqlite};
use sysdb_core::{CoreError, CoreResult, Database, DatabaseId, DatabaseState};

use crate::store::{column, internal, MetaStore, StoreFault};
use crate::util::{decode_millis, decode_time, encode_millis, encode_time};

/// SQLite-backed repository for logical databases.
pub struct SqliteDatabaseRepository {
    store: MetaStore,
}

impl SqliteDatabaseRepository {
    /// Creates a new repository on top of the shared store handle.
    pub fn new(store: MetaStore) -> Self {
        Self { store }
    }

    /// Returns the underlying store (useful for composing with other services).
    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    /// Inserts a database via the supplied executor.
    pub async fn insert_with_executor<'e, E>(executor: E, database: &Database) -> CoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let deleted_at = database.deleted_at.as_ref().map(encode_millis);

        query(
            r#"
            INSERT INTO databases (
                database_id,
                name,
                tenant_id,
                ts,
                state,
                deleted_at,
                created_at,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(database.id.to_bytes().to_vec())
        .bind(&database.name)
        .bind(&database.tenant)
        .bind(database.ts)
        .bind(database.state.as_str())
        .bind(deleted_at)
        .bind(encode_time(&database.created_at))
        .bind(encode_time(&database.updated_at))
        .execute(executor)
        .await
        .map(|_| ())
        .map_err(|err| match MetaStore::classify(&err) {
            StoreFault::Conflict => CoreError::already_exists(
                "database",
                format!("{}/{}", database.tenant, database.name),
            ),
            // The only reference on this table is the owning tenant.
            StoreFault::NotFound => CoreError::not_found("tenant", database.tenant.as_str()),
            StoreFault::Other => internal(err),
        })
    }

    /// Removes one soft-deleted row if it is still past the cutoff.
    async fn finalize_one<'e, E>(
        executor: E,
        database_id: &[u8],
        cutoff: i64,
    ) -> CoreResult<bool>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = query(
            r#"
            DELETE FROM databases
             WHERE database_id = ?1
               AND state = 'soft_deleted'
               AND deleted_at < ?2
            "#,
        )
        .bind(database_id)
        .bind(cutoff)
        .execute(executor)
        .await
        .map_err(internal)?;

        Ok(result.rows_affected() > 0)
    }

    fn map_row(row: SqliteRow) -> CoreResult<Database> {
        let id_bytes: Vec<u8> = column(&row, "database_id")?;
        let id = DatabaseId::from_bytes(&id_bytes)
            .map_err(|err| CoreError::internal(err.to_string()))?;
        let state: String = column(&row, "state")?;
        let state = DatabaseState::from_str(&state)
            .map_err(|_| CoreError::internal(format!("unknown database state `{state}`")))?;
        let deleted_at: Option<i64> = column(&row, "deleted_at")?;
        let deleted_at: Option<DateTime<Utc>> = deleted_at
            .map(|value| decode_millis("deleted_at", value))
            .transpose()?;
        let created_at: String = column(&row, "created_at")?;
        let updated_at: String = column(&row, "updated_at")?;

        Ok(Database {
            id,
            name: column(&row, "name")?,
            tenant: column(&row, "tenant_id")?,
            ts: column(&row, "ts")?,
            state,
            deleted_at,
            created_at: decode_time("created_at", &created_at)?,
            updated_at: decode_time("updated_at", &updated_at)?,
        })
    }
}

#[async_trait::async_trait]
impl sysdb_core::DatabaseRepository for SqliteDatabaseRepository {
    async fn insert(&self, database: &Database) -> CoreResult<()> {
        Self::insert_with_executor(self.store.pool(), database).await
    }

    async fn get(&self, database_id: DatabaseId) -> CoreResult<Option<Database>> {
        let row = query(
            r#"
            SELECT database_id,
                   name,
                   tenant_id,
                   ts,
                   state,
                   deleted_at,
                   created_at,
                   updated_at
              FROM databases
             WHERE database_id = ?1
            "#,
        )
        .bind(database_id.to_bytes().to_vec())
        .fetch_optional(self.store.pool())
        .await
        .map_err(internal)?;

        row.map(Self::map_row).transpose()
    }

    async fn get_by_name(&self, tenant: &str, name: &str) -> CoreResult<Option<Database>> {
        let row = query(
            r#"
            SELECT database_id,
                   name,
                   tenant_id,
                   ts,
                   state,
                   deleted_at,
                   created_at,
                   updated_at
              FROM databases
             WHERE tenant_id = ?1
               AND name = ?2
               AND state = 'active'
            "#,
        )
        .bind(tenant)
        .bind(name)
        .fetch_optional(self.store.pool())
        .await
        .map_err(internal)?;

        row.map(Self::map_row).transpose()
    }

    async fn list(
        &self,
        tenant: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> CoreResult<Vec<Database>> {
        // SQLite treats a negative LIMIT as "no limit".
        let limit = limit.map_or(-1, i64::from);
        let offset = offset.map_or(0, i64::from);

        let rows = query(
            r#"
            SELECT database_id,
                   name,
                   tenant_id,
                   ts,
                   state,
                   deleted_at,
                   created_at,
                   updated_at
              FROM databases
             WHERE tenant_id = ?1
               AND state = 'active'
          ORDER BY created_at ASC, name ASC
             LIMIT ?2 OFFSET ?3
            "#,
        )
        .bind(tenant)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.store.pool())
        .await
        .map_err(internal)?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn soft_delete(&self, tenant: &str, name: &str) -> CoreResult<()> {
        let now = Utc::now();
        let result = query(
            r#"
            UPDATE databases
               SET state = 'soft_deleted',
                   deleted_at = ?3,
                   updated_at = ?4
             WHERE tenant_id = ?1
               AND name = ?2
               AND state = 'active'
            "#,
        )
        .bind(tenant)
        .bind(name)
        .bind(encode_millis(&now))
        .bind(encode_time(&now))
        .execute(self.store.pool())
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("database", format!("{tenant}/{name}")));
        }
        Ok(())
    }

    async fn finish_deletion(&self, cutoff: DateTime<Utc>) -> CoreResult<u64> {
        let cutoff = encode_millis(&cutoff);
        let candidates = query(
            r#"
            SELECT database_id
              FROM databases
             WHERE state = 'soft_deleted'
               AND deleted_at < ?1
          ORDER BY deleted_at ASC
            "#,
        )
        .bind(cutoff)
        .fetch_all(self.store.pool())
        .await
        .map_err(internal)?;

        // Each row is removed by its own statement so that an interrupted
        // sweep leaves only fully removed or untouched rows behind.
        let mut removed = 0u64;
        for row in candidates {
            let id_bytes: Vec<u8> = column(&row, "database_id")?;
            if Self::finalize_one(self.store.pool(), &id_bytes, cutoff).await? {
                removed += 1;
                if let Ok(database_id) = DatabaseId::from_bytes(&id_bytes) {
                    tracing::debug!(%database_id, "finalized soft-deleted database");
                }
            }
        }

        Ok(removed)
    }
}
