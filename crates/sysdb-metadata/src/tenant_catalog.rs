use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{query, Executor, Sqlite};
use sysdb_core::{CoreError, CoreResult, Tenant, TenantCompactionTime};

use crate::store::{column, internal, MetaStore};
use crate::util::{decode_time, encode_time};

/// SQLite-backed implementation of the tenant catalog.
pub struct SqliteTenantCatalog {
    store: MetaStore,
}

impl SqliteTenantCatalog {
    /// Creates a new catalog on top of the shared store handle.
    pub fn new(store: MetaStore) -> Self {
        Self { store }
    }

    /// Provides access to the underlying store, primarily for testing.
    pub fn store(&self) -> &MetaStore {
        &self.store
    }

    /// Inserts a tenant using the supplied executor (pool or transaction).
    pub async fn insert_with_executor<'e, E>(executor: E, tenant: &Tenant) -> CoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        query(
            r#"
            INSERT INTO tenants (
                id,
                resource_name,
                last_compaction_time,
                created_at,
                updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&tenant.id)
        .bind(&tenant.resource_name)
        .bind(tenant.last_compaction_time)
        .bind(encode_time(&tenant.created_at))
        .bind(encode_time(&tenant.updated_at))
        .execute(executor)
        .await
        .map(|_| ())
        .map_err(|err| MetaStore::map_error("tenant", tenant.id.as_str(), err))
    }

    /// Advances the compaction checkpoint using the supplied executor.
    ///
    /// `MAX` keeps the checkpoint monotonic while still matching the row, so a
    /// stale time is accepted as a no-op rather than reported as missing.
    pub async fn update_last_compaction_time_with_executor<'e, E>(
        executor: E,
        tenant_id: &str,
        time: i64,
    ) -> CoreResult<()>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let result = query(
            r#"
            UPDATE tenants
               SET last_compaction_time = MAX(last_compaction_time, ?2),
                   updated_at = ?3
             WHERE id = ?1
            "#,
        )
        .bind(tenant_id)
        .bind(time)
        .bind(encode_time(&Utc::now()))
        .execute(executor)
        .await
        .map_err(internal)?;

        if result.rows_affected() == 0 {
            return Err(CoreError::not_found("tenant", tenant_id));
        }
        Ok(())
    }

    fn map_row(row: SqliteRow) -> CoreResult<Tenant> {
        let created_at: String = column(&row, "created_at")?;
        let updated_at: String = column(&row, "updated_at")?;

        Ok(Tenant {
            id: column(&row, "id")?,
            resource_name: column(&row, "resource_name")?,
            last_compaction_time: column(&row, "last_compaction_time")?,
            created_at: decode_time("created_at", &created_at)?,
            updated_at: decode_time("updated_at", &updated_at)?,
        })
    }
}

#[async_trait::async_trait]
impl sysdb_core::TenantCatalog for SqliteTenantCatalog {
    async fn insert(&self, tenant: &Tenant) -> CoreResult<()> {
        Self::insert_with_executor(self.store.pool(), tenant).await
    }

    async fn list(&self) -> CoreResult<Vec<Tenant>> {
        let rows = query(
            r#"
            SELECT id,
                   resource_name,
                   last_compaction_time,
                   created_at,
                   updated_at
              FROM tenants
          ORDER BY created_at ASC, id ASC
            "#,
        )
        .fetch_all(self.store.pool())
        .await
        .map_err(internal)?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn get(&self, tenant_id: &str) -> CoreResult<Option<Tenant>> {
        let row = query(
            r#"
            SELECT id,
                   resource_name,
                   last_compaction_time,
                   created_at,
                   updated_at
              FROM tenants
             WHERE id = ?1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(self.store.pool())
        .await
        .map_err(internal)?;

        row.map(Self::map_row).transpose()
    }

    async fn update_last_compaction_time(&self, tenant_id: &str, time: i64) -> CoreResult<()> {
        Self::update_last_compaction_time_with_executor(self.store.pool(), tenant_id, time).await
    }

    async fn set_resource_name(&self, tenant_id: &str, resource_name: &str) -> CoreResult<()> {
        let result = query(
            r#"
            UPDATE tenants
               SET resource_name = ?2,
                   updated_at = ?3
             WHERE id = ?1
               AND resource_name IS NULL
            "#,
        )
        .bind(tenant_id)
        .bind(resource_name)
        .bind(encode_time(&Utc::now()))
        .execute(self.store.pool())
        .await
        .map_err(internal)?;

        if result.rows_affected() > 0 {
            return Ok(());
        }

        // The conditional update cannot tell a missing row from a bound one.
        let exists = query("SELECT 1 FROM tenants WHERE id = ?1")
            .bind(tenant_id)
            .fetch_optional(self.store.pool())
            .await
            .map_err(internal)?;

        match exists {
            None => Err(CoreError::not_found("tenant", tenant_id)),
            Some(_) => Err(CoreError::already_bound("tenant", tenant_id, "resource name")),
        }
    }

    async fn last_compaction_times(
        &self,
        tenant_ids: &[String],
    ) -> CoreResult<Vec<TenantCompactionTime>> {
        if tenant_ids.is_empty() {
            return Ok(Vec::new());
        }

        // Bound as a single JSON array, never one variable per id.
        let tenant_ids = serde_json::to_string(tenant_ids)?;
        let rows = query(
            r#"
            SELECT id,
                   last_compaction_time
              FROM tenants
             WHERE id IN (SELECT value FROM json_each(?1))
          ORDER BY id ASC
            "#,
        )
        .bind(tenant_ids)
        .fetch_all(self.store.pool())
        .await
        .map_err(internal)?;

        rows.into_iter()
            .map(|row| {
                Ok(TenantCompactionTime {
                    tenant_id: column(&row, "id")?,
                    last_compaction_time: column(&row, "last_compaction_time")?,
                })
            })
            .collect()
    }
}
