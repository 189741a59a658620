use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::database::Database;
use crate::error::CoreResult;
use crate::ids::{DatabaseId, SegmentId};
use crate::segment::{FlushCollectionCompaction, FlushSegmentCompaction, Segment, UpdateSegment};
use crate::tenant::{Tenant, TenantCompactionTime};

/// Catalog interface for tenant records.
#[async_trait]
pub trait TenantCatalog: Send + Sync {
    /// Persists a new tenant. Fails with `AlreadyExists` on a duplicate name.
    async fn insert(&self, tenant: &Tenant) -> CoreResult<()>;

    /// Returns all tenants ordered by creation time.
    async fn list(&self) -> CoreResult<Vec<Tenant>>;

    /// Fetches a tenant by its name.
    async fn get(&self, tenant_id: &str) -> CoreResult<Option<Tenant>>;

    /// Records a new compaction checkpoint. The stored value never moves
    /// backwards; fails with `NotFound` when the tenant is missing.
    async fn update_last_compaction_time(&self, tenant_id: &str, time: i64) -> CoreResult<()>;

    /// Binds the resource name if none is bound yet.
    ///
    /// Fails with `NotFound` when the tenant is missing and `AlreadyBound`
    /// when a resource name was already set.
    async fn set_resource_name(&self, tenant_id: &str, resource_name: &str) -> CoreResult<()>;

    /// Returns the checkpoints of the tenants that exist among `tenant_ids`.
    async fn last_compaction_times(
        &self,
        tenant_ids: &[String],
    ) -> CoreResult<Vec<TenantCompactionTime>>;
}

/// Repository interface for logical database records.
#[async_trait]
pub trait DatabaseRepository: Send + Sync {
    /// Creates a new active database.
    async fn insert(&self, database: &Database) -> CoreResult<()>;

    /// Retrieves a database by identifier regardless of its state.
    async fn get(&self, database_id: DatabaseId) -> CoreResult<Option<Database>>;

    /// Retrieves the active database named `name` within `tenant`.
    async fn get_by_name(&self, tenant: &str, name: &str) -> CoreResult<Option<Database>>;

    /// Lists a page of the tenant's active databases ordered by creation time.
    async fn list(
        &self,
        tenant: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> CoreResult<Vec<Database>>;

    /// Marks the active database `name` as soft-deleted.
    async fn soft_delete(&self, tenant: &str, name: &str) -> CoreResult<()>;

    /// Physically removes databases soft-deleted before `cutoff` and returns
    /// how many rows were removed.
    async fn finish_deletion(&self, cutoff: DateTime<Utc>) -> CoreResult<u64>;
}

/// Repository interface for segment records.
#[async_trait]
pub trait SegmentRepository: Send + Sync {
    async fn insert(&self, segment: &Segment) -> CoreResult<()>;

    async fn get(&self, segment_id: SegmentId) -> CoreResult<Option<Segment>>;

    /// Lists every segment ordered by creation time.
    async fn list(&self) -> CoreResult<Vec<Segment>>;

    /// Applies a metadata update.
    async fn update(&self, update: &UpdateSegment) -> CoreResult<()>;

    /// Replaces the file-path mapping of a single segment.
    async fn flush_compaction(&self, flush: &FlushSegmentCompaction) -> CoreResult<()>;

    /// Replaces the file-path mappings of a collection's segments and advances
    /// the tenant checkpoint atomically.
    async fn flush_collection_compaction(&self, flush: &FlushCollectionCompaction)
        -> CoreResult<()>;
}
