//! Operation surface invoked by the transport layer.
//!
//! Every operation normalises its request, runs the matching persistence call
//! under the configured deadline, and translates domain errors into
//! [`tonic::Status`] values.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sysdb_core::{
    CoreError, CoreResult, CreateDatabase, CreateSegment, CreateTenant, Database, DatabaseId,
    DatabaseRepository, DeleteDatabase, FinishDatabaseDeletion, FlushCollectionCompaction,
    FlushSegmentCompaction, GetDatabase, GetSegments, GetTenant, ListDatabases, Segment,
    SegmentFilter, SegmentId, SegmentRepository, SetTenantCompactionTime, SetTenantResourceName,
    Tenant, TenantCatalog, TenantCompactionTime, UpdateSegment,
};
use sysdb_metadata::{
    MetaStore, SqliteDatabaseRepository, SqliteSegmentRepository, SqliteTenantCatalog,
};
use tonic::Status;

use crate::status::status_from_core;

/// Longest accepted database name.
const MAX_DATABASE_NAME_LEN: usize = 128;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Coordination façade over the tenant, database and segment access objects.
pub struct Coordinator {
    tenants: Arc<dyn TenantCatalog>,
    databases: Arc<dyn DatabaseRepository>,
    segments: Arc<dyn SegmentRepository>,
    request_timeout: Duration,
}

impl Coordinator {
    /// Creates a coordinator over the supplied access objects.
    pub fn new(
        tenants: Arc<dyn TenantCatalog>,
        databases: Arc<dyn DatabaseRepository>,
        segments: Arc<dyn SegmentRepository>,
    ) -> Self {
        Self {
            tenants,
            databases,
            segments,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Creates a coordinator backed by the SQLite access objects.
    pub fn with_store(store: MetaStore) -> Self {
        Self::new(
            Arc::new(SqliteTenantCatalog::new(store.clone())),
            Arc::new(SqliteDatabaseRepository::new(store.clone())),
            Arc::new(SqliteSegmentRepository::new(store)),
        )
    }

    /// Overrides the deadline applied to each operation.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub async fn create_tenant(&self, req: CreateTenant) -> Result<Tenant, Status> {
        let name = required("name", &req.name)?;
        let tenant = Tenant::new(name);

        self.run("create_tenant", self.tenants.insert(&tenant)).await?;

        tracing::info!(tenant = %tenant.id, "CreateTenant success");
        Ok(tenant)
    }

    pub async fn get_tenant(&self, req: GetTenant) -> Result<Tenant, Status> {
        let name = required("name", &req.name)?;

        self.run("get_tenant", self.find_tenant(&name)).await
    }

    /// Binds the tenant's resource name. A second bind reports
    /// `FAILED_PRECONDITION` and leaves the first value in place.
    pub async fn set_tenant_resource_name(&self, req: SetTenantResourceName) -> Result<(), Status> {
        let tenant_id = required("id", &req.id)?;
        let resource_name = required("resource_name", &req.resource_name)?;

        self.run(
            "set_tenant_resource_name",
            self.tenants.set_resource_name(&tenant_id, &resource_name),
        )
        .await?;

        tracing::info!(tenant = %tenant_id, %resource_name, "SetTenantResourceName success");
        Ok(())
    }

    pub async fn set_tenant_last_compaction_time(
        &self,
        req: SetTenantCompactionTime,
    ) -> Result<(), Status> {
        let tenant_id = required("tenant_id", &req.tenant_id)?;
        if req.last_compaction_time < 0 {
            return Err(Status::invalid_argument(
                "last_compaction_time cannot be negative",
            ));
        }

        self.run(
            "set_tenant_last_compaction_time",
            self.tenants
                .update_last_compaction_time(&tenant_id, req.last_compaction_time),
        )
        .await?;

        tracing::info!(
            tenant = %tenant_id,
            last_compaction_time = req.last_compaction_time,
            "SetLastCompactionTimeForTenant success"
        );
        Ok(())
    }

    /// Returns the checkpoints of the known tenants among `tenant_ids`.
    pub async fn get_tenant_last_compaction_times(
        &self,
        tenant_ids: Vec<String>,
    ) -> Result<Vec<TenantCompactionTime>, Status> {
        self.run(
            "get_tenant_last_compaction_times",
            self.tenants.last_compaction_times(&tenant_ids),
        )
        .await
    }

    pub async fn create_database(&self, req: CreateDatabase) -> Result<Database, Status> {
        let id: DatabaseId = req
            .id
            .trim()
            .parse()
            .map_err(|err| Status::invalid_argument(format!("invalid database id: {err}")))?;
        let name = database_name(&req.name)?;
        let tenant = required("tenant", &req.tenant)?;
        let database = Database::new(id, name, tenant);

        self.run("create_database", self.databases.insert(&database))
            .await?;

        tracing::info!(
            database_id = %database.id,
            database = %database.name,
            tenant = %database.tenant,
            "CreateDatabase success"
        );
        Ok(database)
    }

    pub async fn get_database(&self, req: GetDatabase) -> Result<Database, Status> {
        let name = database_name(&req.name)?;
        let tenant = required("tenant", &req.tenant)?;

        self.run("get_database", self.find_database(&tenant, &name))
            .await
    }

    /// Returns one page of the tenant's active databases, oldest first.
    pub async fn list_databases(&self, req: ListDatabases) -> Result<Vec<Database>, Status> {
        let tenant = required("tenant", &req.tenant)?;

        self.run(
            "list_databases",
            self.list_tenant_databases(&tenant, req.limit, req.offset),
        )
        .await
    }

    /// Soft-deletes a database. The row stays until a finalisation sweep.
    pub async fn delete_database(&self, req: DeleteDatabase) -> Result<(), Status> {
        let name = database_name(&req.name)?;
        let tenant = required("tenant", &req.tenant)?;

        self.run("delete_database", self.databases.soft_delete(&tenant, &name))
            .await?;

        tracing::info!(database = %name, %tenant, "DeleteDatabase success");
        Ok(())
    }

    /// Physically removes databases soft-deleted before the cutoff and returns
    /// how many were removed.
    pub async fn finish_database_deletion(
        &self,
        req: FinishDatabaseDeletion,
    ) -> Result<u64, Status> {
        let removed = self
            .run(
                "finish_database_deletion",
                self.databases.finish_deletion(req.cutoff),
            )
            .await?;

        tracing::info!(cutoff = %req.cutoff, removed, "FinishDatabaseDeletion success");
        Ok(removed)
    }

    pub async fn create_segment(&self, req: CreateSegment) -> Result<Segment, Status> {
        let segment_type = required("segment_type", &req.segment_type)?;
        if req.id.is_nil() || req.collection_id.is_nil() {
            return Err(Status::invalid_argument(
                "segment id and collection id are required",
            ));
        }
        let mut segment = Segment::new(req.id, segment_type, req.scope, req.collection_id);
        segment.metadata = req.metadata;

        self.run("create_segment", self.segments.insert(&segment))
            .await?;

        tracing::info!(
            segment_id = %segment.id,
            collection_id = %segment.collection_id,
            "CreateSegment success"
        );
        Ok(segment)
    }

    /// Returns the segments matching every supplied criterion.
    pub async fn get_segments(&self, req: GetSegments) -> Result<Vec<Segment>, Status> {
        let filter = SegmentFilter {
            id: req.id.filter(|id| !id.is_nil()),
            segment_type: req
                .segment_type
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            scope: req.scope,
            collection_id: req.collection_id.filter(|id| !id.is_nil()),
        };

        let candidates = self
            .run("get_segments", self.segment_candidates(filter.id))
            .await?;

        Ok(filter.apply(candidates))
    }

    pub async fn update_segment(&self, req: UpdateSegment) -> Result<(), Status> {
        if req.collection_id.is_some_and(|id| id.is_nil()) {
            return Err(Status::invalid_argument("collection id cannot be nil"));
        }

        self.run("update_segment", self.segments.update(&req)).await?;

        tracing::info!(segment_id = %req.id, "UpdateSegment success");
        Ok(())
    }

    /// Replaces the segment's file-path mapping. Repeating the same flush is a
    /// no-op.
    pub async fn flush_segment_compaction(
        &self,
        req: FlushSegmentCompaction,
    ) -> Result<(), Status> {
        validate_file_paths(&req)?;

        self.run(
            "flush_segment_compaction",
            self.segments.flush_compaction(&req),
        )
        .await?;

        tracing::info!(
            segment_id = %req.id,
            roles = req.file_paths.len(),
            "FlushSegmentCompaction success"
        );
        Ok(())
    }

    pub async fn flush_collection_compaction(
        &self,
        req: FlushCollectionCompaction,
    ) -> Result<(), Status> {
        let tenant_id = required("tenant_id", &req.tenant_id)?;
        if req.compaction_time < 0 {
            return Err(Status::invalid_argument("compaction_time cannot be negative"));
        }
        for segment in &req.segments {
            validate_file_paths(segment)?;
        }
        let req = FlushCollectionCompaction { tenant_id, ..req };

        self.run(
            "flush_collection_compaction",
            self.segments.flush_collection_compaction(&req),
        )
        .await?;

        tracing::info!(
            tenant = %req.tenant_id,
            collection_id = %req.collection_id,
            segments = req.segments.len(),
            compaction_time = req.compaction_time,
            "FlushCollectionCompaction success"
        );
        Ok(())
    }

    async fn find_tenant(&self, tenant: &str) -> CoreResult<Tenant> {
        self.tenants
            .get(tenant)
            .await?
            .ok_or_else(|| CoreError::not_found("tenant", tenant))
    }

    /// Reports a missing tenant ahead of a missing database.
    async fn find_database(&self, tenant: &str, name: &str) -> CoreResult<Database> {
        if let Some(database) = self.databases.get_by_name(tenant, name).await? {
            return Ok(database);
        }
        self.find_tenant(tenant).await?;
        Err(CoreError::not_found("database", format!("{tenant}/{name}")))
    }

    async fn list_tenant_databases(
        &self,
        tenant: &str,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> CoreResult<Vec<Database>> {
        self.find_tenant(tenant).await?;
        self.databases.list(tenant, limit, offset).await
    }

    async fn segment_candidates(&self, id: Option<SegmentId>) -> CoreResult<Vec<Segment>> {
        match id {
            Some(id) => Ok(self.segments.get(id).await?.into_iter().collect()),
            None => self.segments.list().await,
        }
    }

    /// Awaits `fut` under the request deadline and translates its error.
    async fn run<T, F>(&self, operation: &'static str, fut: F) -> Result<T, Status>
    where
        F: Future<Output = CoreResult<T>>,
    {
        match tokio::time::timeout(self.request_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(status_from_core(operation, err)),
            Err(_) => {
                tracing::error!(operation, timeout = ?self.request_timeout, "deadline exceeded");
                Err(Status::deadline_exceeded(format!(
                    "{operation} exceeded its deadline"
                )))
            }
        }
    }
}

fn required(field: &str, value: &str) -> Result<String, Status> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Status::invalid_argument(format!("{field} cannot be empty")));
    }
    Ok(value.to_string())
}

fn database_name(value: &str) -> Result<String, Status> {
    let name = required("name", value)?;
    if name.chars().count() > MAX_DATABASE_NAME_LEN {
        return Err(Status::invalid_argument(format!(
            "name must be at most {MAX_DATABASE_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

fn validate_file_paths(flush: &FlushSegmentCompaction) -> Result<(), Status> {
    if flush.file_paths.keys().any(|role| role.trim().is_empty()) {
        return Err(Status::invalid_argument(format!(
            "segment {} has a file path entry without a role",
            flush.id
        )));
    }
    Ok(())
}
