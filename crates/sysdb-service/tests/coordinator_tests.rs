use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sysdb_core::{
    CollectionId, CoreResult, CreateDatabase, CreateSegment, CreateTenant, DeleteDatabase,
    FinishDatabaseDeletion, FlushCollectionCompaction, FlushSegmentCompaction, GetDatabase,
    GetSegments, GetTenant, ListDatabases, SegmentId, SegmentScope, SetTenantCompactionTime,
    SetTenantResourceName, Tenant, TenantCatalog, TenantCompactionTime, UpdateSegment,
};
use sysdb_metadata::{
    create_sqlite_pool, run_migrations, MetaStore, PoolOptions, SqliteDatabaseRepository,
    SqliteSegmentRepository,
};
use sysdb_service::{sweep_expired_databases, Coordinator};
use tonic::Code;
use uuid::Uuid;

async fn open_store() -> MetaStore {
    let path = std::env::temp_dir().join(format!("sysdb-service-test-{}.db", Uuid::now_v7()));
    let pool = create_sqlite_pool(&format!("sqlite://{}", path.display()), PoolOptions::default())
        .await
        .expect("failed to create pool");
    run_migrations(&pool).await.expect("failed migrations");
    MetaStore::new(pool)
}

async fn coordinator() -> Coordinator {
    Coordinator::with_store(open_store().await)
}

async fn create_tenant(coordinator: &Coordinator, name: &str) {
    coordinator
        .create_tenant(CreateTenant {
            name: name.to_string(),
        })
        .await
        .expect("create tenant");
}

fn create_database(name: &str, tenant: &str) -> CreateDatabase {
    CreateDatabase {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        tenant: tenant.to_string(),
    }
}

fn create_segment(collection_id: CollectionId, scope: SegmentScope) -> CreateSegment {
    CreateSegment {
        id: SegmentId::new(),
        segment_type: "urn:segment/vector/hnsw".to_string(),
        scope,
        collection_id,
        metadata: None,
    }
}

fn paths(role: &str, files: &[&str]) -> BTreeMap<String, Vec<String>> {
    BTreeMap::from([(
        role.to_string(),
        files.iter().map(|f| f.to_string()).collect(),
    )])
}

#[tokio::test]
async fn tenant_resource_name_binds_once() {
    let coordinator = coordinator().await;
    create_tenant(&coordinator, "acme").await;

    let tenant = coordinator
        .get_tenant(GetTenant {
            name: "acme".into(),
        })
        .await
        .unwrap();
    assert_eq!(tenant.resource_name, None);
    assert_eq!(tenant.last_compaction_time, Tenant::NEVER_COMPACTED);

    coordinator
        .set_tenant_resource_name(SetTenantResourceName {
            id: "acme".into(),
            resource_name: "res-1".into(),
        })
        .await
        .unwrap();

    let err = coordinator
        .set_tenant_resource_name(SetTenantResourceName {
            id: "acme".into(),
            resource_name: "res-2".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::FailedPrecondition);

    let tenant = coordinator
        .get_tenant(GetTenant {
            name: "acme".into(),
        })
        .await
        .unwrap();
    assert_eq!(tenant.resource_name.as_deref(), Some("res-1"));
}

#[tokio::test]
async fn unknown_tenant_is_not_found() {
    let coordinator = coordinator().await;

    let err = coordinator
        .get_tenant(GetTenant {
            name: "ghost".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let err = coordinator
        .set_tenant_resource_name(SetTenantResourceName {
            id: "ghost".into(),
            resource_name: "res-1".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let err = coordinator
        .set_tenant_last_compaction_time(SetTenantCompactionTime {
            tenant_id: "ghost".into(),
            last_compaction_time: 10,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let err = coordinator
        .list_databases(ListDatabases {
            tenant: "ghost".into(),
            limit: None,
            offset: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn duplicate_tenant_is_rejected() {
    let coordinator = coordinator().await;
    create_tenant(&coordinator, "acme").await;

    let err = coordinator
        .create_tenant(CreateTenant {
            name: "acme".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::AlreadyExists);
}

#[tokio::test]
async fn compaction_checkpoints_only_move_forward() {
    let coordinator = coordinator().await;
    create_tenant(&coordinator, "acme").await;
    create_tenant(&coordinator, "globex").await;

    for time in [200, 100] {
        coordinator
            .set_tenant_last_compaction_time(SetTenantCompactionTime {
                tenant_id: "acme".into(),
                last_compaction_time: time,
            })
            .await
            .unwrap();
    }

    let times = coordinator
        .get_tenant_last_compaction_times(vec![
            "acme".into(),
            "globex".into(),
            "ghost".into(),
        ])
        .await
        .unwrap();
    assert_eq!(
        times,
        vec![
            TenantCompactionTime {
                tenant_id: "acme".into(),
                last_compaction_time: 200,
            },
            TenantCompactionTime {
                tenant_id: "globex".into(),
                last_compaction_time: Tenant::NEVER_COMPACTED,
            },
        ]
    );

    let err = coordinator
        .set_tenant_last_compaction_time(SetTenantCompactionTime {
            tenant_id: "acme".into(),
            last_compaction_time: -1,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);
}

#[tokio::test]
async fn database_names_are_unique_among_active_databases() {
    let coordinator = coordinator().await;
    create_tenant(&coordinator, "acme").await;

    let first = coordinator
        .create_database(create_database("db1", "acme"))
        .await
        .unwrap();

    let err = coordinator
        .create_database(create_database("db1", "acme"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::AlreadyExists);

    coordinator
        .delete_database(DeleteDatabase {
            name: "db1".into(),
            tenant: "acme".into(),
        })
        .await
        .unwrap();

    let err = coordinator
        .get_database(GetDatabase {
            name: "db1".into(),
            tenant: "acme".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let second = coordinator
        .create_database(create_database("db1", "acme"))
        .await
        .unwrap();
    assert_ne!(first.id, second.id);

    let fetched = coordinator
        .get_database(GetDatabase {
            name: "db1".into(),
            tenant: "acme".into(),
        })
        .await
        .unwrap();
    assert_eq!(fetched.id, second.id);
}

#[tokio::test]
async fn database_requests_are_validated() {
    let coordinator = coordinator().await;
    create_tenant(&coordinator, "acme").await;

    let mut bad_id = create_database("db1", "acme");
    bad_id.id = "not-a-uuid".into();
    let err = coordinator.create_database(bad_id).await.unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = coordinator
        .create_database(create_database("  ", "acme"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    let err = coordinator
        .create_database(create_database("db1", "ghost"))
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let err = coordinator
        .delete_database(DeleteDatabase {
            name: "missing".into(),
            tenant: "acme".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn list_databases_pages_in_creation_order() {
    let coordinator = coordinator().await;
    create_tenant(&coordinator, "acme").await;

    for name in ["db-a", "db-b", "db-c"] {
        coordinator
            .create_database(create_database(name, "acme"))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let page = coordinator
        .list_databases(ListDatabases {
            tenant: "acme".into(),
            limit: Some(2),
            offset: Some(1),
        })
        .await
        .unwrap();
    let names: Vec<_> = page.iter().map(|db| db.name.as_str()).collect();
    assert_eq!(names, vec!["db-b", "db-c"]);
}

#[tokio::test]
async fn finishing_deletion_is_idempotent() {
    let coordinator = coordinator().await;
    create_tenant(&coordinator, "acme").await;
    coordinator
        .create_database(create_database("db1", "acme"))
        .await
        .unwrap();
    coordinator
        .create_database(create_database("db2", "acme"))
        .await
        .unwrap();
    coordinator
        .delete_database(DeleteDatabase {
            name: "db1".into(),
            tenant: "acme".into(),
        })
        .await
        .unwrap();

    let cutoff = Utc::now() + chrono::Duration::seconds(1);
    let removed = coordinator
        .finish_database_deletion(FinishDatabaseDeletion { cutoff })
        .await
        .unwrap();
    assert_eq!(removed, 1);

    let removed = coordinator
        .finish_database_deletion(FinishDatabaseDeletion { cutoff })
        .await
        .unwrap();
    assert_eq!(removed, 0);

    let remaining = coordinator
        .list_databases(ListDatabases {
            tenant: "acme".into(),
            limit: None,
            offset: None,
        })
        .await
        .unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].name, "db2");
}

#[tokio::test]
async fn sweep_reports_failures_instead_of_discarding_them() {
    let store = open_store().await;
    let coordinator = Coordinator::with_store(store.clone());
    create_tenant(&coordinator, "acme").await;
    coordinator
        .create_database(create_database("db1", "acme"))
        .await
        .unwrap();
    coordinator
        .delete_database(DeleteDatabase {
            name: "db1".into(),
            tenant: "acme".into(),
        })
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;

    let removed = sweep_expired_databases(&coordinator, chrono::Duration::zero()).await;
    assert_eq!(removed, Some(1));

    store.pool().close().await;
    let removed = sweep_expired_databases(&coordinator, chrono::Duration::zero()).await;
    assert_eq!(removed, None);
}

#[tokio::test]
async fn get_segments_applies_every_filter() {
    let coordinator = coordinator().await;
    let collection = CollectionId::new();
    let other_collection = CollectionId::new();

    let vector = coordinator
        .create_segment(create_segment(collection, SegmentScope::Vector))
        .await
        .unwrap();
    let metadata = coordinator
        .create_segment(create_segment(collection, SegmentScope::Metadata))
        .await
        .unwrap();
    coordinator
        .create_segment(create_segment(other_collection, SegmentScope::Vector))
        .await
        .unwrap();

    let all = coordinator
        .get_segments(GetSegments::default())
        .await
        .unwrap();
    assert_eq!(all.len(), 3);

    let by_id = coordinator
        .get_segments(GetSegments {
            id: Some(metadata.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_id.len(), 1);
    assert_eq!(by_id[0].id, metadata.id);

    let unknown_id = coordinator
        .get_segments(GetSegments {
            id: Some(SegmentId::new()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(unknown_id.is_empty());

    let nil_id = coordinator
        .get_segments(GetSegments {
            id: Some(SegmentId::nil()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(nil_id.len(), 3);

    let scoped = coordinator
        .get_segments(GetSegments {
            scope: Some(SegmentScope::Vector),
            collection_id: Some(collection),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(scoped.len(), 1);
    assert_eq!(scoped[0].id, vector.id);

    let wrong_type = coordinator
        .get_segments(GetSegments {
            segment_type: Some("urn:segment/record/blockfile".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(wrong_type.is_empty());
}

#[tokio::test]
async fn segment_flush_replaces_paths() {
    let coordinator = coordinator().await;
    let segment = coordinator
        .create_segment(create_segment(CollectionId::new(), SegmentScope::Record))
        .await
        .unwrap();

    let flush = FlushSegmentCompaction {
        id: segment.id,
        file_paths: paths("data", &["s3://bucket/a", "s3://bucket/b"]),
    };
    coordinator
        .flush_segment_compaction(flush.clone())
        .await
        .unwrap();
    coordinator.flush_segment_compaction(flush).await.unwrap();

    let stored = coordinator
        .get_segments(GetSegments {
            id: Some(segment.id),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(stored[0].file_paths, paths("data", &["s3://bucket/a", "s3://bucket/b"]));

    let err = coordinator
        .flush_segment_compaction(FlushSegmentCompaction {
            id: SegmentId::new(),
            file_paths: paths("data", &["s3://bucket/c"]),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);
}

#[tokio::test]
async fn collection_flush_advances_tenant_checkpoint() {
    let coordinator = coordinator().await;
    create_tenant(&coordinator, "acme").await;
    let collection = CollectionId::new();
    let segment = coordinator
        .create_segment(create_segment(collection, SegmentScope::Vector))
        .await
        .unwrap();

    coordinator
        .flush_collection_compaction(FlushCollectionCompaction {
            tenant_id: "acme".into(),
            collection_id: collection,
            segments: vec![FlushSegmentCompaction {
                id: segment.id,
                file_paths: paths("hnsw_index", &["s3://bucket/idx"]),
            }],
            compaction_time: 42,
        })
        .await
        .unwrap();

    let tenant = coordinator
        .get_tenant(GetTenant {
            name: "acme".into(),
        })
        .await
        .unwrap();
    assert_eq!(tenant.last_compaction_time, 42);

    let err = coordinator
        .flush_collection_compaction(FlushCollectionCompaction {
            tenant_id: "acme".into(),
            collection_id: CollectionId::new(),
            segments: vec![FlushSegmentCompaction {
                id: segment.id,
                file_paths: paths("hnsw_index", &["s3://bucket/other"]),
            }],
            compaction_time: 50,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::NotFound);

    let tenant = coordinator
        .get_tenant(GetTenant {
            name: "acme".into(),
        })
        .await
        .unwrap();
    assert_eq!(tenant.last_compaction_time, 42);
}

#[tokio::test]
async fn update_segment_moves_between_collections() {
    let coordinator = coordinator().await;
    let source = CollectionId::new();
    let target = CollectionId::new();
    let segment = coordinator
        .create_segment(create_segment(source, SegmentScope::Metadata))
        .await
        .unwrap();

    let err = coordinator
        .update_segment(UpdateSegment {
            id: segment.id,
            collection_id: Some(CollectionId::nil()),
            metadata: None,
            reset_metadata: false,
            ts: None,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::InvalidArgument);

    coordinator
        .update_segment(UpdateSegment {
            id: segment.id,
            collection_id: Some(target),
            metadata: None,
            reset_metadata: false,
            ts: None,
        })
        .await
        .unwrap();

    let moved = coordinator
        .get_segments(GetSegments {
            collection_id: Some(target),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(moved.len(), 1);
    assert_eq!(moved[0].id, segment.id);

    let left_behind = coordinator
        .get_segments(GetSegments {
            collection_id: Some(source),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(left_behind.is_empty());
}

/// Tenant catalog whose every call outlives any reasonable deadline.
struct StalledCatalog;

#[async_trait]
impl TenantCatalog for StalledCatalog {
    async fn insert(&self, _tenant: &Tenant) -> CoreResult<()> {
        stall().await
    }

    async fn list(&self) -> CoreResult<Vec<Tenant>> {
        stall().await
    }

    async fn get(&self, _tenant_id: &str) -> CoreResult<Option<Tenant>> {
        stall().await
    }

    async fn update_last_compaction_time(&self, _tenant_id: &str, _time: i64) -> CoreResult<()> {
        stall().await
    }

    async fn set_resource_name(&self, _tenant_id: &str, _resource_name: &str) -> CoreResult<()> {
        stall().await
    }

    async fn last_compaction_times(
        &self,
        _tenant_ids: &[String],
    ) -> CoreResult<Vec<TenantCompactionTime>> {
        stall().await
    }
}

async fn stall<T>() -> CoreResult<T> {
    tokio::time::sleep(Duration::from_secs(60)).await;
    Err(sysdb_core::CoreError::internal("stalled call completed"))
}

#[tokio::test]
async fn slow_store_reports_deadline_exceeded() {
    let store = open_store().await;
    let coordinator = Coordinator::new(
        Arc::new(StalledCatalog),
        Arc::new(SqliteDatabaseRepository::new(store.clone())),
        Arc::new(SqliteSegmentRepository::new(store)),
    )
    .with_request_timeout(Duration::from_millis(50));

    let err = coordinator
        .get_tenant(GetTenant {
            name: "acme".into(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), Code::DeadlineExceeded);
}
