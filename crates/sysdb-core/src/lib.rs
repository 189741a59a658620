//! Core domain types and traits for the SysDB metadata coordinator.

pub mod database;
pub mod error;
pub mod ids;
pub mod segment;
pub mod tenant;
pub mod traits;

pub use database::{
    CreateDatabase, Database, DatabaseState, DeleteDatabase, FinishDatabaseDeletion,
    GetDatabase, ListDatabases,
};
pub use error::{CoreError, CoreResult};
pub use ids::{CollectionId, DatabaseId, SegmentId};
pub use segment::{
    filter_segments, CreateSegment, FilePaths, FlushCollectionCompaction,
    FlushSegmentCompaction, GetSegments, Segment, SegmentFilter, SegmentMetadata,
    SegmentMetadataValue, SegmentScope, UpdateSegment,
};
pub use tenant::{
    CreateTenant, GetTenant, SetTenantCompactionTime, SetTenantResourceName, Tenant,
    TenantCompactionTime,
};
pub use traits::{DatabaseRepository, SegmentRepository, TenantCatalog};
