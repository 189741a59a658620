use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{CollectionId, SegmentId};

/// Role label (e.g. `"hnsw_index"`) → ordered list of storage file paths.
pub type FilePaths = BTreeMap<String, Vec<String>>;

/// Typed segment metadata map.
pub type SegmentMetadata = BTreeMap<String, SegmentMetadataValue>;

/// A single typed metadata value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SegmentMetadataValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

/// Which part of a collection a segment stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentScope {
    Vector,
    Metadata,
    Record,
}

impl SegmentScope {
    /// Returns the canonical lowercase string stored in SQLite.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Metadata => "metadata",
            Self::Record => "record",
        }
    }
}

impl FromStr for SegmentScope {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "vector" => Ok(Self::Vector),
            "metadata" => Ok(Self::Metadata),
            "record" => Ok(Self::Record),
            _ => Err(()),
        }
    }
}

/// Storage segment belonging to a collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub id: SegmentId,
    /// Implementation tag, e.g. `"urn:sysdb:segment/vector/hnsw"`.
    pub segment_type: String,
    pub scope: SegmentScope,
    pub collection_id: CollectionId,
    pub metadata: Option<SegmentMetadata>,
    /// Logical timestamp of the last metadata write.
    pub ts: i64,
    /// Where the compacted artifacts of this segment live.
    pub file_paths: FilePaths,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Segment {
    /// Creates a segment without metadata or compacted files.
    #[must_use]
    pub fn new(
        id: SegmentId,
        segment_type: impl Into<String>,
        scope: SegmentScope,
        collection_id: CollectionId,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            segment_type: segment_type.into(),
            scope,
            collection_id,
            metadata: None,
            ts: 0,
            file_paths: FilePaths::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Returns `true` iff every supplied criterion matches `segment` exactly.
///
/// `None` and nil identifiers are wildcards. Criteria are checked in order and
/// evaluation stops at the first mismatch.
#[must_use]
pub fn filter_segments(
    segment: &Segment,
    id: Option<SegmentId>,
    segment_type: Option<&str>,
    scope: Option<SegmentScope>,
    collection_id: Option<CollectionId>,
) -> bool {
    if let Some(id) = id.filter(|id| !id.is_nil()) {
        if segment.id != id {
            return false;
        }
    }
    if let Some(segment_type) = segment_type {
        if segment.segment_type != segment_type {
            return false;
        }
    }
    if let Some(scope) = scope {
        if segment.scope != scope {
            return false;
        }
    }
    if let Some(collection_id) = collection_id.filter(|id| !id.is_nil()) {
        if segment.collection_id != collection_id {
            return false;
        }
    }
    true
}

/// Declarative selection criteria for segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentFilter {
    pub id: Option<SegmentId>,
    pub segment_type: Option<String>,
    pub scope: Option<SegmentScope>,
    pub collection_id: Option<CollectionId>,
}

impl SegmentFilter {
    #[must_use]
    pub fn matches(&self, segment: &Segment) -> bool {
        filter_segments(
            segment,
            self.id,
            self.segment_type.as_deref(),
            self.scope,
            self.collection_id,
        )
    }

    /// Applies the filter to a batch of segments, preserving their order.
    #[must_use]
    pub fn apply(&self, segments: Vec<Segment>) -> Vec<Segment> {
        segments.into_iter().filter(|s| self.matches(s)).collect()
    }
}

pub type GetSegments = SegmentFilter;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSegment {
    pub id: SegmentId,
    pub segment_type: String,
    pub scope: SegmentScope,
    pub collection_id: CollectionId,
    pub metadata: Option<SegmentMetadata>,
}

/// Metadata update for a segment.
///
/// With `reset_metadata` the stored map is replaced by `metadata` (clearing it
/// when `None`); otherwise `metadata` is merged key by key into the stored map.
/// A supplied `collection_id` moves the segment to that collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSegment {
    pub id: SegmentId,
    pub collection_id: Option<CollectionId>,
    pub metadata: Option<SegmentMetadata>,
    pub reset_metadata: bool,
    pub ts: Option<i64>,
}

/// Replaces the complete file-path mapping of one segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushSegmentCompaction {
    pub id: SegmentId,
    pub file_paths: FilePaths,
}

/// Flushes every segment of a collection and advances the owning tenant's
/// compaction checkpoint as one unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushCollectionCompaction {
    pub tenant_id: String,
    pub collection_id: CollectionId,
    pub segments: Vec<FlushSegmentCompaction>,
    pub compaction_time: i64,
}
