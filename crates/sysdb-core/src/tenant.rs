use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Authoritative tenant record.
///
/// A tenant is identified by its name, which never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    /// Tenant name, doubling as its identifier.
    pub id: String,
    /// External resource bound to the tenant. Set at most once.
    pub resource_name: Option<String>,
    /// Epoch seconds up to which the tenant's data has been compacted.
    pub last_compaction_time: i64,
    /// Creation timestamp in UTC.
    pub created_at: DateTime<Utc>,
    /// Update timestamp in UTC.
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    /// Checkpoint value of a tenant that has never been compacted.
    pub const NEVER_COMPACTED: i64 = 0;

    /// Creates a fresh tenant with no resource binding and no checkpoint.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: name.into(),
            resource_name: None,
            last_compaction_time: Self::NEVER_COMPACTED,
            created_at: now,
            updated_at: now,
        }
    }

    /// Returns `true` when no compaction checkpoint was ever recorded.
    #[must_use]
    pub fn never_compacted(&self) -> bool {
        self.last_compaction_time == Self::NEVER_COMPACTED
    }
}

/// Projection of a tenant onto its compaction checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantCompactionTime {
    pub tenant_id: String,
    pub last_compaction_time: i64,
}

/// Request to create a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateTenant {
    pub name: String,
}

/// Request to look a tenant up by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetTenant {
    pub name: String,
}

/// Request to bind an external resource name to a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTenantResourceName {
    pub id: String,
    pub resource_name: String,
}

/// Request to record that a tenant's compaction checkpoint advanced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetTenantCompactionTime {
    pub tenant_id: String,
    pub last_compaction_time: i64,
}
