use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::ids::DatabaseId;

/// Deletion lifecycle of a logical database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseState {
    /// Database is visible to lookups and listings.
    Active,
    /// Database was deleted by a caller and awaits the finalisation sweep.
    SoftDeleted,
}

impl DatabaseState {
    /// Returns the canonical string persisted in SQLite.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::SoftDeleted => "soft_deleted",
        }
    }
}

impl Default for DatabaseState {
    fn default() -> Self {
        Self::Active
    }
}

impl FromStr for DatabaseState {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "soft_deleted" => Ok(Self::SoftDeleted),
            _ => Err(()),
        }
    }
}

/// Metadata describing a logical database within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Database {
    /// Stable database identifier.
    pub id: DatabaseId,
    /// Name, unique within the tenant among active databases.
    pub name: String,
    /// Owning tenant name.
    pub tenant: String,
    /// Logical timestamp of the last write.
    pub ts: i64,
    /// Deletion lifecycle state.
    pub state: DatabaseState,
    /// When the database was soft-deleted, if it was.
    pub deleted_at: Option<DateTime<Utc>>,
    /// Creation timestamp in UTC.
    pub created_at: DateTime<Utc>,
    /// Update timestamp in UTC.
    pub updated_at: DateTime<Utc>,
}

impl Database {
    /// Constructs an active database record.
    #[must_use]
    pub fn new(id: DatabaseId, name: impl Into<String>, tenant: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            tenant: tenant.into(),
            ts: 0,
            state: DatabaseState::Active,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.state == DatabaseState::SoftDeleted
    }
}

/// Request to create a database. `id` arrives in textual form and is parsed
/// during normalisation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDatabase {
    pub id: String,
    pub name: String,
    pub tenant: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDatabase {
    pub name: String,
    pub tenant: String,
}

/// Request for one page of a tenant's active databases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListDatabases {
    pub tenant: String,
    /// Page size; `None` returns every remaining row.
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDatabase {
    pub name: String,
    pub tenant: String,
}

/// Request to physically remove databases soft-deleted before `cutoff`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishDatabaseDeletion {
    pub cutoff: DateTime<Utc>,
}
