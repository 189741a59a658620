use thiserror::Error;

/// Canonical error type produced by the persistence access layer.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Entity was not found in the metadata store.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"tenant"`).
        entity: &'static str,
        /// Identifier of the missing entity.
        id: String,
    },

    /// Entity already exists and cannot be created again.
    #[error("{entity} `{id}` already exists")]
    AlreadyExists {
        /// Entity type name (e.g. `"database"`).
        entity: &'static str,
        /// Identifier that conflicts.
        id: String,
    },

    /// A set-once attribute was already assigned.
    #[error("{entity} `{id}` already has a {field} bound")]
    AlreadyBound {
        /// Entity type name.
        entity: &'static str,
        /// Identifier of the entity whose attribute is already set.
        id: String,
        /// Name of the set-once attribute.
        field: &'static str,
    },

    /// Storage failure that is not otherwise classified.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for server-side diagnostics only.
        message: String,
    },
}

impl CoreError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates an `AlreadyExists` variant.
    #[must_use]
    pub fn already_exists(entity: &'static str, id: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            id: id.into(),
        }
    }

    /// Creates an `AlreadyBound` variant.
    #[must_use]
    pub fn already_bound(entity: &'static str, id: impl Into<String>, field: &'static str) -> Self {
        Self::AlreadyBound {
            entity,
            id: id.into(),
            field,
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` for the `NotFound` variant.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::internal(format!("json: {err}"))
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
