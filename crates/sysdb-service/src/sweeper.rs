use chrono::Utc;
use sysdb_core::FinishDatabaseDeletion;

use crate::coordinator::Coordinator;

/// Runs one deletion sweep for databases soft-deleted longer than `grace` ago.
///
/// Returns the number of removed databases, or `None` when the sweep failed.
/// Failures are logged here and left for the next pass to retry.
pub async fn sweep_expired_databases(
    coordinator: &Coordinator,
    grace: chrono::Duration,
) -> Option<u64> {
    let cutoff = Utc::now() - grace;
    match coordinator
        .finish_database_deletion(FinishDatabaseDeletion { cutoff })
        .await
    {
        Ok(removed) => Some(removed),
        Err(status) => {
            tracing::warn!(
                code = ?status.code(),
                message = status.message(),
                "database deletion sweep failed, retrying next tick"
            );
            None
        }
    }
}
