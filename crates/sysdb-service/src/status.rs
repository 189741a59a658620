use sysdb_core::CoreError;
use tonic::Status;

/// Translates a domain error into the status handed to the transport layer.
///
/// The underlying error is recorded as a diagnostic event. Internal failures
/// reach the caller only as a generic message naming the operation.
pub fn status_from_core(operation: &'static str, err: CoreError) -> Status {
    tracing::error!(operation, error = %err, "coordinator operation failed");

    match err {
        CoreError::NotFound { .. } => Status::not_found(err.to_string()),
        CoreError::AlreadyExists { .. } => Status::already_exists(err.to_string()),
        CoreError::AlreadyBound { .. } => Status::failed_precondition(err.to_string()),
        CoreError::Internal { .. } => Status::internal(format!("{operation} failed")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tonic::Code;

    #[test]
    fn domain_kinds_map_to_distinct_codes() {
        let not_found = status_from_core("get_tenant", CoreError::not_found("tenant", "acme"));
        assert_eq!(not_found.code(), Code::NotFound);
        assert!(not_found.message().contains("acme"));

        let conflict =
            status_from_core("create_tenant", CoreError::already_exists("tenant", "acme"));
        assert_eq!(conflict.code(), Code::AlreadyExists);

        let bound = status_from_core(
            "set_tenant_resource_name",
            CoreError::already_bound("tenant", "acme", "resource name"),
        );
        assert_eq!(bound.code(), Code::FailedPrecondition);
        assert!(bound.message().contains("acme"));
    }

    #[test]
    fn internal_errors_are_not_leaked() {
        let status = status_from_core(
            "list_databases",
            CoreError::internal("no such table: databases"),
        );
        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "list_databases failed");
    }
}
