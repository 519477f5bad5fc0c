use azure_core::error::ErrorKind as AzureErrorKind;
use azure_core::StatusCode;
use cellar_core::StorageError;

/// Maps an SDK error into the shared taxonomy.
///
/// `context` names the operation and target, e.g. `"download blob docs/a"`.
pub(crate) fn classify(context: &str, err: azure_core::error::Error) -> StorageError {
    match err.kind() {
        AzureErrorKind::HttpResponse { status, error_code } => {
            classify_http(context, *status, error_code.as_deref())
        }
        _ => StorageError::Service(format!("{context}: {err}")),
    }
}

/// Pure status/error-code classification, split out so it is testable
/// without constructing SDK errors.
pub(crate) fn classify_http(
    context: &str,
    status: StatusCode,
    error_code: Option<&str>,
) -> StorageError {
    match (status, error_code) {
        (StatusCode::NotFound, _) => StorageError::NotFound(context.to_string()),
        (StatusCode::Conflict, Some("ContainerBeingDeleted")) => {
            StorageError::TransientConflict(context.to_string())
        }
        (StatusCode::Conflict, Some(code)) if code.ends_with("AlreadyExists") => {
            StorageError::AlreadyExists(context.to_string())
        }
        (status, code) => StorageError::Service(format!(
            "{context}: http {status} ({})",
            code.unwrap_or("no error code")
        )),
    }
}
