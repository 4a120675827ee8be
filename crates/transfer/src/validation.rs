use crate::TransferError;

/// Validates a file name before it is sent to the backend.
///
/// Rejects:
/// - Empty or whitespace-only names
/// - Path separators (`/` or `\`)
/// - The special names `.` and `..`
/// - Control characters
pub fn validate_upload_filename(file_name: &str) -> Result<(), TransferError> {
    if file_name.trim().is_empty() {
        return Err(TransferError::InvalidFilename("empty file name".into()));
    }

    if file_name == "." || file_name == ".." {
        return Err(TransferError::InvalidFilename(format!(
            "reserved name: {file_name}"
        )));
    }

    if file_name.contains(['/', '\\']) {
        return Err(TransferError::InvalidFilename(format!(
            "path separators not allowed: {file_name}"
        )));
    }

    if file_name.chars().any(char::is_control) {
        return Err(TransferError::InvalidFilename(format!(
            "control characters not allowed: {}",
            file_name.escape_debug()
        )));
    }

    Ok(())
}
