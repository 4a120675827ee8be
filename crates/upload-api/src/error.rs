//! Error types for backend and storage calls.

use clipvault_protocol::constants::ERROR_BODY_LIMIT;

/// Errors from the upload API crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid auth token")]
    InvalidToken,

    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(String),

    #[error(transparent)]
    PartUpload(#[from] PartUploadError),

    #[error("cancelled")]
    Cancelled,
}

/// Failure of a single storage PUT attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("missing etag")]
    MissingEtag,
}

/// A part PUT that failed on every allowed attempt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("part {part_number} failed after {attempts} attempt(s): {last_error}")]
pub struct PartUploadError {
    pub part_number: u32,
    pub attempts: u32,
    pub last_error: StorageError,
}

/// Truncates a response body for logs and error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    match body.char_indices().nth(ERROR_BODY_LIMIT) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}
