//! Upload error types.

use clipvault_transfer::TransferError;
use clipvault_upload_api::{Error as ApiError, PartUploadError, StorageError};

/// Errors that abort an upload. There is no partial success: any of these
/// ends the invocation and the session is abandoned.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("session init failed: {0}")]
    SessionInit(#[source] ApiError),

    #[error("credential request for part {part_number} failed: {source}")]
    Credential {
        part_number: u32,
        #[source]
        source: ApiError,
    },

    #[error(transparent)]
    PartUpload(#[from] PartUploadError),

    #[error("completion failed: {0}")]
    Completion(#[source] ApiError),

    #[error("cancelled")]
    Cancelled,

    #[error("file is empty")]
    EmptyFile,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid upload plan: {0}")]
    InvalidPlan(#[source] TransferError),
}

impl From<TransferError> for UploadError {
    fn from(e: TransferError) -> Self {
        match e {
            TransferError::Io(io) => Self::Io(io),
            other => Self::InvalidPlan(other),
        }
    }
}

impl UploadError {
    /// Maps an error from [`PartUploader::put`](clipvault_upload_api::PartUploader::put).
    pub(crate) fn from_part(part_number: u32, e: ApiError) -> Self {
        match e {
            ApiError::Cancelled => Self::Cancelled,
            ApiError::PartUpload(e) => Self::PartUpload(e),
            other => Self::PartUpload(PartUploadError {
                part_number,
                attempts: 0,
                last_error: StorageError::Transport(other.to_string()),
            }),
        }
    }

    /// Returns `true` if the caller cancelled the upload.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}
