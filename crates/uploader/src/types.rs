//! Data types for the upload flow.

use clipvault_protocol::{UploadProgress, UploadStatus};
use clipvault_transfer::DEFAULT_PART_SIZE;
use clipvault_upload_api::RetryPolicy;
use serde::{Deserialize, Serialize};

/// Receives the whole-file percentage (0–100, non-decreasing).
///
/// The callback may borrow local state for the duration of the upload.
pub type ProgressFn<'a> = dyn Fn(u8) + Send + Sync + 'a;

/// MIME type sent when neither the caller nor the extension names one.
pub const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Options for one orchestrator.
#[derive(Debug, Clone)]
pub struct UploadOptions {
    /// Bytes per part; the last part may be smaller.
    pub part_size: u64,
    /// Retry budget applied to every part PUT.
    pub retry: RetryPolicy,
    /// Parts in flight at once. `1` uploads strictly in order.
    pub concurrency: usize,
    /// Overrides extension-based content-type detection.
    pub content_type: Option<String>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            part_size: DEFAULT_PART_SIZE,
            retry: RetryPolicy::default(),
            concurrency: 1,
            content_type: None,
        }
    }
}

/// Event emitted while an upload runs.
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    /// The state machine moved.
    StateChanged(UploadStatus),
    /// Whole-file progress changed.
    Progress(UploadProgress),
    /// A part was stored and its ETag recorded.
    PartCompleted {
        part_number: u32,
        etag: String,
        bytes: u64,
    },
    /// The session was finalized.
    Completed { storage_key: String },
    /// The upload aborted.
    Failed { error: String },
}

impl UploadEvent {
    /// True for the events that end an upload: `Completed`, `Failed` and a
    /// change into a terminal state.
    pub fn is_terminal(&self) -> bool {
        match self {
            Self::StateChanged(status) => status.is_terminal(),
            Self::Completed { .. } | Self::Failed { .. } => true,
            Self::Progress(_) | Self::PartCompleted { .. } => false,
        }
    }
}

/// Outcome of a successful upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadResult {
    pub s3_key: String,
}
