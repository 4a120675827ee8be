use serde::{Deserialize, Serialize};

/// Lifecycle of a single file upload.
///
/// `Idle → Initializing → UploadingPart(n) → Finalizing → Completed`, with
/// `Failed` reachable from every active state and `Cancelled` reachable
/// whenever the caller trips the cancellation token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum UploadStatus {
    Idle,
    Initializing,
    UploadingPart { part_number: u32, total_parts: u32 },
    Finalizing,
    Completed,
    Failed,
    Cancelled,
}

impl UploadStatus {
    /// Returns `true` once the upload can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

/// Whole-file progress snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upload_id: String,
    pub status: UploadStatus,
    pub total_bytes: u64,
    pub transferred_bytes: u64,
    /// Integer percentage, 0–100, never decreasing within an upload.
    pub percent: u8,
    #[serde(default)]
    pub bytes_per_second: f64,
}
