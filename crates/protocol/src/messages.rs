use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// A part that storage accepted, identified by its ETag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    pub part_number: u32,
    pub etag: String,
}

/// Finalizes a session. `parts` must be sorted by `part_number`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteUploadRequest {
    pub s3_key: String,
    pub upload_id: String,
    pub parts: Vec<CompletedPart>,
}

// ---------------------------------------------------------------------------
// Response payloads
// ---------------------------------------------------------------------------

/// Returned when a session is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    pub s3_key: String,
    pub upload_id: String,
}

/// Presigned URL for a single part PUT.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartPresignResponse {
    pub upload_url: String,
}

/// Playback location of a finished object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackUrlResponse {
    #[serde(alias = "url")]
    pub playback_url: String,
}
