//! Wire types for the clipvault temp-upload API.
//!
//! The backend speaks multipart forms for session/presign requests and
//! JSON for completion; storage is reached through presigned URLs.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    CompleteUploadRequest, CompletedPart, InitUploadResponse, PartPresignResponse,
    PlaybackUrlResponse,
};
pub use types::{UploadProgress, UploadStatus};
