//! Multipart upload orchestrator.
//!
//! This crate implements the **business logic** of uploading one media
//! file as a multipart object. It has no HTTP code of its own: the
//! backend and storage are reached through the [`UploadBackend`] and
//! [`PartStorage`] traits from `clipvault-upload-api`.
//!
//! # Pipeline
//!
//! 1. **Plan**: split the file into 1-indexed, contiguous parts
//! 2. **Init**: open a session for the filename and content type
//! 3. **Upload**: per part, request a presigned URL and PUT the bytes
//! 4. **Finalize**: submit the ETags sorted by part number

pub mod error;
pub mod orchestrator;
pub mod types;

use std::path::Path;
use std::sync::Arc;

use clipvault_upload_api::{PartStorage, UploadBackend};

// Re-export primary types for convenience.
pub use error::UploadError;
pub use orchestrator::UploadOrchestrator;
pub use types::{FALLBACK_CONTENT_TYPE, ProgressFn, UploadEvent, UploadOptions, UploadResult};

/// Uploads the file at `path` as a temporary main video with default
/// options, returning its storage key.
pub async fn upload_temp_main_video(
    backend: Arc<dyn UploadBackend>,
    storage: Arc<dyn PartStorage>,
    path: &Path,
    on_progress: Option<&ProgressFn<'_>>,
) -> Result<UploadResult, UploadError> {
    UploadOrchestrator::new(backend, storage, UploadOptions::default())
        .upload_path(path, on_progress)
        .await
}
