use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::debug;

use crate::TransferError;
use crate::plan::PartPlan;

// ---------------------------------------------------------------------------
// SourceFile
// ---------------------------------------------------------------------------

/// Read-only source of an upload, sliced into parts on demand.
///
/// Parts are read lazily, one at a time, so a multi-gigabyte video never
/// has to fit in memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    file_name: String,
    size: u64,
    backing: Backing,
}

#[derive(Debug, Clone)]
enum Backing {
    Disk(PathBuf),
    Memory(Bytes),
}

impl SourceFile {
    /// Opens `path` and records its current size.
    pub async fn open(path: &Path) -> Result<Self, TransferError> {
        let metadata = tokio::fs::metadata(path).await?;
        if !metadata.is_file() {
            return Err(TransferError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            )));
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        debug!(path = %path.display(), bytes = metadata.len(), "source file opened");
        Ok(Self {
            file_name,
            size: metadata.len(),
            backing: Backing::Disk(path.to_path_buf()),
        })
    }

    /// Wraps an in-memory buffer.
    pub fn from_bytes(file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            file_name: file_name.into(),
            size: data.len() as u64,
            backing: Backing::Memory(data),
        }
    }

    /// File name sent to the backend when a session is created.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Total size in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Reads the bytes of one planned part.
    pub async fn read_part(&self, part: &PartPlan) -> Result<Bytes, TransferError> {
        if part.end > self.size || part.start > part.end {
            return Err(TransferError::OutOfRange {
                part_number: part.part_number,
                start: part.start,
                end: part.end,
                file_size: self.size,
            });
        }

        match &self.backing {
            Backing::Memory(data) => Ok(data.slice(part.start as usize..part.end as usize)),
            Backing::Disk(path) => {
                let mut file = tokio::fs::File::open(path).await?;
                file.seek(SeekFrom::Start(part.start)).await?;
                let mut buf = vec![0u8; part.len() as usize];
                file.read_exact(&mut buf).await?;
                Ok(Bytes::from(buf))
            }
        }
    }
}

/// Guesses a MIME type from a video file's extension.
pub fn detect_content_type(file_name: &str) -> Option<&'static str> {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("mp4" | "m4v") => Some("video/mp4"),
        Some("mov") => Some("video/quicktime"),
        Some("webm") => Some("video/webm"),
        Some("mkv") => Some("video/x-matroska"),
        Some("avi") => Some("video/x-msvideo"),
        Some("ts") => Some("video/mp2t"),
        Some("mpg" | "mpeg") => Some("video/mpeg"),
        _ => None,
    }
}
