//! Part planning, source slicing and progress aggregation for multipart
//! uploads.
//!
//! Nothing in this crate talks to the network; it is the pure half of the
//! upload pipeline.

mod plan;
mod progress;
mod source;
mod validation;

pub use plan::{PartPlan, plan_parts, total_parts};
pub use progress::{ProgressAggregator, SpeedCalculator, overall_percent};
pub use source::{SourceFile, detect_content_type};
pub use validation::validate_upload_filename;

/// Default part size: 50 MiB.
pub const DEFAULT_PART_SIZE: u64 = 50 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid part size: {0}")]
    InvalidPartSize(u64),

    #[error("part {part_number} ({start}..{end}) is outside a {file_size}-byte source")]
    OutOfRange {
        part_number: u32,
        start: u64,
        end: u64,
        file_size: u64,
    },

    #[error("too many parts: {0}")]
    TooManyParts(u64),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),
}
