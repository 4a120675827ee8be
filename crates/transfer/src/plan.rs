use std::ops::Range;

use crate::TransferError;

/// One contiguous byte range of the source, uploaded as a single PUT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartPlan {
    /// 1-based part number, contiguous within a session.
    pub part_number: u32,
    /// Inclusive start offset.
    pub start: u64,
    /// Exclusive end offset.
    pub end: u64,
}

impl PartPlan {
    /// Size of this part in bytes.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Byte range as a `Range<u64>`.
    pub fn range(&self) -> Range<u64> {
        self.start..self.end
    }
}

/// Number of parts needed for `file_size` bytes: `ceil(file_size / part_size)`.
pub fn total_parts(file_size: u64, part_size: u64) -> Result<u32, TransferError> {
    if part_size == 0 {
        return Err(TransferError::InvalidPartSize(part_size));
    }
    let parts = file_size.div_ceil(part_size);
    u32::try_from(parts).map_err(|_| TransferError::TooManyParts(parts))
}

/// Partitions `file_size` bytes into 1-indexed parts of at most `part_size`.
///
/// A zero-byte source yields an empty plan; callers decide whether that
/// is acceptable.
pub fn plan_parts(file_size: u64, part_size: u64) -> Result<Vec<PartPlan>, TransferError> {
    let count = total_parts(file_size, part_size)?;
    let plan = (1..=count)
        .map(|part_number| {
            let start = u64::from(part_number - 1) * part_size;
            PartPlan {
                part_number,
                start,
                end: file_size.min(start + part_size),
            }
        })
        .collect();
    Ok(plan)
}
