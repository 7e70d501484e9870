// THEORY:
// Every failure the engine can report to a caller lives in one enum. Scratch
// allocation and argument validation happen before the first pixel is tested,
// so an `Err` always means "nothing was scanned". Broken internal contracts
// (a span stack pushed past capacity, an unchecked bitmap index out of range)
// are not represented here: they panic, because continuing would corrupt blob
// statistics.

use crate::core_modules::geometry::Rect;

/// Errors returned by the blob engine.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BlobError {
    /// The region of interest is empty or misses the image entirely.
    #[error("region of interest {roi} does not overlap the {width}x{height} image")]
    InvalidRegion {
        roi: Rect,
        width: usize,
        height: usize,
    },
    /// A scratch buffer could not be reserved.
    #[error("scratch allocation of {requested} bytes failed ({available} bytes available)")]
    OutOfMemory { requested: usize, available: usize },
    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("row stride {stride} is shorter than the row length {row_len}")]
    InvalidStride { stride: usize, row_len: usize },
    #[error("scan steps must be at least 1 (x_stride={x_stride}, y_stride={y_stride})")]
    InvalidScanStep { x_stride: usize, y_stride: usize },
    /// Each threshold owns one bit of the blob code mask.
    #[error("{count} thresholds exceed the {max}-bit code mask")]
    TooManyThresholds { count: usize, max: usize },
    #[error("worker pool has shut down")]
    PoolClosed,
}

pub type Result<T> = std::result::Result<T, BlobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_region_message_names_the_roi() {
        let err = BlobError::InvalidRegion {
            roi: Rect::new(50, 50, 4, 4),
            width: 10,
            height: 10,
        };
        assert_eq!(
            err.to_string(),
            "region of interest (50, 50, 4, 4) does not overlap the 10x10 image"
        );
    }
}
