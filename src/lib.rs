// THEORY:
// This file is the entry point for the `waldo_blobs` library crate. The engine
// lives in `core_modules`, one module per stage (pixel formats and views, the
// visited bitmap and span stack, the flood-fill labeler, the multi-threshold
// driver and the merge pass). `pipeline` wraps it in a reusable synchronous
// API and `parallel_pipeline` fans independent frames out over a worker pool.
//
// The types most callers need are re-exported here.

pub mod core_modules;
pub mod parallel_pipeline;
pub mod pipeline;

pub use core_modules::blob::{Blob, MAX_THRESHOLDS, ThresholdCode};
pub use core_modules::blob_detector::{find_blobs, find_blobs_with};
pub use core_modules::blob_merger::merge_blobs;
pub use core_modules::error::{BlobError, Result};
pub use core_modules::geometry::{Margins, Point, Rect};
pub use core_modules::image_view::{BinaryView, FrameBuffer, GrayscaleView, ImageView, PixelKind, Rgb565View};
pub use core_modules::threshold::{ParseThresholdError, Threshold};
pub use pipeline::{BlobConfig, BlobPipeline, MergeConfig};
