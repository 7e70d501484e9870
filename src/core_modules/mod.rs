pub mod bitmap;
pub mod blob;
pub mod blob_detector;
pub mod blob_merger;
pub mod error;
pub mod flood_fill;
pub mod geometry;
pub mod image_view;
pub mod pixel;
pub mod scratch;
pub mod span_stack;
pub mod threshold;
pub mod utils;
