// THEORY:
// The `pipeline` module is the top-level synchronous API. It pairs a validated
// threshold list with a `BlobConfig` so callers can run the same detection over
// many frames without rebuilding either, and it dispatches owned frames of any
// pixel format to the generic detector.

use log::debug;

use crate::core_modules::blob::{Blob, MAX_THRESHOLDS};
use crate::core_modules::blob_detector;
use crate::core_modules::error::{BlobError, Result};
use crate::core_modules::geometry::{Margins, Rect};
use crate::core_modules::image_view::{BinaryView, FrameBuffer, GrayscaleView, ImageView, Rgb565View};
use crate::core_modules::pixel::PixelFormat;
use crate::core_modules::threshold::Threshold;

/// Parameters for the optional merge pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MergeConfig {
    /// Growth applied to the second blob of each pair before the overlap test.
    pub margins: Margins,
}

/// Tunables for one detector call.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlobConfig {
    /// Scan window; `None` scans the whole image. Clipped to the image bounds.
    pub roi: Option<Rect>,
    /// Column step between seed candidates. Fills are never strided.
    pub x_stride: usize,
    /// Row step between seed candidates.
    pub y_stride: usize,
    pub invert: bool,
    /// Minimum bounding-box area of an emitted blob.
    pub area_threshold: u64,
    /// Minimum pixel count of an emitted blob.
    pub pixels_threshold: u32,
    /// Runs the merge pass when set.
    pub merge: Option<MergeConfig>,
    /// Byte budget for the visited bitmap and span stack together.
    pub scratch_limit: Option<usize>,
}

impl Default for BlobConfig {
    fn default() -> Self {
        Self {
            roi: None,
            x_stride: 1,
            y_stride: 1,
            invert: false,
            area_threshold: 1,
            pixels_threshold: 1,
            merge: None,
            scratch_limit: None,
        }
    }
}

/// A reusable detector: one configuration, one threshold list, any number of
/// frames.
#[derive(Debug, Clone)]
pub struct BlobPipeline {
    config: BlobConfig,
    thresholds: Vec<Threshold>,
}

impl BlobPipeline {
    pub fn new(config: BlobConfig, thresholds: Vec<Threshold>) -> Result<Self> {
        if thresholds.len() > MAX_THRESHOLDS {
            return Err(BlobError::TooManyThresholds {
                count: thresholds.len(),
                max: MAX_THRESHOLDS,
            });
        }
        if config.x_stride == 0 || config.y_stride == 0 {
            return Err(BlobError::InvalidScanStep {
                x_stride: config.x_stride,
                y_stride: config.y_stride,
            });
        }
        debug!("pipeline ready with {} threshold(s): {:?}", thresholds.len(), config);
        Ok(Self { config, thresholds })
    }

    pub fn config(&self) -> &BlobConfig {
        &self.config
    }

    pub fn thresholds(&self) -> &[Threshold] {
        &self.thresholds
    }

    pub fn find_blobs<F: PixelFormat>(&self, image: &ImageView<'_, F>) -> Result<Vec<Blob>> {
        blob_detector::find_blobs(image, &self.thresholds, &self.config)
    }

    /// Runs the detector over an owned frame in whichever format it holds.
    pub fn process_frame(&self, frame: &FrameBuffer) -> Result<Vec<Blob>> {
        match frame {
            FrameBuffer::Binary {
                width,
                height,
                words,
            } => self.find_blobs(&BinaryView::from_slice(*width, *height, words)?),
            FrameBuffer::Grayscale {
                width,
                height,
                pixels,
            } => self.find_blobs(&GrayscaleView::from_slice(*width, *height, pixels)?),
            FrameBuffer::Rgb565 {
                width,
                height,
                pixels,
            } => self.find_blobs(&Rgb565View::from_slice(*width, *height, pixels)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::pixel::rgb888_to_rgb565;

    #[test]
    fn rejects_more_thresholds_than_code_bits() {
        let err = BlobPipeline::new(BlobConfig::default(), vec![Threshold::default(); 40]).unwrap_err();
        assert_eq!(err, BlobError::TooManyThresholds { count: 40, max: 32 });
    }

    #[test]
    fn rejects_zero_strides_up_front() {
        let config = BlobConfig {
            x_stride: 0,
            ..BlobConfig::default()
        };
        assert!(matches!(
            BlobPipeline::new(config, vec![Threshold::binary()]),
            Err(BlobError::InvalidScanStep { .. })
        ));
    }

    #[test]
    fn dispatches_every_frame_format() {
        let inside = |x: usize, y: usize| (2..5).contains(&x) && (1..3).contains(&y);

        let binary = FrameBuffer::binary_from_fn(8, 4, inside);
        let gray = FrameBuffer::grayscale_from_fn(8, 4, |x, y| if inside(x, y) { 200 } else { 10 });
        let red = rgb888_to_rgb565(255, 0, 0);
        let color = FrameBuffer::rgb565_from_fn(8, 4, |x, y| if inside(x, y) { red } else { 0 });

        let cases = [
            (binary, Threshold::binary()),
            (gray, Threshold::grayscale(128, 255)),
            // Strongly positive a* picks out red.
            (color, Threshold::new(0, 100, 40, 127, 0, 127)),
        ];
        for (frame, threshold) in cases {
            let pipeline = BlobPipeline::new(BlobConfig::default(), vec![threshold]).unwrap();
            let blobs = pipeline.process_frame(&frame).unwrap();
            assert_eq!(blobs.len(), 1, "{:?}", frame.kind());
            assert_eq!(blobs[0].rect, Rect::new(2, 1, 3, 2));
            assert_eq!(blobs[0].pixels, 6);
        }
    }

    #[test]
    fn default_config_scans_everything_once() {
        let config = BlobConfig::default();
        assert_eq!((config.x_stride, config.y_stride), (1, 1));
        assert_eq!(config.pixels_threshold, 1);
        assert!(config.roi.is_none() && config.merge.is_none());
    }
}
