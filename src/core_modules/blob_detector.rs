// THEORY:
// The `blob_detector` drives the labeler over a whole scan window. It is the
// only entry point that touches every pixel, and it owns the per-call scratch
// memory.
//
// Key steps:
// 1.  **Validation**: strides must be non-zero, the region of interest is
//     clipped to the image and must keep some area, and the threshold list may
//     hold at most one entry per bit of the code mask. Nothing is allocated
//     before these pass, and an empty threshold list is a successful no-op.
// 2.  **Scratch**: the visited bitmap and the span stack are reserved together
//     from one `ScratchArena`. If either does not fit, the call fails before a
//     single pixel is read.
// 3.  **Multi-threshold raster scan**: thresholds run in list order, each
//     tagged with bit `1 << index`. For every seed position that is unclaimed
//     and passes, the labeler claims its region. Claims are shared across
//     thresholds, so earlier thresholds win contested pixels. Regions below the
//     size filters are dropped but their pixels stay claimed.
// 4.  **Merge**: if configured, the surviving blobs go through the merge pass.
//
// The detector is synchronous and keeps no state between calls. Running it
// twice on the same input gives the same list in the same order.

use log::{debug, trace, warn};

use crate::core_modules::blob::{Blob, MAX_THRESHOLDS, ThresholdCode};
use crate::core_modules::blob_merger::merge_blobs;
use crate::core_modules::error::{BlobError, Result};
use crate::core_modules::flood_fill::Labeler;
use crate::core_modules::image_view::ImageView;
use crate::core_modules::pixel::PixelFormat;
use crate::core_modules::scratch::ScratchArena;
use crate::core_modules::threshold::Threshold;
use crate::pipeline::BlobConfig;

/// Labels every region of `image` that passes one of `thresholds`.
pub fn find_blobs<F: PixelFormat>(
    image: &ImageView<'_, F>,
    thresholds: &[Threshold],
    config: &BlobConfig,
) -> Result<Vec<Blob>> {
    find_blobs_with(image, thresholds, config, |_| true, |_, _| true)
}

/// Like [`find_blobs`], with a caller filter applied after the size filters
/// and a caller predicate consulted for every merge candidate pair.
pub fn find_blobs_with<F: PixelFormat>(
    image: &ImageView<'_, F>,
    thresholds: &[Threshold],
    config: &BlobConfig,
    mut accept: impl FnMut(&Blob) -> bool,
    can_merge: impl FnMut(&Blob, &Blob) -> bool,
) -> Result<Vec<Blob>> {
    // --- 1. Validation ---
    if config.x_stride == 0 || config.y_stride == 0 {
        return Err(BlobError::InvalidScanStep {
            x_stride: config.x_stride,
            y_stride: config.y_stride,
        });
    }

    let bounds = image.bounds();
    let requested = config.roi.unwrap_or(bounds);
    let window = requested
        .intersection(&bounds)
        .ok_or(BlobError::InvalidRegion {
            roi: requested,
            width: image.width(),
            height: image.height(),
        })?;

    if thresholds.len() > MAX_THRESHOLDS {
        return Err(BlobError::TooManyThresholds {
            count: thresholds.len(),
            max: MAX_THRESHOLDS,
        });
    }
    if thresholds.is_empty() {
        return Ok(Vec::new());
    }

    // --- 2. Scratch ---
    let mut arena = ScratchArena::from_limit(config.scratch_limit);
    let mut labeler = Labeler::new(*image, window, &mut arena)?;
    debug!(
        "{} scan of {} in {}x{} image, {} threshold(s), {} scratch bytes",
        F::NAME,
        window,
        image.width(),
        image.height(),
        thresholds.len(),
        arena.used()
    );

    // --- 3. Multi-threshold raster scan ---
    let x_start = window.x as usize;
    let x_end = window.right() as usize;
    let y_start = window.y as usize;
    let y_end = window.bottom() as usize;

    let mut blobs = Vec::new();
    for (index, threshold) in thresholds.iter().enumerate() {
        let code: ThresholdCode = 1 << index;
        let mut regions = 0usize;

        for y in (y_start..y_end).step_by(config.y_stride) {
            let first = x_start + y % config.x_stride;
            for x in (first..x_end).step_by(config.x_stride) {
                if !labeler.is_seed(x, y, threshold, config.invert) {
                    continue;
                }
                let blob = labeler.fill(x, y, threshold, config.invert).to_blob(code);
                regions += 1;

                if blob.pixels >= config.pixels_threshold
                    && blob.area() >= config.area_threshold
                    && accept(&blob)
                {
                    blobs.push(blob);
                }
            }
        }

        trace!(
            "threshold #{index} [{threshold}]: {regions} region(s), {} blob(s) kept so far",
            blobs.len()
        );
    }

    if labeler.saturated_spans() > 0 {
        warn!(
            "span stack full ({} deep) on {} span(s); some regions were split",
            labeler.stack_high_water(),
            labeler.saturated_spans()
        );
    }
    drop(labeler);

    // --- 4. Merge ---
    if let Some(merge) = &config.merge {
        blobs = merge_blobs(blobs, &merge.margins, can_merge);
    }

    debug!("found {} blob(s)", blobs.len());
    Ok(blobs)
}
