// Conversions between the `image` crate and `FrameBuffer`, plus a PNG overlay
// for eyeballing detector output.

use std::path::Path;

use image::{DynamicImage, ImageResult, Rgb, RgbImage};

use crate::core_modules::blob::Blob;
use crate::core_modules::image_view::{FrameBuffer, PixelKind};
use crate::core_modules::pixel::{BinaryFormat, PixelFormat, rgb565_to_rgb888, rgb888_to_rgb565};

const OVERLAY_PALETTE: [[u8; 3]; 6] = [
    [255, 64, 64],
    [64, 255, 64],
    [64, 128, 255],
    [255, 255, 64],
    [255, 64, 255],
    [64, 255, 255],
];
const CENTROID_ARM: i32 = 2;

/// Converts a decoded image into a frame of `kind`. Binary frames set a bit
/// wherever luma is at least `binary_cutoff`.
pub fn frame_from_dynamic(image: &DynamicImage, kind: PixelKind, binary_cutoff: u8) -> FrameBuffer {
    let (width, height) = (image.width() as usize, image.height() as usize);
    match kind {
        PixelKind::Binary => {
            let luma = image.to_luma8();
            FrameBuffer::binary_from_fn(width, height, |x, y| {
                luma.get_pixel(x as u32, y as u32)[0] >= binary_cutoff
            })
        }
        PixelKind::Grayscale => FrameBuffer::Grayscale {
            width,
            height,
            pixels: image.to_luma8().into_raw(),
        },
        PixelKind::Rgb565 => {
            let rgb = image.to_rgb8();
            FrameBuffer::rgb565_from_fn(width, height, |x, y| {
                let Rgb([r, g, b]) = *rgb.get_pixel(x as u32, y as u32);
                rgb888_to_rgb565(r, g, b)
            })
        }
    }
}

pub fn load_frame(path: impl AsRef<Path>, kind: PixelKind, binary_cutoff: u8) -> ImageResult<FrameBuffer> {
    let image = image::open(path)?;
    Ok(frame_from_dynamic(&image, kind, binary_cutoff))
}

/// Renders a frame as 8-bit RGB.
pub fn frame_to_rgb(frame: &FrameBuffer) -> RgbImage {
    let (width, height) = (frame.width() as u32, frame.height() as u32);
    match frame {
        FrameBuffer::Binary { width: w, words, .. } => {
            let row_len = BinaryFormat::row_len(*w);
            RgbImage::from_fn(width, height, |x, y| {
                let row = &words[y as usize * row_len..(y as usize + 1) * row_len];
                let v = if BinaryFormat::bit(row, x as usize) { 255 } else { 0 };
                Rgb([v, v, v])
            })
        }
        FrameBuffer::Grayscale { pixels, .. } => RgbImage::from_fn(width, height, |x, y| {
            let v = pixels[(y * width + x) as usize];
            Rgb([v, v, v])
        }),
        FrameBuffer::Rgb565 { pixels, .. } => RgbImage::from_fn(width, height, |x, y| {
            let (r, g, b) = rgb565_to_rgb888(pixels[(y * width + x) as usize]);
            Rgb([r, g, b])
        }),
    }
}

fn put_clipped(canvas: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

/// Draws each blob's box outline and a small cross at its centroid, coloured
/// by the lowest threshold that contributed to it.
pub fn draw_blobs(canvas: &mut RgbImage, blobs: &[Blob]) {
    for blob in blobs {
        let slot = blob.code.trailing_zeros() as usize % OVERLAY_PALETTE.len();
        let color = Rgb(OVERLAY_PALETTE[slot]);
        let rect = blob.rect;
        if rect.is_empty() {
            continue;
        }
        let (right, bottom) = (rect.right() - 1, rect.bottom() - 1);

        for x in rect.x..=right {
            put_clipped(canvas, x, rect.y, color);
            put_clipped(canvas, x, bottom, color);
        }
        for y in rect.y..=bottom {
            put_clipped(canvas, rect.x, y, color);
            put_clipped(canvas, right, y, color);
        }

        let c = blob.centroid;
        for d in -CENTROID_ARM..=CENTROID_ARM {
            put_clipped(canvas, c.x + d, c.y, color);
            put_clipped(canvas, c.x, c.y + d, color);
        }
    }
}

/// Writes `frame` with `blobs` drawn on top. The format follows the extension.
pub fn save_blob_overlay(path: impl AsRef<Path>, frame: &FrameBuffer, blobs: &[Blob]) -> ImageResult<()> {
    let mut canvas = frame_to_rgb(frame);
    draw_blobs(&mut canvas, blobs);
    canvas.save(path)
}
