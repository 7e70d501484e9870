// THEORY:
// The `pixel` module is the lowest layer of the blob engine. It knows how each
// supported pixel format is laid out in memory and how a single pixel is put
// in front of a threshold. It never looks at neighbours; that is the labeler's
// job.
//
// Formats:
// - Binary:    one bit per pixel, packed LSB-first into `u32` words per row.
// - Grayscale: one `u8` luma sample per pixel.
// - RGB565:    one `u16` per pixel, tested in CIE L*a*b* space.
//
// The labeler is written once, generic over `PixelFormat`, so the flood fill
// reads rows through the same accessor whichever format it scans.
//
// RGB565 -> L*a*b* goes through two `OnceLock` lookup tables: the 256-entry
// sRGB linearisation table and a 65536-entry table indexed by the raw RGB565
// value. The hot path is a single table lookup.

use std::fmt::Debug;
use std::sync::OnceLock;

use crate::core_modules::threshold::Threshold;

pub type Luma = u8;
pub type Rgb565 = u16;
pub type BinaryWord = u32;
type NormalizedChannel = f32;

const BINARY_WORD_BITS: usize = BinaryWord::BITS as usize;

// D65 reference white.
const WHITE_X: f32 = 0.95047;
const WHITE_Z: f32 = 1.08883;

static SRGB_TO_LINEAR_LUT: OnceLock<[NormalizedChannel; 256]> = OnceLock::new();
static RGB565_TO_LAB_LUT: OnceLock<Box<[Lab]>> = OnceLock::new();

/// A CIE L*a*b* colour quantised to the integer ranges threshold bounds use:
/// `l` in 0..=100, `a` and `b` in -128..=127.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Lab {
    pub l: u8,
    pub a: i8,
    pub b: i8,
}

/// Expands an RGB565 value to 8 bits per channel by bit replication.
#[inline]
pub fn rgb565_to_rgb888(pixel: Rgb565) -> (u8, u8, u8) {
    let r5 = ((pixel >> 11) & 0x1F) as u8;
    let g6 = ((pixel >> 5) & 0x3F) as u8;
    let b5 = (pixel & 0x1F) as u8;
    ((r5 << 3) | (r5 >> 2), (g6 << 2) | (g6 >> 4), (b5 << 3) | (b5 >> 2))
}

#[inline]
pub fn rgb888_to_rgb565(red: u8, green: u8, blue: u8) -> Rgb565 {
    ((red as u16 & 0xF8) << 8) | ((green as u16 & 0xFC) << 3) | (blue as u16 >> 3)
}

#[inline]
fn srgb_to_linear(value: u8) -> NormalizedChannel {
    let table = SRGB_TO_LINEAR_LUT.get_or_init(|| {
        let mut table = [0.0f32; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let srgb = i as NormalizedChannel / 255.0;
            *entry = if srgb <= 0.04045 {
                srgb / 12.92
            } else {
                ((srgb + 0.055) / 1.055).powf(2.4)
            };
        }
        table
    });
    table[value as usize]
}

#[inline]
fn lab_f(t: f32) -> f32 {
    if t > 0.008856 {
        t.cbrt()
    } else {
        7.787 * t + 16.0 / 116.0
    }
}

/// Converts 8-bit sRGB to quantised L*a*b*.
pub fn rgb888_to_lab(red: u8, green: u8, blue: u8) -> Lab {
    let r = srgb_to_linear(red);
    let g = srgb_to_linear(green);
    let b = srgb_to_linear(blue);

    let x = (0.4124 * r + 0.3576 * g + 0.1805 * b) / WHITE_X;
    let y = 0.2126 * r + 0.7152 * g + 0.0722 * b;
    let z = (0.0193 * r + 0.1192 * g + 0.9505 * b) / WHITE_Z;

    let (fx, fy, fz) = (lab_f(x), lab_f(y), lab_f(z));
    Lab {
        l: (116.0 * fy - 16.0).round().clamp(0.0, 100.0) as u8,
        a: (500.0 * (fx - fy)).round().clamp(-128.0, 127.0) as i8,
        b: (200.0 * (fy - fz)).round().clamp(-128.0, 127.0) as i8,
    }
}

/// Table-driven RGB565 to L*a*b*.
#[inline]
pub fn rgb565_to_lab(pixel: Rgb565) -> Lab {
    let table = RGB565_TO_LAB_LUT.get_or_init(|| {
        (0..=Rgb565::MAX)
            .map(|p| {
                let (r, g, b) = rgb565_to_rgb888(p);
                rgb888_to_lab(r, g, b)
            })
            .collect()
    });
    table[pixel as usize]
}

/// Memory layout and threshold test for one pixel format.
///
/// `Storage` is the element type of a row slice. A row of `width` pixels
/// occupies `row_len(width)` elements.
pub trait PixelFormat: Copy + Debug + Send + Sync + 'static {
    type Storage: Copy + Debug + Default + Send + Sync + 'static;

    const NAME: &'static str;

    fn row_len(width: usize) -> usize;

    /// Tests pixel `x` of `row` against `threshold`, flipped when `invert`.
    fn passes(row: &[Self::Storage], x: usize, threshold: &Threshold, invert: bool) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GrayscaleFormat;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb565Format;

impl BinaryFormat {
    #[inline]
    pub fn bit(row: &[BinaryWord], x: usize) -> bool {
        (row[x / BINARY_WORD_BITS] >> (x % BINARY_WORD_BITS)) & 1 != 0
    }

    #[inline]
    pub fn set_bit(row: &mut [BinaryWord], x: usize, value: bool) {
        let mask = 1 << (x % BINARY_WORD_BITS);
        if value {
            row[x / BINARY_WORD_BITS] |= mask;
        } else {
            row[x / BINARY_WORD_BITS] &= !mask;
        }
    }
}

impl PixelFormat for BinaryFormat {
    type Storage = BinaryWord;
    const NAME: &'static str = "binary";

    #[inline]
    fn row_len(width: usize) -> usize {
        width.div_ceil(BINARY_WORD_BITS)
    }

    #[inline]
    fn passes(row: &[BinaryWord], x: usize, threshold: &Threshold, invert: bool) -> bool {
        threshold.matches_binary(Self::bit(row, x), invert)
    }
}

impl PixelFormat for GrayscaleFormat {
    type Storage = Luma;
    const NAME: &'static str = "grayscale";

    #[inline]
    fn row_len(width: usize) -> usize {
        width
    }

    #[inline]
    fn passes(row: &[Luma], x: usize, threshold: &Threshold, invert: bool) -> bool {
        threshold.matches_grayscale(row[x], invert)
    }
}

impl PixelFormat for Rgb565Format {
    type Storage = Rgb565;
    const NAME: &'static str = "rgb565";

    #[inline]
    fn row_len(width: usize) -> usize {
        width
    }

    #[inline]
    fn passes(row: &[Rgb565], x: usize, threshold: &Threshold, invert: bool) -> bool {
        threshold.matches_lab(rgb565_to_lab(row[x]), invert)
    }
}
