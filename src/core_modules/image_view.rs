// THEORY:
// `ImageView` is the engine's read-only window onto caller-owned pixel memory.
// It borrows a slice, knows its width, height and row stride (in storage
// elements, not bytes), and hands out whole rows. The labeler fetches a row
// once per span and then indexes pixels within it, so the per-pixel cost is a
// slice index plus the format's threshold test.
//
// `FrameBuffer` is the owning counterpart used where frames have to move
// between threads or come out of an image decoder. It picks the pixel format
// at runtime and lends out a typed view.

use std::marker::PhantomData;

use crate::core_modules::error::{BlobError, Result};
use crate::core_modules::geometry::Rect;
use crate::core_modules::pixel::{
    BinaryFormat, BinaryWord, GrayscaleFormat, Luma, PixelFormat, Rgb565, Rgb565Format,
};
use crate::core_modules::threshold::Threshold;

/// A borrowed, strided view of an image in pixel format `F`.
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a, F: PixelFormat> {
    width: usize,
    height: usize,
    stride: usize,
    data: &'a [F::Storage],
    _format: PhantomData<F>,
}

pub type BinaryView<'a> = ImageView<'a, BinaryFormat>;
pub type GrayscaleView<'a> = ImageView<'a, GrayscaleFormat>;
pub type Rgb565View<'a> = ImageView<'a, Rgb565Format>;

impl<'a, F: PixelFormat> ImageView<'a, F> {
    /// Wraps a tightly packed buffer.
    pub fn from_slice(width: usize, height: usize, data: &'a [F::Storage]) -> Result<Self> {
        Self::with_stride(width, height, F::row_len(width), data)
    }

    /// Wraps a buffer whose rows start `stride` elements apart.
    pub fn with_stride(
        width: usize,
        height: usize,
        stride: usize,
        data: &'a [F::Storage],
    ) -> Result<Self> {
        let row_len = F::row_len(width);
        if stride < row_len {
            return Err(BlobError::InvalidStride { stride, row_len });
        }

        let min_len = if height == 0 {
            0
        } else {
            stride
                .checked_mul(height - 1)
                .and_then(|n| n.checked_add(row_len))
                .ok_or(BlobError::SizeMismatch {
                    expected: usize::MAX,
                    actual: data.len(),
                })?
        };
        if data.len() < min_len {
            return Err(BlobError::SizeMismatch {
                expected: min_len,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            stride,
            data,
            _format: PhantomData,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// The whole image as a rectangle anchored at the origin.
    pub fn bounds(&self) -> Rect {
        Rect::new(0, 0, self.width as i32, self.height as i32)
    }

    #[inline]
    pub fn row(&self, y: usize) -> &'a [F::Storage] {
        assert!(y < self.height, "row {y} out of bounds for height {}", self.height);
        let start = y * self.stride;
        &self.data[start..start + F::row_len(self.width)]
    }

    /// Threshold test for the pixel at `(x, y)`.
    pub fn passes(&self, x: usize, y: usize, threshold: &Threshold, invert: bool) -> bool {
        assert!(x < self.width, "column {x} out of bounds for width {}", self.width);
        F::passes(self.row(y), x, threshold, invert)
    }
}

/// Runtime pixel-format tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PixelKind {
    Binary,
    Grayscale,
    Rgb565,
}

/// An owned image in one of the supported pixel formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameBuffer {
    Binary {
        width: usize,
        height: usize,
        words: Vec<BinaryWord>,
    },
    Grayscale {
        width: usize,
        height: usize,
        pixels: Vec<Luma>,
    },
    Rgb565 {
        width: usize,
        height: usize,
        pixels: Vec<Rgb565>,
    },
}

impl FrameBuffer {
    pub fn binary_from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let row_len = BinaryFormat::row_len(width);
        let mut words = vec![0; row_len * height];
        for y in 0..height {
            let row = &mut words[y * row_len..(y + 1) * row_len];
            for x in 0..width {
                if f(x, y) {
                    BinaryFormat::set_bit(row, x, true);
                }
            }
        }
        FrameBuffer::Binary {
            width,
            height,
            words,
        }
    }

    pub fn grayscale_from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> Luma) -> Self {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        FrameBuffer::Grayscale {
            width,
            height,
            pixels,
        }
    }

    pub fn rgb565_from_fn(width: usize, height: usize, f: impl Fn(usize, usize) -> Rgb565) -> Self {
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| f(x, y))
            .collect();
        FrameBuffer::Rgb565 {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> usize {
        match self {
            FrameBuffer::Binary { width, .. }
            | FrameBuffer::Grayscale { width, .. }
            | FrameBuffer::Rgb565 { width, .. } => *width,
        }
    }

    pub fn height(&self) -> usize {
        match self {
            FrameBuffer::Binary { height, .. }
            | FrameBuffer::Grayscale { height, .. }
            | FrameBuffer::Rgb565 { height, .. } => *height,
        }
    }

    pub fn kind(&self) -> PixelKind {
        match self {
            FrameBuffer::Binary { .. } => PixelKind::Binary,
            FrameBuffer::Grayscale { .. } => PixelKind::Grayscale,
            FrameBuffer::Rgb565 { .. } => PixelKind::Rgb565,
        }
    }

    /// Threshold test for one pixel, whatever the format.
    pub fn passes(&self, x: usize, y: usize, threshold: &Threshold, invert: bool) -> Result<bool> {
        Ok(match self {
            FrameBuffer::Binary {
                width,
                height,
                words,
            } => BinaryView::from_slice(*width, *height, words)?.passes(x, y, threshold, invert),
            FrameBuffer::Grayscale {
                width,
                height,
                pixels,
            } => GrayscaleView::from_slice(*width, *height, pixels)?.passes(x, y, threshold, invert),
            FrameBuffer::Rgb565 {
                width,
                height,
                pixels,
            } => Rgb565View::from_slice(*width, *height, pixels)?.passes(x, y, threshold, invert),
        })
    }
}
