// THEORY:
// The `Labeler` is the engine of the blob extractor. Given a seed pixel that
// passes the active threshold and has not been claimed yet, it claims the
// maximal 4-connected region of such pixels inside the scan window and
// returns that region's raw moments.
//
// Algorithm (scanline flood fill with an explicit stack):
// 1.  **Widen**: from the current pixel, walk left and right along the row
//     while pixels are in the window, unclaimed and passing. This gives the
//     span `[left, right]`.
// 2.  **Claim**: mark every pixel of the span visited and fold it into the
//     moment sums (count, sum x, sum y, sum x^2, sum xy, sum y^2), the
//     bounding box and the perimeter tally.
// 3.  **Descend**: look along `[left, right]` on the row above, then the row
//     below, for the first unclaimed passing pixel. If there is one and the
//     span stack has room, push the current span and continue from that pixel
//     at step 1. Depth first: siblings wait on the stack.
// 4.  **Unwind**: otherwise pop a saved span and repeat step 3 for it. An
//     empty stack ends the fill.
//
// If the stack is full, step 3 is skipped for that span. The pixels it would
// have reached stay unclaimed and the detector's raster scan seeds them as a
// separate region later. A fill therefore never exceeds its memory budget; a
// very serpentine region may come back in more than one piece.
//
// Centroid and orientation are derived from the moments once the fill is done:
// the centroid is the truncated mean, and the rotation is half the `atan2` of
// the centred second moments, forced to 0 when the two axis moments are equal.

use crate::core_modules::bitmap::Bitmap;
use crate::core_modules::blob::{Blob, ThresholdCode};
use crate::core_modules::error::Result;
use crate::core_modules::geometry::{Point, Rect};
use crate::core_modules::image_view::ImageView;
use crate::core_modules::pixel::PixelFormat;
use crate::core_modules::scratch::ScratchArena;
use crate::core_modules::span_stack::{Span, SpanStack};
use crate::core_modules::threshold::Threshold;

/// Raw accumulators for one flood-filled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionMoments {
    pub pixels: u32,
    pub perimeter: u32,
    pub x1: usize,
    pub y1: usize,
    pub x2: usize,
    pub y2: usize,
    pub sum_x: i64,
    pub sum_y: i64,
    pub sum_xx: i64,
    pub sum_xy: i64,
    pub sum_yy: i64,
}

impl RegionMoments {
    fn new(x: usize, y: usize) -> Self {
        Self {
            pixels: 0,
            perimeter: 0,
            x1: x,
            y1: y,
            x2: x,
            y2: y,
            sum_x: 0,
            sum_y: 0,
            sum_xx: 0,
            sum_xy: 0,
            sum_yy: 0,
        }
    }

    #[inline]
    fn add_span_bounds(&mut self, left: usize, right: usize, y: usize) {
        self.x1 = self.x1.min(left);
        self.x2 = self.x2.max(right);
        self.y1 = self.y1.min(y);
        self.y2 = self.y2.max(y);
    }

    #[inline]
    fn add_pixel(&mut self, x: usize, y: usize, on_edge: bool) {
        let (x, y) = (x as i64, y as i64);
        self.pixels += 1;
        self.perimeter += on_edge as u32;
        self.sum_x += x;
        self.sum_y += y;
        self.sum_xx += x * x;
        self.sum_xy += x * y;
        self.sum_yy += y * y;
    }

    pub fn rect(&self) -> Rect {
        Rect::from_corners(self.x1 as i32, self.y1 as i32, self.x2 as i32, self.y2 as i32)
    }

    pub fn centroid(&self) -> Point {
        let n = self.pixels.max(1) as i64;
        Point::new((self.sum_x / n) as i32, (self.sum_y / n) as i32)
    }

    pub fn rotation(&self) -> f32 {
        let n = self.pixels as i64;
        let centroid = self.centroid();
        let (mx, my) = (centroid.x as i64, centroid.y as i64);

        let a = self.sum_xx - 2 * mx * self.sum_x + n * mx * mx;
        let b = self.sum_xy - mx * self.sum_y - my * self.sum_x + n * mx * my;
        let c = self.sum_yy - 2 * my * self.sum_y + n * my * my;

        if a == c {
            0.0
        } else {
            (((2 * b) as f64).atan2((a - c) as f64) / 2.0) as f32
        }
    }

    pub fn to_blob(&self, code: ThresholdCode) -> Blob {
        Blob {
            rect: self.rect(),
            pixels: self.pixels,
            perimeter: self.perimeter,
            centroid: self.centroid(),
            rotation: self.rotation(),
            code,
            count: 1,
        }
    }
}

/// Flood-fill state for one detector call: the image, the clipped scan window
/// and the scratch buffers, which live exactly as long as the labeler.
pub struct Labeler<'a, F: PixelFormat> {
    image: ImageView<'a, F>,
    x_min: usize,
    x_max: usize,
    y_min: usize,
    y_max: usize,
    visited: Bitmap,
    stack: SpanStack,
    saturated_spans: usize,
}

impl<'a, F: PixelFormat> Labeler<'a, F> {
    /// `window` must already be clipped to the image and non-empty. The span
    /// stack is sized to the image perimeter.
    pub fn new(image: ImageView<'a, F>, window: Rect, arena: &mut ScratchArena) -> Result<Self> {
        let capacity = SpanStack::perimeter_capacity(image.width(), image.height());
        Self::with_stack_capacity(image, window, capacity, arena)
    }

    pub fn with_stack_capacity(
        image: ImageView<'a, F>,
        window: Rect,
        capacity: usize,
        arena: &mut ScratchArena,
    ) -> Result<Self> {
        debug_assert!(!window.is_empty(), "empty scan window {window}");
        debug_assert_eq!(
            window.intersection(&image.bounds()),
            Some(window),
            "scan window {window} leaves the image"
        );

        let visited = Bitmap::allocate(image.width() * image.height(), arena)?;
        let stack = SpanStack::allocate(capacity, arena)?;
        Ok(Self {
            image,
            x_min: window.x as usize,
            x_max: (window.right() - 1) as usize,
            y_min: window.y as usize,
            y_max: (window.bottom() - 1) as usize,
            visited,
            stack,
            saturated_spans: 0,
        })
    }

    pub fn visited(&self) -> &Bitmap {
        &self.visited
    }

    /// Spans whose neighbours were skipped because the stack was full.
    pub fn saturated_spans(&self) -> usize {
        self.saturated_spans
    }

    pub fn stack_high_water(&self) -> usize {
        self.stack.high_water()
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        y * self.image.width() + x
    }

    #[inline]
    fn is_candidate(
        &self,
        row: &[F::Storage],
        x: usize,
        y: usize,
        threshold: &Threshold,
        invert: bool,
    ) -> bool {
        !self.visited.test(self.index(x, y)) && F::passes(row, x, threshold, invert)
    }

    /// Whether `(x, y)` would start a new region.
    #[inline]
    pub fn is_seed(&self, x: usize, y: usize, threshold: &Threshold, invert: bool) -> bool {
        self.is_candidate(self.image.row(y), x, y, threshold, invert)
    }

    /// Claims the region containing `(seed_x, seed_y)`.
    pub fn fill(
        &mut self,
        seed_x: usize,
        seed_y: usize,
        threshold: &Threshold,
        invert: bool,
    ) -> RegionMoments {
        debug_assert!(self.is_seed(seed_x, seed_y, threshold, invert));
        debug_assert!(self.stack.is_empty());

        let mut moments = RegionMoments::new(seed_x, seed_y);
        let (mut x, mut y) = (seed_x, seed_y);

        'fill: loop {
            // --- 1. Widen ---
            let row = self.image.row(y);
            let mut left = x;
            while left > self.x_min && self.is_candidate(row, left - 1, y, threshold, invert) {
                left -= 1;
            }
            let mut right = x;
            while right < self.x_max && self.is_candidate(row, right + 1, y, threshold, invert) {
                right += 1;
            }

            // --- 2. Claim ---
            let above = (y > self.y_min).then(|| self.image.row(y - 1));
            let below = (y < self.y_max).then(|| self.image.row(y + 1));
            let outside_edge =
                |r: Option<&[F::Storage]>, i: usize| r.is_none_or(|r| !F::passes(r, i, threshold, invert));

            moments.add_span_bounds(left, right, y);
            let row_index = self.index(0, y);
            for i in left..=right {
                self.visited.set_known_clear(row_index + i);
                let on_edge = i == left || i == right || outside_edge(above, i) || outside_edge(below, i);
                moments.add_pixel(i, y, on_edge);
            }

            // --- 3./4. Descend or unwind ---
            let mut span = Span { x, y, left, right };
            loop {
                if self.stack.has_room() {
                    if let Some((next_x, next_y)) = self.adjacent_seed(&span, threshold, invert) {
                        self.stack.push(span);
                        x = next_x;
                        y = next_y;
                        continue 'fill;
                    }
                } else {
                    self.saturated_spans += 1;
                }

                match self.stack.pop() {
                    Some(saved) => span = saved,
                    None => break 'fill,
                }
            }
        }

        moments
    }

    /// First unclaimed passing pixel above, then below, `span`.
    fn adjacent_seed(&self, span: &Span, threshold: &Threshold, invert: bool) -> Option<(usize, usize)> {
        let above = (span.y > self.y_min).then(|| span.y - 1);
        let below = (span.y < self.y_max).then(|| span.y + 1);

        above.into_iter().chain(below).find_map(|y| {
            let row = self.image.row(y);
            (span.left..=span.right)
                .find(|&x| self.is_candidate(row, x, y, threshold, invert))
                .map(|x| (x, y))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::image_view::GrayscaleView;
    use approx::assert_relative_eq;
    use std::f32::consts::FRAC_PI_2;

    const ON: Threshold = Threshold::grayscale(128, 255);

    fn pixels(rows: &[&str]) -> (usize, usize, Vec<u8>) {
        let width = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|row| row.bytes().map(|b| if b == b'#' { 255 } else { 0 }))
            .collect();
        (width, rows.len(), data)
    }

    fn fill_at(rows: &[&str], x: usize, y: usize) -> RegionMoments {
        let (width, height, data) = pixels(rows);
        let view = GrayscaleView::from_slice(width, height, &data).unwrap();
        let mut labeler = Labeler::new(view, view.bounds(), &mut ScratchArena::unbounded()).unwrap();
        labeler.fill(x, y, &ON, false)
    }

    #[test]
    fn single_pixel_has_zero_rotation() {
        let m = fill_at(&["...", ".#.", "..."], 1, 1);
        let blob = m.to_blob(1);
        assert_eq!(blob.rect, Rect::new(1, 1, 1, 1));
        assert_eq!(blob.pixels, 1);
        assert_eq!(blob.perimeter, 1);
        assert_eq!(blob.centroid, Point::new(1, 1));
        assert_eq!(blob.rotation, 0.0);
    }

    #[test]
    fn accumulates_moments_of_an_l_shape() {
        let m = fill_at(&["#..", "#..", "###"], 0, 0);
        assert_eq!(m.pixels, 5);
        assert_eq!((m.sum_x, m.sum_y), (3, 7));
        assert_eq!((m.sum_xx, m.sum_xy, m.sum_yy), (5, 6, 13));
        assert_eq!(m.rect(), Rect::new(0, 0, 3, 3));
        assert_eq!(m.centroid(), Point::new(0, 1));
    }

    #[test]
    fn u_shape_is_reached_through_the_stack() {
        let m = fill_at(&["#...#", "#...#", "#####"], 0, 0);
        assert_eq!(m.pixels, 9);
        assert_eq!(m.rect(), Rect::new(0, 0, 5, 3));
    }

    #[test]
    fn diagonal_neighbours_are_not_connected() {
        let m = fill_at(&["#.", ".#"], 0, 0);
        assert_eq!(m.pixels, 1);
    }

    #[test]
    fn horizontal_bar_points_along_x() {
        let m = fill_at(&[".....", "#####", "....."], 2, 1);
        assert_eq!(m.rotation(), 0.0);
    }

    #[test]
    fn vertical_bar_points_along_y() {
        let m = fill_at(&[".#.", ".#.", ".#.", ".#."], 1, 0);
        assert_relative_eq!(m.rotation(), FRAC_PI_2, epsilon = 1e-6);
    }

    #[test]
    fn staircase_leans_down_right() {
        let m = fill_at(&["##..", ".##.", "..##"], 0, 0);
        let rotation = m.rotation();
        assert_relative_eq!(rotation, (8.0f64.atan2(3.0) / 2.0) as f32, epsilon = 1e-6);
        assert!(rotation > 0.0 && rotation < std::f32::consts::FRAC_PI_4);
    }

    #[test]
    fn perimeter_counts_boundary_pixels() {
        let m = fill_at(&["....", ".###", ".###", ".###"], 1, 1);
        // Everything except the centre pixel of the 3x3 square.
        assert_eq!(m.perimeter, 8);
    }

    #[test]
    fn window_clips_the_region() {
        let (width, height, data) = pixels(&["####", "####", "####"]);
        let view = GrayscaleView::from_slice(width, height, &data).unwrap();
        let window = Rect::new(1, 1, 2, 2);
        let mut labeler = Labeler::new(view, window, &mut ScratchArena::unbounded()).unwrap();
        let m = labeler.fill(1, 1, &ON, false);
        assert_eq!(m.pixels, 4);
        assert_eq!(m.rect(), window);
        assert!(!labeler.visited().test(0));
        assert_eq!(labeler.visited().count_ones(), 4);
    }

    #[test]
    fn full_stack_leaves_the_rest_for_later_seeds() {
        let (width, height, data) = pixels(&["####", "####", "####"]);
        let view = GrayscaleView::from_slice(width, height, &data).unwrap();
        let mut labeler =
            Labeler::with_stack_capacity(view, view.bounds(), 0, &mut ScratchArena::unbounded()).unwrap();

        let first = labeler.fill(0, 0, &ON, false);
        assert_eq!(first.pixels, 4);
        assert!(labeler.saturated_spans() > 0);
        assert!(labeler.is_seed(0, 1, &ON, false));

        let second = labeler.fill(0, 1, &ON, false);
        let third = labeler.fill(0, 2, &ON, false);
        assert_eq!(first.pixels + second.pixels + third.pixels, 12);
        assert_eq!(labeler.visited().count_ones(), 12);
    }

    #[test]
    fn claimed_pixels_are_not_seeds() {
        let (width, height, data) = pixels(&["##", "##"]);
        let view = GrayscaleView::from_slice(width, height, &data).unwrap();
        let mut labeler = Labeler::new(view, view.bounds(), &mut ScratchArena::unbounded()).unwrap();
        assert!(labeler.is_seed(1, 1, &ON, false));
        labeler.fill(0, 0, &ON, false);
        assert!(!labeler.is_seed(1, 1, &ON, false));
        assert!(labeler.stack_high_water() >= 1);
    }
}
