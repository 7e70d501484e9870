// THEORY:
// A `Blob` is the summary of one connected region: where it is (bounding box,
// centroid), how big it is (pixels, perimeter), how it is oriented (principal
// axis angle), which threshold(s) found it (`code`, one bit per threshold
// index) and how many flood-filled regions were merged into it (`count`).
//
// Blobs are plain values. The detector copies them into the output list and
// the merger folds one into another with `absorb`.

use crate::core_modules::geometry::{Point, Rect};

/// One bit per threshold, bit `i` for the `i`-th threshold in the caller's list.
pub type ThresholdCode = u32;

/// Number of thresholds a code mask can tell apart.
pub const MAX_THRESHOLDS: usize = ThresholdCode::BITS as usize;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Blob {
    /// Tightest box around every claimed pixel.
    pub rect: Rect,
    pub pixels: u32,
    /// Claimed pixels on the region's boundary.
    pub perimeter: u32,
    pub centroid: Point,
    /// Principal-axis angle in radians, in (-pi/2, pi/2].
    pub rotation: f32,
    pub code: ThresholdCode,
    /// Flood-filled regions merged into this blob; 1 when unmerged.
    pub count: u32,
}

impl Blob {
    pub fn area(&self) -> u64 {
        self.rect.area()
    }

    /// Fraction of the bounding box covered by claimed pixels.
    pub fn density(&self) -> f32 {
        match self.area() {
            0 => 0.0,
            area => self.pixels as f32 / area as f32,
        }
    }

    /// Indices of the thresholds that contributed to this blob, ascending.
    pub fn threshold_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..MAX_THRESHOLDS).filter(move |&i| (self.code >> i) & 1 != 0)
    }

    /// Folds `other` into `self`: bounding union, summed counts, and
    /// pixel-weighted centroid and rotation.
    ///
    /// Rotation is averaged from the two already-derived angles rather than
    /// recomputed from combined moments.
    pub fn absorb(&mut self, other: &Blob) {
        let own = self.pixels as i64;
        let theirs = other.pixels as i64;
        let total = own + theirs;

        self.rect = self.rect.union(&other.rect);
        self.centroid = Point::new(
            ((self.centroid.x as i64 * own + other.centroid.x as i64 * theirs) / total) as i32,
            ((self.centroid.y as i64 * own + other.centroid.y as i64 * theirs) / total) as i32,
        );
        self.rotation = ((self.rotation as f64 * own as f64 + other.rotation as f64 * theirs as f64)
            / total as f64) as f32;
        self.pixels = self.pixels.saturating_add(other.pixels);
        self.perimeter = self.perimeter.saturating_add(other.perimeter);
        self.code |= other.code;
        self.count = self.count.saturating_add(other.count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn blob(rect: Rect, pixels: u32, centroid: Point, rotation: f32, code: u32) -> Blob {
        Blob {
            rect,
            pixels,
            perimeter: pixels,
            centroid,
            rotation,
            code,
            count: 1,
        }
    }

    #[test]
    fn absorb_weights_by_pixel_count() {
        let mut a = blob(Rect::new(0, 0, 3, 3), 9, Point::new(1, 1), 0.0, 0b01);
        let b = blob(Rect::new(10, 0, 2, 3), 3, Point::new(10, 1), 1.2, 0b10);
        a.absorb(&b);

        assert_eq!(a.rect, Rect::new(0, 0, 12, 3));
        assert_eq!(a.pixels, 12);
        assert_eq!(a.perimeter, 12);
        // (1 * 9 + 10 * 3) / 12 = 3.25, truncated.
        assert_eq!(a.centroid, Point::new(3, 1));
        assert_relative_eq!(a.rotation, 0.3, epsilon = 1e-6);
        assert_eq!(a.code, 0b11);
        assert_eq!(a.count, 2);
    }

    #[test]
    fn lists_contributing_thresholds() {
        let b = blob(Rect::new(0, 0, 1, 1), 1, Point::new(0, 0), 0.0, 0b1000_0101);
        assert_eq!(b.threshold_indices().collect::<Vec<_>>(), vec![0, 2, 7]);
    }

    #[test]
    fn density_of_a_full_box_is_one() {
        let b = blob(Rect::new(0, 0, 4, 2), 8, Point::new(1, 0), 0.0, 1);
        assert_relative_eq!(b.density(), 1.0);
        let half = blob(Rect::new(0, 0, 4, 2), 4, Point::new(1, 0), 0.0, 1);
        assert_relative_eq!(half.density(), 0.5);
    }
}
