// THEORY:
// Rectangles and points in signed pixel coordinates. Signed, because merge
// margins may push an expanded rectangle past the image origin, and negative
// margins may shrink it to nothing.
//
// Extents are half-open: a rectangle covers `[x, x + w)` x `[y, y + h)`. Two
// rectangles that merely share an edge do not overlap.

use std::fmt;

/// A 2D pixel coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle with its top-left corner at `(x, y)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// Per-side tolerance used when testing blobs for merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Margins {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Margins {
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub const fn uniform(margin: i32) -> Self {
        Self::new(margin, margin, margin, margin)
    }
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Builds the rectangle spanning two inclusive corners.
    pub fn from_corners(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self::new(x1, y1, x2 - x1 + 1, y2 - y1 + 1)
    }

    /// Exclusive right edge.
    #[inline]
    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    /// Exclusive bottom edge.
    #[inline]
    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.w <= 0 || self.h <= 0
    }

    pub fn area(&self) -> u64 {
        if self.is_empty() {
            0
        } else {
            self.w as u64 * self.h as u64
        }
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x && point.x < self.right() && point.y >= self.y && point.y < self.bottom()
    }

    /// Half-open overlap test on both axes.
    #[inline]
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.right()
            && self.y < other.bottom()
            && other.x < self.right()
            && other.y < self.bottom()
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        Rect::new(
            x,
            y,
            self.right().max(other.right()) - x,
            self.bottom().max(other.bottom()) - y,
        )
    }

    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        (right > x && bottom > y).then(|| Rect::new(x, y, right - x, bottom - y))
    }

    /// Grows each side by the matching margin. Negative margins shrink the
    /// rectangle; width and height never go below zero.
    pub fn expanded(&self, margins: &Margins) -> Rect {
        Rect::new(
            self.x.saturating_sub(margins.left),
            self.y.saturating_sub(margins.top),
            self.w
                .saturating_add(margins.left)
                .saturating_add(margins.right)
                .max(0),
            self.h
                .saturating_add(margins.top)
                .saturating_add(margins.bottom)
                .max(0),
        )
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {}, {})", self.x, self.y, self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touching_rectangles_do_not_overlap() {
        let a = Rect::new(0, 0, 3, 3);
        let b = Rect::new(3, 0, 3, 3);
        assert!(!a.overlaps(&b));
        assert!(a.overlaps(&Rect::new(2, 2, 3, 3)));
    }

    #[test]
    fn empty_rectangle_overlaps_nothing() {
        let empty = Rect::new(1, 1, 0, 5);
        assert!(!empty.overlaps(&Rect::new(0, 0, 10, 10)));
        assert!(!Rect::new(0, 0, 10, 10).overlaps(&empty));
    }

    #[test]
    fn union_covers_both() {
        let u = Rect::new(0, 0, 3, 3).union(&Rect::new(20, 20, 3, 3));
        assert_eq!(u, Rect::new(0, 0, 23, 23));
    }

    #[test]
    fn intersection_clips_to_image() {
        let image = Rect::new(0, 0, 10, 10);
        assert_eq!(
            Rect::new(-5, 8, 8, 8).intersection(&image),
            Some(Rect::new(0, 8, 3, 2))
        );
        assert_eq!(Rect::new(10, 0, 4, 4).intersection(&image), None);
    }

    #[test]
    fn expansion_is_per_side() {
        let r = Rect::new(10, 10, 4, 4).expanded(&Margins::new(1, 2, 3, 4));
        assert_eq!(r, Rect::new(9, 8, 8, 10));
    }

    #[test]
    fn negative_margins_clamp_to_empty() {
        let r = Rect::new(10, 10, 4, 4).expanded(&Margins::uniform(-3));
        assert_eq!(r.w, 0);
        assert!(r.is_empty());
    }

    #[test]
    fn from_corners_is_inclusive() {
        let r = Rect::from_corners(2, 3, 2, 3);
        assert_eq!(r, Rect::new(2, 3, 1, 1));
        assert!(r.contains(Point::new(2, 3)));
        assert!(!r.contains(Point::new(3, 3)));
    }
}
