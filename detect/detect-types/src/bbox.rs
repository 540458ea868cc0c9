//! Pixel-space bounding boxes.

use serde::{Deserialize, Serialize};

/// An axis-aligned box in source-image pixel space.
///
/// Stored as top-left corner plus size, all in `f32`. Box math stays in
/// floating point end to end; nothing is rounded before it reaches the caller.
///
/// # Example
///
/// ```
/// use detect_types::PixelBox;
///
/// let a = PixelBox::new(0.0, 0.0, 100.0, 100.0);
/// let b = PixelBox::new(10.0, 10.0, 100.0, 100.0);
///
/// assert!((a.area() - 10_000.0).abs() < 1e-3);
/// assert!(a.iou(&b) > 0.68 && a.iou(&b) < 0.69);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PixelBox {
    /// Left edge in pixels.
    pub x: f32,
    /// Top edge in pixels.
    pub y: f32,
    /// Width in pixels.
    pub width: f32,
    /// Height in pixels.
    pub height: f32,
}

impl PixelBox {
    /// The empty box at the origin.
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0, 0.0);

    /// Creates a box from its top-left corner and size.
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Creates a box from center form `(cx, cy, w, h)`.
    #[must_use]
    pub fn from_center(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x: cx - width / 2.0,
            y: cy - height / 2.0,
            width,
            height,
        }
    }

    /// Creates a box from corners `(x0, y0)`-`(x1, y1)`.
    #[must_use]
    pub fn from_corners(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            x: x0.min(x1),
            y: y0.min(y1),
            width: (x1 - x0).abs(),
            height: (y1 - y0).abs(),
        }
    }

    /// Right edge.
    #[must_use]
    pub fn x1(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge.
    #[must_use]
    pub fn y1(&self) -> f32 {
        self.y + self.height
    }

    /// Returns the center point `(cx, cy)`.
    #[must_use]
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Returns the box area, zero for degenerate boxes.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Computes the intersection-over-union (`IoU`) with another box.
    ///
    /// Returns a value in `[0, 1]`; disjoint or degenerate pairs give `0`.
    #[must_use]
    #[allow(clippy::similar_names)]
    pub fn iou(&self, other: &Self) -> f32 {
        let inter_x0 = self.x.max(other.x);
        let inter_y0 = self.y.max(other.y);
        let inter_x1 = self.x1().min(other.x1());
        let inter_y1 = self.y1().min(other.y1());

        let inter_w = (inter_x1 - inter_x0).max(0.0);
        let inter_h = (inter_y1 - inter_y0).max(0.0);
        let inter_area = inter_w * inter_h;

        let union_area = self.area() + other.area() - inter_area;

        if union_area > 0.0 {
            inter_area / union_area
        } else {
            0.0
        }
    }

    /// Scales the box by independent horizontal and vertical factors.
    #[must_use]
    pub fn scaled(&self, sx: f32, sy: f32) -> Self {
        Self {
            x: self.x * sx,
            y: self.y * sy,
            width: self.width * sx,
            height: self.height * sy,
        }
    }

    /// Clips the box to `[0, width] x [0, height]`.
    #[must_use]
    pub fn clipped(&self, width: f32, height: f32) -> Self {
        let x0 = self.x.clamp(0.0, width);
        let y0 = self.y.clamp(0.0, height);
        let x1 = self.x1().clamp(0.0, width);
        let y1 = self.y1().clamp(0.0, height);
        Self::from_corners(x0, y0, x1, y1)
    }

    /// Returns `true` if every coordinate is finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn from_center_round_trips() {
        let b = PixelBox::from_center(50.0, 40.0, 20.0, 10.0);
        assert_relative_eq!(b.x, 40.0);
        assert_relative_eq!(b.y, 35.0);
        let (cx, cy) = b.center();
        assert_relative_eq!(cx, 50.0);
        assert_relative_eq!(cy, 40.0);
    }

    #[test]
    fn from_corners_normalises_order() {
        let b = PixelBox::from_corners(30.0, 40.0, 10.0, 20.0);
        assert_relative_eq!(b.x, 10.0);
        assert_relative_eq!(b.y, 20.0);
        assert_relative_eq!(b.width, 20.0);
        assert_relative_eq!(b.height, 20.0);
    }

    #[test]
    fn iou_identical_is_one() {
        let b = PixelBox::new(5.0, 5.0, 10.0, 10.0);
        assert_relative_eq!(b.iou(&b), 1.0);
    }

    #[test]
    fn iou_disjoint_is_zero() {
        let a = PixelBox::new(0.0, 0.0, 10.0, 10.0);
        let b = PixelBox::new(20.0, 20.0, 10.0, 10.0);
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_offset_squares() {
        // intersection 90x90 = 8100, union 20000 - 8100 = 11900
        let a = PixelBox::new(0.0, 0.0, 100.0, 100.0);
        let b = PixelBox::new(10.0, 10.0, 100.0, 100.0);
        assert_relative_eq!(a.iou(&b), 8100.0 / 11900.0, epsilon = 1e-6);
    }

    #[test]
    fn iou_degenerate_is_zero() {
        let a = PixelBox::ZERO;
        assert_relative_eq!(a.iou(&a), 0.0);
    }

    #[test]
    fn scaled_and_clipped() {
        let b = PixelBox::new(10.0, 10.0, 100.0, 50.0).scaled(2.0, 0.5);
        assert_relative_eq!(b.x, 20.0);
        assert_relative_eq!(b.height, 25.0);

        let c = PixelBox::new(-10.0, 5.0, 50.0, 50.0).clipped(30.0, 40.0);
        assert_relative_eq!(c.x, 0.0);
        assert_relative_eq!(c.x1(), 30.0);
        assert_relative_eq!(c.y1(), 40.0);
    }

    #[test]
    fn finite_check() {
        assert!(PixelBox::new(1.0, 2.0, 3.0, 4.0).is_finite());
        assert!(!PixelBox::new(f32::NAN, 2.0, 3.0, 4.0).is_finite());
    }
}
