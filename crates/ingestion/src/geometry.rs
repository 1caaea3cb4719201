//! Axis-aligned box primitives in image pixel coordinates

use serde::{Deserialize, Serialize};

/// Box as `(x1, y1, x2, y2)`, top-left origin
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    /// Signed area; degenerate or inverted boxes give zero or less
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Area of the overlap with `other`, zero when disjoint
    pub fn intersection_area(&self, other: &BBox) -> f32 {
        let w = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let h = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        w * h
    }

    /// Smallest box enclosing both
    pub fn union(&self, other: &BBox) -> BBox {
        BBox {
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            x2: self.x2.max(other.x2),
            y2: self.y2.max(other.y2),
        }
    }

    /// Grow by `ratio` of width (and of height when `vertical`), each margin
    /// truncated to whole pixels, then clamp to a `max_w` x `max_h` image.
    pub fn pad(&self, ratio: f32, vertical: bool, max_w: f32, max_h: f32) -> BBox {
        let pad_w = (ratio * self.width()).trunc();
        let pad_h = if vertical {
            (ratio * self.height()).trunc()
        } else {
            0.0
        };

        BBox {
            x1: (self.x1 - pad_w).max(0.0),
            y1: (self.y1 - pad_h).max(0.0),
            x2: (self.x2 + pad_w).min(max_w),
            y2: (self.y2 + pad_h).min(max_h),
        }
    }

    /// Divide every coordinate by `factor`
    pub fn scaled_down(&self, factor: f32) -> BBox {
        if factor <= 0.0 {
            return *self;
        }
        BBox {
            x1: self.x1 / factor,
            y1: self.y1 / factor,
            x2: self.x2 / factor,
            y2: self.y2 / factor,
        }
    }

    /// Whether the vertical band `[top, bottom]` overlaps this box's band
    pub fn overlaps_band(&self, top: f32, bottom: f32) -> bool {
        !(bottom < self.y1 || top > self.y2)
    }
}

/// Intersection over union; 0 when the union is not positive
pub fn iou(a: &BBox, b: &BBox) -> f32 {
    let inter = a.intersection_area(b);
    let union = a.area() + b.area() - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Whether at least `tolerance` of `inner`'s area lies inside `outer`.
///
/// Directional: a small box can be contained in a large one, not the reverse.
pub fn is_contained(inner: &BBox, outer: &BBox, tolerance: f32) -> bool {
    let inner_area = inner.area();
    inner_area > 0.0 && inner.intersection_area(outer) / inner_area >= tolerance
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iou_identity_and_disjoint() {
        let a = BBox::new(10.0, 10.0, 110.0, 60.0);
        let b = BBox::new(200.0, 200.0, 300.0, 300.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn test_iou_partial() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(5.0, 0.0, 15.0, 10.0);
        // 50 / 150
        assert!((iou(&a, &b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_area_boxes() {
        let line = BBox::new(5.0, 5.0, 5.0, 50.0);
        assert_eq!(iou(&line, &line), 0.0);
        assert!(!is_contained(&line, &BBox::new(0.0, 0.0, 100.0, 100.0), 0.95));
    }

    #[test]
    fn test_containment_is_directional() {
        let outer = BBox::new(0.0, 0.0, 100.0, 100.0);
        let inner = BBox::new(10.0, 10.0, 50.0, 50.0);
        assert!(is_contained(&inner, &outer, 0.95));
        assert!(!is_contained(&outer, &inner, 0.95));
    }

    #[test]
    fn test_containment_false_for_disjoint() {
        let a = BBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BBox::new(20.0, 20.0, 30.0, 30.0);
        assert!(!is_contained(&a, &b, 0.95));
        assert!(!is_contained(&b, &a, 0.95));
    }

    #[test]
    fn test_pad_clamps_to_image() {
        let b = BBox::new(5.0, 20.0, 105.0, 120.0);
        assert_eq!(b.pad(0.05, false, 108.0, 500.0), BBox::new(0.0, 20.0, 108.0, 120.0));
        assert_eq!(b.pad(0.05, true, 500.0, 500.0), BBox::new(0.0, 15.0, 110.0, 125.0));
    }

    #[test]
    fn test_band_overlap() {
        let b = BBox::new(0.0, 100.0, 50.0, 200.0);
        assert!(b.overlaps_band(90.0, 110.0));
        assert!(b.overlaps_band(50.0, 300.0));
        assert!(b.overlaps_band(200.0, 210.0));
        assert!(!b.overlaps_band(201.0, 210.0));
        assert!(!b.overlaps_band(10.0, 99.0));
    }
}
