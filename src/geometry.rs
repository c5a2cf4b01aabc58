//! Axis-aligned box overlap measures.
//!
//! All functions treat boxes as axis-aligned; any rotation carried in a
//! detection's `extra` map is ignored.

use crate::ir::{BBoxXYWH, Pixel};

/// Area of the overlap between `a` and `b`; `0.0` when they do not overlap
/// or only touch along an edge.
#[must_use]
pub fn intersection_area(a: &BBoxXYWH<Pixel>, b: &BBoxXYWH<Pixel>) -> f64 {
    let left = a.x.max(b.x);
    let top = a.y.max(b.y);
    let right = a.x2().min(b.x2());
    let bottom = a.y2().min(b.y2());

    if left > right || top > bottom {
        return 0.0;
    }

    (right - left) * (bottom - top)
}

/// Area covered by `a` or `b`.
#[must_use]
pub fn union_area(a: &BBoxXYWH<Pixel>, b: &BBoxXYWH<Pixel>) -> f64 {
    a.area() + b.area() - intersection_area(a, b)
}

/// Intersection over union of two boxes, in `[0, 1]`.
///
/// Returns `0.0` when either box has non-positive area (including NaN
/// sizes) or when the boxes do not overlap.
///
/// ```
/// use tilelabel::geometry::iou;
/// use tilelabel::ir::BBoxXYWH;
///
/// let a = BBoxXYWH::new(0.0, 0.0, 10.0, 10.0);
/// let b = BBoxXYWH::new(5.0, 5.0, 10.0, 10.0);
/// assert!((iou(&a, &b) - 25.0 / 175.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn iou(a: &BBoxXYWH<Pixel>, b: &BBoxXYWH<Pixel>) -> f64 {
    let area_a = a.area();
    let area_b = b.area();
    // Written so that NaN areas also bail out.
    if !(area_a > 0.0 && area_b > 0.0) {
        return 0.0;
    }

    let intersection = intersection_area(a, b);
    if intersection <= 0.0 {
        return 0.0;
    }

    let union = area_a + area_b - intersection;
    (intersection / union).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f64, y: f64, w: f64, h: f64) -> BBoxXYWH<Pixel> {
        BBoxXYWH::new(x, y, w, h)
    }

    #[test]
    fn identical_boxes_have_iou_one() {
        let a = bbox(3.0, 4.0, 10.0, 20.0);
        assert_eq!(iou(&a, &a), 1.0);
    }

    #[test]
    fn disjoint_boxes_have_iou_zero() {
        assert_eq!(iou(&bbox(0.0, 0.0, 10.0, 10.0), &bbox(20.0, 20.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn touching_boxes_have_iou_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(10.0, 0.0, 10.0, 10.0);
        assert_eq!(intersection_area(&a, &b), 0.0);
        assert_eq!(iou(&a, &b), 0.0);
    }

    #[test]
    fn partial_overlap() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 5.0, 10.0, 10.0);
        assert_eq!(intersection_area(&a, &b), 25.0);
        assert_eq!(union_area(&a, &b), 175.0);
        assert!((iou(&a, &b) - 25.0 / 175.0).abs() < 1e-12);
        assert_eq!(iou(&a, &b), iou(&b, &a));
    }

    #[test]
    fn contained_box() {
        let outer = bbox(0.0, 0.0, 10.0, 10.0);
        let inner = bbox(2.0, 2.0, 5.0, 5.0);
        assert!((iou(&outer, &inner) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn degenerate_boxes_have_iou_zero() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        assert_eq!(iou(&a, &bbox(0.0, 0.0, 0.0, 10.0)), 0.0);
        assert_eq!(iou(&a, &bbox(0.0, 0.0, -5.0, 10.0)), 0.0);
        assert_eq!(iou(&a, &bbox(0.0, 0.0, f64::NAN, 10.0)), 0.0);
    }

    #[test]
    fn fractional_coordinates() {
        let a = bbox(0.5, 0.5, 1.0, 1.0);
        let b = bbox(1.0, 1.0, 1.0, 1.0);
        assert!((iou(&a, &b) - 0.25 / 1.75).abs() < 1e-12);
    }
}
