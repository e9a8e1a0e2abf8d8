/// Confidence attached to every cascade detection.
///
/// The boosted cascade only answers accept/reject, so this is a fixed
/// marker rather than a calibrated probability. It must stay in `[0, 1]`.
pub const CASCADE_CONFIDENCE: f32 = 0.95;

/// A detected face: top-left corner and size in source-image pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32, confidence: f32) -> Self {
        debug_assert!(
            (0.0..=1.0).contains(&confidence),
            "confidence must lie in [0, 1]"
        );
        Self {
            x,
            y,
            width,
            height,
            confidence,
        }
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn intersects(&self, other: &FaceBox) -> bool {
        self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    pub fn iou(&self, other: &FaceBox) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = self.right().min(other.right());
        let iy2 = self.bottom().min(other.bottom());

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        inter / (self.area() as f64 + other.area() as f64 - inter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    fn face(x: i32, y: i32, w: i32, h: i32) -> FaceBox {
        FaceBox::new(x, y, w, h, CASCADE_CONFIDENCE)
    }

    // ── IoU ──────────────────────────────────────────────────────────

    #[test]
    fn test_iou_identical_boxes() {
        let a = face(10, 10, 100, 100);
        assert_relative_eq!(a.iou(&a), 1.0);
    }

    #[test]
    fn test_iou_partial_overlap() {
        // intersection 50*100 = 5000, union 15000
        let a = face(0, 0, 100, 100);
        let b = face(50, 0, 100, 100);
        assert_relative_eq!(a.iou(&b), 5000.0 / 15000.0);
    }

    #[rstest]
    #[case::disjoint(face(0, 0, 50, 50), face(100, 100, 50, 50))]
    #[case::touching_edges(face(0, 0, 50, 50), face(50, 0, 50, 50))]
    #[case::zero_width(face(0, 0, 0, 100), face(0, 0, 50, 50))]
    fn test_iou_zero(#[case] a: FaceBox, #[case] b: FaceBox) {
        assert_relative_eq!(a.iou(&b), 0.0);
    }

    // ── Intersection ─────────────────────────────────────────────────

    #[rstest]
    #[case::contained(face(0, 0, 100, 100), face(25, 25, 10, 10), true)]
    #[case::overlapping(face(0, 0, 40, 40), face(30, 30, 40, 40), true)]
    #[case::touching(face(0, 0, 40, 40), face(40, 0, 40, 40), false)]
    #[case::apart(face(0, 0, 10, 10), face(50, 50, 10, 10), false)]
    fn test_intersects(#[case] a: FaceBox, #[case] b: FaceBox, #[case] expected: bool) {
        assert_eq!(a.intersects(&b), expected);
        assert_eq!(b.intersects(&a), expected);
    }

    #[test]
    fn test_edges_and_area() {
        let f = face(5, 7, 20, 30);
        assert_eq!(f.right(), 25);
        assert_eq!(f.bottom(), 37);
        assert_eq!(f.area(), 600);
    }

    #[test]
    fn test_cascade_confidence_is_a_probability() {
        assert!((0.0..=1.0).contains(&CASCADE_CONFIDENCE));
        assert_relative_eq!(CASCADE_CONFIDENCE, 0.95);
    }
}
