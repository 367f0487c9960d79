//! Plain geometric value types shared by every stage of the pipeline.
//!
//! All coordinates are in source-frame pixel space unless a function says
//! otherwise.

/// A 2D point as `(x, y)`.
pub type Point = (f64, f64);

/// IoU between two extents represented as `[x1, y1, x2, y2]`.
///
/// Returns 0.0 for disjoint or degenerate extents.
pub fn bbox_iou(a: &[f64; 4], b: &[f64; 4]) -> f64 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }

    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

/// Axis-aligned face box in source pixels.
///
/// Boxes straight out of the detection oracle may be inverted
/// (`x2 < x1`); use [`BoundingBox::is_valid`] before relying on area.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub score: Option<f64>,
}

impl BoundingBox {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            score: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn from_array(coords: [f64; 4]) -> Self {
        Self::new(coords[0], coords[1], coords[2], coords[3])
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }

    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    pub fn is_valid(&self) -> bool {
        self.x1 < self.x2 && self.y1 < self.y2
    }

    pub fn center(&self) -> Point {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn iou(&self, other: &BoundingBox) -> f64 {
        bbox_iou(&self.as_array(), &other.as_array())
    }

    /// Top-left and bottom-right corners, the two points a box is smoothed by.
    pub fn corners(&self) -> [Point; 2] {
        [(self.x1, self.y1), (self.x2, self.y2)]
    }
}

/// Ordered landmark points for one face.
///
/// Point order encodes the facial feature (e.g. index 30 is the nose tip in
/// the 68-point layout) and is never permuted.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkSet {
    points: Vec<Point>,
}

impl LandmarkSet {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Min/max extent of all points as `[x1, y1, x2, y2]`.
    pub fn extent(&self) -> [f64; 4] {
        let mut ext = [f64::MAX, f64::MAX, f64::MIN, f64::MIN];
        if self.points.is_empty() {
            return [0.0; 4];
        }
        for &(x, y) in &self.points {
            ext[0] = ext[0].min(x);
            ext[1] = ext[1].min(y);
            ext[2] = ext[2].max(x);
            ext[3] = ext[3].max(y);
        }
        ext
    }

    /// Coarse face box spanning the landmark extent.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_array(self.extent())
    }

    /// Mean of the points in `range`; `None` when the range is empty or out of bounds.
    pub fn mean_of(&self, range: std::ops::Range<usize>) -> Option<Point> {
        let slice = self.points.get(range)?;
        if slice.is_empty() {
            return None;
        }
        let n = slice.len() as f64;
        let (sx, sy) = slice
            .iter()
            .fold((0.0, 0.0), |(ax, ay), &(x, y)| (ax + x, ay + y));
        Some((sx / n, sy / n))
    }
}
