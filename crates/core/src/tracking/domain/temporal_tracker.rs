use crate::shared::geometry::{bbox_iou, BoundingBox, LandmarkSet, Point};

/// Something the tracker can associate by overlap and smooth point-wise.
pub trait Trackable: Clone {
    /// Axis-aligned `[x1, y1, x2, y2]` used for association.
    fn extent(&self) -> [f64; 4];

    /// Points smoothed against the matched previous item.
    fn track_points(&self) -> Vec<Point>;

    /// Copy of `self` with its points replaced; everything else is kept.
    fn with_track_points(&self, points: &[Point]) -> Self;
}

impl Trackable for BoundingBox {
    fn extent(&self) -> [f64; 4] {
        self.as_array()
    }

    fn track_points(&self) -> Vec<Point> {
        self.corners().to_vec()
    }

    fn with_track_points(&self, points: &[Point]) -> Self {
        let [(x1, y1), (x2, y2)] = [points[0], points[1]];
        BoundingBox {
            x1,
            y1,
            x2,
            y2,
            score: self.score,
        }
    }
}

impl Trackable for LandmarkSet {
    fn extent(&self) -> [f64; 4] {
        LandmarkSet::extent(self)
    }

    fn track_points(&self) -> Vec<Point> {
        self.points().to_vec()
    }

    fn with_track_points(&self, points: &[Point]) -> Self {
        LandmarkSet::new(points.to_vec())
    }
}

/// Association and smoothing parameters for one tracker.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerParams {
    /// Overlap a current item needs with a previous one to be matched.
    pub iou_threshold: f64,
    /// EMA weight of the current observation.
    pub alpha: f64,
    /// Points that moved less than this (pixels) keep their previous value.
    pub motion_threshold: f64,
}

impl TrackerParams {
    pub fn new(iou_threshold: f64, alpha: f64, motion_threshold: f64) -> Self {
        Self {
            iou_threshold,
            alpha,
            motion_threshold,
        }
    }
}

/// Frame-to-frame stabiliser for one stream.
///
/// Each current item is matched to the first previous item whose extent
/// overlaps it by more than the IOU threshold. Matched items are smoothed
/// point by point; unmatched items pass through. The output becomes the
/// previous state for the next frame.
#[derive(Clone, Debug)]
pub struct TemporalTracker<T: Trackable> {
    params: TrackerParams,
    previous: Option<Vec<T>>,
}

impl<T: Trackable> TemporalTracker<T> {
    pub fn new(params: TrackerParams) -> Self {
        Self {
            params,
            previous: None,
        }
    }

    pub fn params(&self) -> &TrackerParams {
        &self.params
    }

    /// Smoothed state from the last update, if any.
    pub fn previous(&self) -> Option<&[T]> {
        self.previous.as_deref()
    }

    pub fn update(&mut self, current: Vec<T>) -> Vec<T> {
        let result = match self.previous.as_deref() {
            None => current,
            Some(previous) => self.blend(current, previous),
        };
        self.previous = Some(result.clone());
        result
    }

    /// Associate and smooth `current` against `reference` without touching
    /// the stored state.
    pub fn blend(&self, current: Vec<T>, reference: &[T]) -> Vec<T> {
        if reference.is_empty() {
            return current;
        }
        current
            .iter()
            .map(|item| {
                let extent = item.extent();
                reference
                    .iter()
                    .find(|prev| bbox_iou(&extent, &prev.extent()) > self.params.iou_threshold)
                    .map_or_else(|| item.clone(), |prev| self.smooth(item, prev))
            })
            .collect()
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }

    fn smooth(&self, current: &T, previous: &T) -> T {
        let now = current.track_points();
        let before = previous.track_points();
        if now.len() != before.len() {
            log::debug!(
                "matched items differ in point count ({} vs {}), not smoothing",
                now.len(),
                before.len()
            );
            return current.clone();
        }

        let alpha = self.params.alpha;
        let smoothed: Vec<Point> = now
            .iter()
            .zip(&before)
            .map(|(&(x, y), &(px, py))| {
                if (x - px).hypot(y - py) < self.params.motion_threshold {
                    (px, py)
                } else {
                    (alpha * x + (1.0 - alpha) * px, alpha * y + (1.0 - alpha) * py)
                }
            })
            .collect();
        current.with_track_points(&smoothed)
    }
}
