use crate::shared::frame::Frame;

/// Flags frames that differ from a reference frame by more than a mean
/// absolute per-channel difference.
///
/// The reference is the last frame reported as changed, so slow drift
/// accumulates until it crosses the threshold. The first frame, and any
/// frame whose size differs from the reference, always counts as changed.
#[derive(Clone, Debug)]
pub struct FrameChangeDetector {
    threshold: f64,
    reference: Option<Frame>,
}

impl FrameChangeDetector {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            reference: None,
        }
    }

    /// Compare against the reference frame; a changed `frame` becomes the
    /// new reference.
    pub fn changed(&mut self, frame: &Frame) -> bool {
        let changed = match &self.reference {
            Some(reference) => mean_abs_diff(reference, frame)
                .map_or(true, |diff| diff > self.threshold),
            None => true,
        };
        if changed {
            self.reference = Some(frame.clone());
        }
        changed
    }

    pub fn reset(&mut self) {
        self.reference = None;
    }
}

/// Mean absolute difference over all channels, `None` for mismatched sizes.
pub fn mean_abs_diff(a: &Frame, b: &Frame) -> Option<f64> {
    if a.width() != b.width() || a.height() != b.height() || a.data().is_empty() {
        return None;
    }
    let total: u64 = a
        .data()
        .iter()
        .zip(b.data())
        .map(|(&x, &y)| x.abs_diff(y) as u64)
        .sum();
    Some(total as f64 / a.data().len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_first_frame_is_changed() {
        let mut detector = FrameChangeDetector::new(5.0);
        assert!(detector.changed(&Frame::filled(4, 4, [0, 0, 0], 0)));
    }

    #[test]
    fn test_small_difference_is_unchanged() {
        let mut detector = FrameChangeDetector::new(5.0);
        detector.changed(&Frame::filled(4, 4, [100, 100, 100], 0));
        assert!(!detector.changed(&Frame::filled(4, 4, [104, 96, 105], 1)));
    }

    #[test]
    fn test_large_difference_is_changed() {
        let mut detector = FrameChangeDetector::new(5.0);
        detector.changed(&Frame::filled(4, 4, [100, 100, 100], 0));
        assert!(detector.changed(&Frame::filled(4, 4, [110, 110, 100], 1)));
    }

    #[test]
    fn test_threshold_is_strict() {
        let mut detector = FrameChangeDetector::new(5.0);
        detector.changed(&Frame::filled(2, 2, [0, 0, 0], 0));
        assert!(!detector.changed(&Frame::filled(2, 2, [5, 5, 5], 1)));
    }

    #[test]
    fn test_slow_drift_is_measured_from_reference() {
        let mut detector = FrameChangeDetector::new(5.0);
        detector.changed(&Frame::filled(4, 4, [40, 40, 40], 0));
        assert!(!detector.changed(&Frame::filled(4, 4, [44, 44, 44], 1)));
        assert!(detector.changed(&Frame::filled(4, 4, [48, 48, 48], 2)));
        assert!(!detector.changed(&Frame::filled(4, 4, [52, 52, 52], 3)));
    }

    #[test]
    fn test_size_change_and_reset() {
        let mut detector = FrameChangeDetector::new(5.0);
        detector.changed(&Frame::filled(4, 4, [0, 0, 0], 0));
        assert!(detector.changed(&Frame::filled(8, 4, [0, 0, 0], 1)));
        detector.reset();
        assert!(detector.changed(&Frame::filled(8, 4, [0, 0, 0], 2)));
    }

    #[test]
    fn test_mean_abs_diff() {
        let a = Frame::filled(2, 1, [10, 20, 30], 0);
        let b = Frame::filled(2, 1, [13, 20, 27], 0);
        assert_relative_eq!(mean_abs_diff(&a, &b).unwrap(), 2.0);
    }
}
