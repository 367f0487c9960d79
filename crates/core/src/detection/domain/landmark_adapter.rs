use crate::shared::config::AnalyzerConfig;
use crate::shared::frame::Frame;
use crate::shared::geometry::{BoundingBox, LandmarkSet};

use super::oracle::{LandmarkModel, OracleError};

/// Values after the landmark coordinates: head pose (3) then state (4).
const TRAILING_VALUES: usize = 7;

/// Head pose outputs are scaled to degrees by this factor.
const HEAD_POSE_SCALE: f64 = 90.0;

/// Landmarks and auxiliary outputs for one face.
#[derive(Clone, Debug, PartialEq)]
pub struct LandmarkPrediction {
    pub landmarks: LandmarkSet,
    /// Yaw, pitch, roll in degrees.
    pub head_pose: [f64; 3],
    /// Sigmoid-activated auxiliary state.
    pub state: [f64; 4],
}

/// Landmark adapter: crops an expanded square around each box, runs the
/// model and maps its normalised output back to source pixels.
pub struct LandmarkAdapter {
    model: Box<dyn LandmarkModel>,
    point_count: usize,
    extend_ratio: f64,
    min_face_size: f64,
    pixel_means: [u8; 3],
}

impl LandmarkAdapter {
    pub fn new(model: Box<dyn LandmarkModel>, config: &AnalyzerConfig) -> Self {
        Self {
            model,
            point_count: config.landmark_point_count,
            extend_ratio: config.landmark_extend_ratio,
            min_face_size: config.min_face_size,
            pixel_means: config.pixel_means,
        }
    }

    /// Landmark sets and states for every box large enough to landmark.
    pub fn landmark(
        &mut self,
        frame: &Frame,
        boxes: &[BoundingBox],
    ) -> Result<(Vec<LandmarkSet>, Vec<[f64; 4]>), OracleError> {
        let mut landmarks = Vec::with_capacity(boxes.len());
        let mut states = Vec::with_capacity(boxes.len());
        for bbox in boxes {
            if let Some(prediction) = self.predict(frame, bbox)? {
                landmarks.push(prediction.landmarks);
                states.push(prediction.state);
            }
        }
        Ok((landmarks, states))
    }

    /// Predict landmarks for one box. `None` when the face is too small.
    pub fn predict(
        &mut self,
        frame: &Frame,
        bbox: &BoundingBox,
    ) -> Result<Option<LandmarkPrediction>, OracleError> {
        let (w, h) = (bbox.width(), bbox.height());
        if w <= self.min_face_size && h <= self.min_face_size {
            log::trace!("skipping {w:.0}x{h:.0} face below minimum size");
            return Ok(None);
        }
        if !bbox.is_valid() {
            log::debug!("skipping degenerate box {:?}", bbox.as_array());
            return Ok(None);
        }

        // Pad so the expanded square never leaves the image.
        let add = w.max(h).trunc();
        let padded = frame.padded(add as u32, self.pixel_means);

        let half_edge = ((1.0 + 2.0 * self.extend_ratio) * w / 2.0).floor();
        let cx = ((bbox.x1 + bbox.x2) / 2.0 + add).floor();
        let cy = ((bbox.y1 + bbox.y2) / 2.0 + add).floor();
        let x0 = (cx - half_edge) as i64;
        let y0 = (cy - half_edge) as i64;
        let x1 = (cx + half_edge) as i64;
        let y1 = (cy + half_edge) as i64;

        let Some(crop) = padded.crop(x0, y0, x1, y1) else {
            return Ok(None);
        };
        let (crop_w, crop_h) = (crop.width() as f64, crop.height() as f64);
        let (ox, oy) = (x0.max(0) as f64 - add, y0.max(0) as f64 - add);

        let (iw, ih) = self.model.input_size();
        let output = self.model.infer(&crop.resized(iw, ih))?;

        let needed = 2 * self.point_count + TRAILING_VALUES;
        if output.len() < needed {
            return Err(OracleError::MalformedOutput(format!(
                "landmark output has {} values, expected at least {needed}",
                output.len()
            )));
        }

        let points = output[..2 * self.point_count]
            .chunks_exact(2)
            .map(|xy| {
                (
                    (xy[0] as f64 * crop_w + ox).trunc(),
                    (xy[1] as f64 * crop_h + oy).trunc(),
                )
            })
            .collect();

        let n = output.len();
        let pose = &output[n - TRAILING_VALUES..n - 4];
        let raw_state = &output[n - 4..];
        Ok(Some(LandmarkPrediction {
            landmarks: LandmarkSet::new(points),
            head_pose: [
                pose[0] as f64 * HEAD_POSE_SCALE,
                pose[1] as f64 * HEAD_POSE_SCALE,
                pose[2] as f64 * HEAD_POSE_SCALE,
            ],
            state: [
                sigmoid(raw_state[0] as f64),
                sigmoid(raw_state[1] as f64),
                sigmoid(raw_state[2] as f64),
                sigmoid(raw_state[3] as f64),
            ],
        }))
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    /// Every point at the crop centre, fixed pose and zero state logits.
    struct CentredLandmarks {
        points: usize,
        seen: Vec<(u32, u32)>,
    }

    impl LandmarkModel for CentredLandmarks {
        fn input_size(&self) -> (u32, u32) {
            (160, 160)
        }

        fn infer(&mut self, crop: &Frame) -> Result<Vec<f32>, OracleError> {
            self.seen.push((crop.width(), crop.height()));
            let mut out = vec![0.5; 2 * self.points];
            out.extend([0.1, -0.2, 0.3, 0.0, 0.0, 0.0, 0.0]);
            Ok(out)
        }
    }

    fn adapter(points: usize) -> LandmarkAdapter {
        let model = CentredLandmarks {
            points,
            seen: Vec::new(),
        };
        LandmarkAdapter::new(Box::new(model), &AnalyzerConfig::default())
    }

    #[test]
    fn test_points_mapped_back_to_source() {
        let frame = Frame::filled(400, 400, [50, 50, 50], 0);
        let mut adapter = adapter(68);
        let prediction = adapter
            .predict(&frame, &BoundingBox::new(100.0, 100.0, 200.0, 200.0))
            .unwrap()
            .unwrap();

        // add = 100, square [180, 320) in the padded frame, centre 250 → 150
        assert_eq!(prediction.landmarks.len(), 68);
        assert!(prediction.landmarks.points().iter().all(|&p| p == (150.0, 150.0)));
    }

    #[test]
    fn test_head_pose_and_state_activation() {
        let frame = Frame::filled(400, 400, [50, 50, 50], 0);
        let mut adapter = adapter(68);
        let prediction = adapter
            .predict(&frame, &BoundingBox::new(100.0, 100.0, 200.0, 200.0))
            .unwrap()
            .unwrap();

        assert_relative_eq!(prediction.head_pose[0], 9.0, epsilon = 1e-5);
        assert_relative_eq!(prediction.head_pose[1], -18.0, epsilon = 1e-5);
        assert_relative_eq!(prediction.head_pose[2], 27.0, epsilon = 1e-5);
        assert_eq!(prediction.state, [0.5; 4]);
    }

    #[rstest]
    #[case::both_small(BoundingBox::new(0.0, 0.0, 50.0, 50.0), false)]
    #[case::exactly_min(BoundingBox::new(0.0, 0.0, 60.0, 60.0), false)]
    #[case::tall_enough(BoundingBox::new(0.0, 0.0, 50.0, 80.0), true)]
    #[case::wide_enough(BoundingBox::new(10.0, 10.0, 90.0, 40.0), true)]
    fn test_min_face_filter(#[case] bbox: BoundingBox, #[case] kept: bool) {
        let frame = Frame::filled(200, 200, [0, 0, 0], 0);
        let mut adapter = adapter(68);
        assert_eq!(adapter.predict(&frame, &bbox).unwrap().is_some(), kept);
    }

    #[test]
    fn test_landmark_returns_parallel_lists() {
        let frame = Frame::filled(400, 400, [0, 0, 0], 0);
        let mut adapter = adapter(68);
        let boxes = [
            BoundingBox::new(100.0, 100.0, 200.0, 200.0),
            BoundingBox::new(0.0, 0.0, 20.0, 20.0),
            BoundingBox::new(250.0, 250.0, 330.0, 340.0),
        ];
        let (landmarks, states) = adapter.landmark(&frame, &boxes).unwrap();
        assert_eq!(landmarks.len(), 2);
        assert_eq!(states.len(), 2);
    }

    struct Truncated;

    impl LandmarkModel for Truncated {
        fn input_size(&self) -> (u32, u32) {
            (160, 160)
        }

        fn infer(&mut self, _crop: &Frame) -> Result<Vec<f32>, OracleError> {
            Ok(vec![0.5; 20])
        }
    }

    #[test]
    fn test_short_output_is_malformed() {
        let frame = Frame::filled(400, 400, [0, 0, 0], 0);
        let mut adapter = LandmarkAdapter::new(Box::new(Truncated), &AnalyzerConfig::default());
        let err = adapter
            .predict(&frame, &BoundingBox::new(100.0, 100.0, 200.0, 200.0))
            .unwrap_err();
        assert!(matches!(err, OracleError::MalformedOutput(_)));
    }

    #[test]
    fn test_sigmoid() {
        assert_relative_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.99);
        assert!(sigmoid(-10.0) < 0.01);
    }
}
