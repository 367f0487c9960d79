use std::path::Path;
use std::time::Instant;

use thiserror::Error;

use crate::alignment::domain::alignment_error::AlignmentError;
use crate::alignment::domain::face_warper::{warp_and_crop, AlignOptions, AlignedFace};
use crate::alignment::domain::template::TemplateTable;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::five_points::five_points;
use crate::detection::domain::landmark_adapter::LandmarkAdapter;
use crate::detection::domain::oracle::{DetectionModel, LandmarkModel, OracleError};
use crate::detection::infrastructure::onnx_detection_model::OnnxDetectionModel;
use crate::detection::infrastructure::onnx_landmark_model::OnnxLandmarkModel;
use crate::shared::config::{AnalyzerConfig, ConfigError};
use crate::shared::frame::Frame;
use crate::shared::geometry::{BoundingBox, LandmarkSet};
use crate::tracking::domain::frame_change::FrameChangeDetector;
use crate::tracking::domain::temporal_tracker::{TemporalTracker, TrackerParams};

use super::analysis_logger::{AnalysisLogger, NullAnalysisLogger};

#[derive(Error, Debug)]
pub enum AnalyzerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Oracle(#[from] OracleError),
    #[error(transparent)]
    Alignment(#[from] AlignmentError),
}

/// Per-frame output. All lists are parallel and sorted by descending box
/// area.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionResult {
    pub boxes: Vec<BoundingBox>,
    pub landmarks: Vec<LandmarkSet>,
    pub states: Vec<[f64; 4]>,
    /// Yaw, pitch, roll in degrees.
    pub head_poses: Vec<[f64; 3]>,
}

impl DetectionResult {
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    fn sorted_by_area(self) -> Self {
        let mut order: Vec<usize> = (0..self.boxes.len()).collect();
        order.sort_by(|&a, &b| self.boxes[b].area().total_cmp(&self.boxes[a].area()));
        Self {
            boxes: order.iter().map(|&i| self.boxes[i]).collect(),
            landmarks: order.iter().map(|&i| self.landmarks[i].clone()).collect(),
            states: order.iter().map(|&i| self.states[i]).collect(),
            head_poses: order.iter().map(|&i| self.head_poses[i]).collect(),
        }
    }
}

/// Per-stream face analysis: detect, landmark, stabilise, and on demand
/// align faces into canonical crops.
///
/// Owns all cross-frame state; one instance per video stream.
pub struct FaceAnalyzer {
    config: AnalyzerConfig,
    detector: FaceDetector,
    landmarker: LandmarkAdapter,
    box_tracker: TemporalTracker<BoundingBox>,
    landmark_tracker: TemporalTracker<LandmarkSet>,
    change_detector: FrameChangeDetector,
    last_result: Option<DetectionResult>,
    templates: TemplateTable,
    logger: Box<dyn AnalysisLogger>,
}

impl FaceAnalyzer {
    pub fn new(
        detection_model: Box<dyn DetectionModel>,
        landmark_model: Box<dyn LandmarkModel>,
        config: AnalyzerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let templates = TemplateTable::builtin();
        if templates.get(&config.template_name).is_none() {
            return Err(ConfigError::Invalid(format!(
                "unknown template '{}', available: {:?}",
                config.template_name,
                templates.names()
            )));
        }

        Ok(Self {
            detector: FaceDetector::new(detection_model, &config),
            landmarker: LandmarkAdapter::new(landmark_model, &config),
            box_tracker: TemporalTracker::new(TrackerParams::new(
                config.box_iou_threshold,
                config.box_alpha,
                config.box_motion_threshold,
            )),
            landmark_tracker: TemporalTracker::new(TrackerParams::new(
                config.landmark_iou_threshold,
                config.landmark_alpha,
                config.landmark_motion_threshold,
            )),
            change_detector: FrameChangeDetector::new(config.frame_diff_threshold),
            last_result: None,
            templates,
            logger: Box::new(NullAnalysisLogger),
            config,
        })
    }

    /// Build an analyzer backed by ONNX models on disk.
    pub fn from_model_files(
        detection_model: &Path,
        landmark_model: &Path,
        config: AnalyzerConfig,
    ) -> Result<Self, AnalyzerError> {
        let detection = OnnxDetectionModel::new(detection_model, config.detect_input_size)?;
        let landmark = OnnxLandmarkModel::new(landmark_model, config.landmark_input_size)?;
        Ok(Self::new(Box::new(detection), Box::new(landmark), config)?)
    }

    pub fn with_logger(mut self, logger: Box<dyn AnalysisLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Analyse one frame.
    ///
    /// Model failures are logged and reported as a frame without faces;
    /// tracker state is left as it was.
    pub fn run(&mut self, frame: &Frame) -> DetectionResult {
        if self.config.skip_unchanged_frames && !self.change_detector.changed(frame) {
            if let Some(previous) = &self.last_result {
                log::trace!("frame {} unchanged, reusing result", frame.index());
                self.logger.frame_done(frame.index());
                return previous.clone();
            }
        }

        let result = match self.analyze(frame) {
            Ok(result) => result,
            Err(e) => {
                log::warn!("frame {}: {e}; reporting no faces", frame.index());
                DetectionResult::default()
            }
        };
        self.logger.metric("faces", result.len() as f64);
        self.logger.frame_done(frame.index());
        self.last_result = Some(result.clone());
        result
    }

    fn analyze(&mut self, frame: &Frame) -> Result<DetectionResult, OracleError> {
        let t0 = Instant::now();
        let detections = self.detector.detect(frame)?;
        self.logger.timing("detect", elapsed_ms(t0));

        let t0 = Instant::now();
        let mut coarse = DetectionResult::default();
        for detection in &detections {
            let Some(prediction) = self.landmarker.predict(frame, detection)? else {
                continue;
            };
            coarse.boxes.push(BoundingBox {
                score: detection.score,
                ..prediction.landmarks.bounding_box()
            });
            coarse.landmarks.push(prediction.landmarks);
            coarse.states.push(prediction.state);
            coarse.head_poses.push(prediction.head_pose);
        }
        self.logger.timing("landmark", elapsed_ms(t0));

        let t0 = Instant::now();
        // Landmark extents are first pulled towards this frame's detections,
        // then smoothed against the previous frame.
        let boxes = self.box_tracker.blend(coarse.boxes, &detections);
        let tracked = DetectionResult {
            boxes: self.box_tracker.update(boxes),
            landmarks: self.landmark_tracker.update(coarse.landmarks),
            states: coarse.states,
            head_poses: coarse.head_poses,
        };
        self.logger.timing("track", elapsed_ms(t0));

        log::debug!(
            "frame {}: {} detections, {} faces",
            frame.index(),
            detections.len(),
            tracked.len()
        );
        Ok(tracked.sorted_by_area())
    }

    /// Warp one face of `frame` into the configured canonical crop.
    ///
    /// 68-point sets are reduced to five points first; sets that already
    /// match the template's point count are used as they are.
    pub fn align(
        &self,
        frame: &Frame,
        landmarks: &LandmarkSet,
    ) -> Result<AlignedFace, AlignmentError> {
        let template = self.templates.require(&self.config.template_name)?;
        let options = AlignOptions {
            mode: self.config.align_mode,
            reflective: self.config.reflective,
            ratio: self.config.shrink_ratio,
        };

        if landmarks.len() == template.points().len() {
            warp_and_crop(
                frame,
                landmarks.points(),
                template,
                self.config.crop_size,
                &options,
            )
        } else {
            let five = five_points(landmarks, frame)?;
            warp_and_crop(frame, &five, template, self.config.crop_size, &options)
        }
    }

    /// Forget all cross-frame state.
    pub fn reset(&mut self) {
        self.box_tracker.reset();
        self.landmark_tracker.reset();
        self.change_detector.reset();
        self.last_result = None;
    }

    /// Report accumulated timings through the logger.
    pub fn summary(&self) {
        self.logger.summary();
    }
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::domain::oracle::RawDetections;
    use approx::assert_relative_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Plays back one detection set per call, repeating the last.
    struct ScriptedDetections {
        frames: Vec<Vec<([f32; 4], f32)>>,
        calls: Arc<AtomicUsize>,
    }

    impl DetectionModel for ScriptedDetections {
        fn input_size(&self) -> (u32, u32) {
            (512, 512)
        }

        fn infer(&mut self, _image: &Frame) -> Result<RawDetections, OracleError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            let dets = &self.frames[call.min(self.frames.len() - 1)];
            Ok(RawDetections {
                boxes: dets.iter().map(|d| d.0).collect(),
                scores: dets.iter().map(|d| d.1).collect(),
                count: dets.len(),
            })
        }
    }

    /// 68 points: the first at 30% of the crop, the second at 70%, the
    /// rest centred.
    struct SpreadLandmarks;

    impl LandmarkModel for SpreadLandmarks {
        fn input_size(&self) -> (u32, u32) {
            (160, 160)
        }

        fn infer(&mut self, _crop: &Frame) -> Result<Vec<f32>, OracleError> {
            let mut out = vec![0.5; 136];
            out[..4].copy_from_slice(&[0.3, 0.3, 0.7, 0.7]);
            out.extend([0.0; 7]);
            Ok(out)
        }
    }

    /// Like `SpreadLandmarks` but reaching 20% and 80% of the crop, so the
    /// landmark extent overlaps the detection box.
    struct WideLandmarks;

    impl LandmarkModel for WideLandmarks {
        fn input_size(&self) -> (u32, u32) {
            (160, 160)
        }

        fn infer(&mut self, _crop: &Frame) -> Result<Vec<f32>, OracleError> {
            let mut out = vec![0.5; 136];
            out[..4].copy_from_slice(&[0.2, 0.2, 0.8, 0.8]);
            out.extend([0.0; 7]);
            Ok(out)
        }
    }

    struct Offline;

    impl DetectionModel for Offline {
        fn input_size(&self) -> (u32, u32) {
            (512, 512)
        }

        fn infer(&mut self, _image: &Frame) -> Result<RawDetections, OracleError> {
            Err(OracleError::Load("session closed".into()))
        }
    }

    const LARGE: ([f32; 4], f32) = ([0.1, 0.1, 0.5, 0.5], 0.9);
    const SMALL: ([f32; 4], f32) = ([0.6, 0.6, 0.8, 0.8], 0.95);
    const LARGE_MOVED: ([f32; 4], f32) = ([0.11, 0.12, 0.51, 0.52], 0.9);

    fn analyzer_with(
        frames: Vec<Vec<([f32; 4], f32)>>,
        config: AnalyzerConfig,
    ) -> (FaceAnalyzer, Arc<AtomicUsize>) {
        analyzer_with_landmarks(frames, Box::new(SpreadLandmarks), config)
    }

    fn analyzer_with_landmarks(
        frames: Vec<Vec<([f32; 4], f32)>>,
        landmarks: Box<dyn LandmarkModel>,
        config: AnalyzerConfig,
    ) -> (FaceAnalyzer, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let detection = ScriptedDetections {
            frames,
            calls: Arc::clone(&calls),
        };
        let analyzer = FaceAnalyzer::new(Box::new(detection), landmarks, config).unwrap();
        (analyzer, calls)
    }

    fn analyzer(frames: Vec<Vec<([f32; 4], f32)>>) -> FaceAnalyzer {
        analyzer_with(frames, AnalyzerConfig::default()).0
    }

    fn frame(index: usize) -> Frame {
        Frame::filled(512, 512, [90, 90, 90], index)
    }

    #[test]
    fn test_results_are_parallel_and_sorted_by_area() {
        let mut analyzer = analyzer(vec![vec![SMALL, LARGE]]);
        let result = analyzer.run(&frame(0));

        assert_eq!(result.len(), 2);
        assert_eq!(result.landmarks.len(), 2);
        assert_eq!(result.states.len(), 2);
        assert_eq!(result.head_poses.len(), 2);
        assert!(result.boxes[0].area() > result.boxes[1].area());
        assert_relative_eq!(result.boxes[0].score.unwrap(), 0.9, epsilon = 1e-6);
        assert_relative_eq!(result.boxes[1].score.unwrap(), 0.95, epsilon = 1e-6);
    }

    #[test]
    fn test_box_without_overlapping_detection_is_landmark_extent() {
        // the narrow landmark extent overlaps the detection by IOU ~0.32
        let mut analyzer = analyzer(vec![vec![LARGE]]);
        let result = analyzer.run(&frame(0));
        assert_eq!(result.boxes[0].as_array(), result.landmarks[0].extent());
        assert_eq!(result.states[0], [0.5; 4]);
    }

    #[test]
    fn test_box_is_blended_with_overlapping_detection() {
        let (mut analyzer, _) = analyzer_with_landmarks(
            vec![vec![LARGE]],
            Box::new(WideLandmarks),
            AnalyzerConfig::default(),
        );
        let result = analyzer.run(&frame(0));

        // LARGE maps to [51.2, 51.2, 256, 256] on a 512x512 frame
        let detection = [51.2, 51.2, 256.0, 256.0];
        let extent = result.landmarks[0].extent();
        assert_ne!(extent, detection);
        for ((got, lm), det) in result.boxes[0].as_array().iter().zip(extent).zip(detection) {
            assert_relative_eq!(*got, 0.3 * lm + 0.7 * det, epsilon = 1e-3);
        }
        assert_relative_eq!(result.boxes[0].score.unwrap(), 0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_second_frame_is_smoothed_against_first() {
        let mut tracked = analyzer(vec![vec![LARGE], vec![LARGE_MOVED]]);
        let first = tracked.run(&frame(0));
        let second = tracked.run(&frame(1));

        let raw = analyzer(vec![vec![LARGE_MOVED]]).run(&frame(1));

        let (prev, now, out) = (first.boxes[0], raw.boxes[0], second.boxes[0]);
        assert_relative_eq!(out.x1, 0.3 * now.x1 + 0.7 * prev.x1, epsilon = 1e-9);
        assert_relative_eq!(out.y2, 0.3 * now.y2 + 0.7 * prev.y2, epsilon = 1e-9);

        let (p, n, o) = (
            first.landmarks[0].points()[0],
            raw.landmarks[0].points()[0],
            second.landmarks[0].points()[0],
        );
        assert_relative_eq!(o.0, 0.95 * n.0 + 0.05 * p.0, epsilon = 1e-9);
    }

    #[test]
    fn test_oracle_failure_reports_no_faces() {
        let mut analyzer = FaceAnalyzer::new(
            Box::new(Offline),
            Box::new(SpreadLandmarks),
            AnalyzerConfig::default(),
        )
        .unwrap();
        assert!(analyzer.run(&frame(0)).is_empty());
    }

    #[test]
    fn test_unchanged_frame_reuses_result() {
        let config = AnalyzerConfig {
            skip_unchanged_frames: true,
            ..AnalyzerConfig::default()
        };
        let (mut analyzer, calls) = analyzer_with(vec![vec![LARGE]], config);
        let first = analyzer.run(&frame(0));
        let second = analyzer.run(&frame(1));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_slow_drift_eventually_triggers_detection() {
        let config = AnalyzerConfig {
            skip_unchanged_frames: true,
            ..AnalyzerConfig::default()
        };
        let (mut analyzer, calls) = analyzer_with(vec![vec![LARGE]], config);
        for i in 0..20 {
            let level = 40 + 4 * i as u8;
            analyzer.run(&Frame::filled(512, 512, [level; 3], i));
        }
        // each step is 4, under the threshold of 5, but the drift accumulates
        assert_eq!(calls.load(Ordering::SeqCst), 10);
    }

    #[test]
    fn test_reset_restarts_tracking() {
        let mut analyzer = analyzer(vec![vec![LARGE], vec![LARGE_MOVED]]);
        analyzer.run(&frame(0));
        analyzer.reset();
        let after_reset = analyzer.run(&frame(1));
        let raw = self::analyzer(vec![vec![LARGE_MOVED]]).run(&frame(1));
        assert_eq!(after_reset, raw);
    }

    #[test]
    fn test_unknown_template_is_rejected() {
        let config = AnalyzerConfig {
            template_name: "nope".into(),
            ..AnalyzerConfig::default()
        };
        let result = FaceAnalyzer::new(Box::new(Offline), Box::new(SpreadLandmarks), config);
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_align_reduces_68_points_and_crops() {
        let mut analyzer = analyzer(vec![vec![LARGE]]);
        let frame = frame(0);
        let result = analyzer.run(&frame);

        // spread the centred points so the five-point fit is well posed
        let mut points = result.landmarks[0].points().to_vec();
        let (cx, cy) = points[30];
        for (i, p) in points.iter_mut().enumerate() {
            let angle = i as f64 * 0.37;
            *p = (cx + 40.0 * angle.cos(), cy + 40.0 * angle.sin());
        }
        let aligned = analyzer.align(&frame, &LandmarkSet::new(points)).unwrap();
        assert_eq!(aligned.crop.width(), 96);
        assert_eq!(aligned.crop.height(), 112);
    }
}
