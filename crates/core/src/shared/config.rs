use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::alignment::domain::face_warper::AlignMode;
use crate::shared::constants;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Every tunable of the analysis pipeline in one flat struct.
///
/// Missing JSON fields fall back to the defaults below, so a config file
/// only needs to list what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Detector input `(width, height)`.
    pub detect_input_size: (u32, u32),
    /// Detections must score strictly above this.
    pub detect_threshold: f64,
    /// Maximum faces landmarked per frame, largest first. Above 100 = no cap.
    pub detect_top_k: usize,

    /// Landmarker input `(width, height)`.
    pub landmark_input_size: (u32, u32),
    pub landmark_point_count: usize,
    pub landmark_extend_ratio: f64,
    pub min_face_size: f64,
    /// Fill colour for letterboxing and crop padding.
    pub pixel_means: [u8; 3],

    pub box_iou_threshold: f64,
    pub box_alpha: f64,
    /// Corner motion (pixels) below which a box corner is held. 0 disables.
    pub box_motion_threshold: f64,
    pub landmark_iou_threshold: f64,
    pub landmark_alpha: f64,
    pub landmark_motion_threshold: f64,

    pub template_name: String,
    /// Canonical crop `(width, height)`.
    pub crop_size: (u32, u32),
    pub shrink_ratio: f64,
    pub align_mode: AlignMode,
    /// Try the mirrored similarity fit too and keep the better one.
    pub reflective: bool,

    pub frame_diff_threshold: f64,
    /// Reuse the previous result when the frame barely changed.
    pub skip_unchanged_frames: bool,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            detect_input_size: constants::DETECT_INPUT_SIZE,
            detect_threshold: constants::DETECT_THRESHOLD,
            detect_top_k: constants::DETECT_TOP_K,
            landmark_input_size: constants::LANDMARK_INPUT_SIZE,
            landmark_point_count: constants::LANDMARK_POINT_COUNT,
            landmark_extend_ratio: constants::LANDMARK_EXTEND_RATIO,
            min_face_size: constants::MIN_FACE_SIZE,
            pixel_means: constants::PIXEL_MEANS,
            box_iou_threshold: constants::IOU_THRESHOLD,
            box_alpha: constants::BOX_SMOOTHING_ALPHA,
            box_motion_threshold: 0.0,
            landmark_iou_threshold: constants::IOU_THRESHOLD,
            landmark_alpha: constants::LANDMARK_SMOOTHING_ALPHA,
            landmark_motion_threshold: constants::LANDMARK_MOTION_THRESHOLD,
            template_name: constants::DEFAULT_TEMPLATE.to_string(),
            crop_size: constants::CROP_SIZE,
            shrink_ratio: constants::TEMPLATE_SHRINK_RATIO,
            align_mode: AlignMode::Similarity,
            reflective: true,
            frame_diff_threshold: constants::FRAME_DIFF_THRESHOLD,
            skip_unchanged_frames: false,
        }
    }
}

impl AnalyzerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let json = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, alpha) in [
            ("box_alpha", self.box_alpha),
            ("landmark_alpha", self.landmark_alpha),
        ] {
            if !(0.0..=1.0).contains(&alpha) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {alpha}"
                )));
            }
        }
        for (name, iou) in [
            ("box_iou_threshold", self.box_iou_threshold),
            ("landmark_iou_threshold", self.landmark_iou_threshold),
        ] {
            if !(0.0..=1.0).contains(&iou) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be within [0, 1], got {iou}"
                )));
            }
        }
        if self.shrink_ratio <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "shrink_ratio must be positive, got {}",
                self.shrink_ratio
            )));
        }
        let sizes = [
            ("detect_input_size", self.detect_input_size),
            ("landmark_input_size", self.landmark_input_size),
            ("crop_size", self.crop_size),
        ];
        for (name, (w, h)) in sizes {
            if w == 0 || h == 0 {
                return Err(ConfigError::Invalid(format!("{name} must be non-zero")));
            }
        }
        if self.landmark_point_count == 0 {
            return Err(ConfigError::Invalid(
                "landmark_point_count must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_pipeline() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.detect_top_k, 10);
        assert_relative_eq!(config.detect_threshold, 0.8);
        assert_relative_eq!(config.box_alpha, 0.3);
        assert_relative_eq!(config.landmark_alpha, 0.95);
        assert_relative_eq!(config.shrink_ratio, 0.84);
        assert_eq!(config.align_mode, AlignMode::Similarity);
        assert!(config.reflective);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            AnalyzerConfig::from_json_str(r#"{"box_alpha": 0.5, "align_mode": "affine"}"#)
                .unwrap();
        assert_relative_eq!(config.box_alpha, 0.5);
        assert_eq!(config.align_mode, AlignMode::Affine);
        assert_eq!(config.detect_top_k, 10);
    }

    #[test]
    fn test_out_of_range_alpha_rejected() {
        let err = AnalyzerConfig::from_json_str(r#"{"landmark_alpha": 1.5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_zero_crop_size_rejected() {
        let err = AnalyzerConfig::from_json_str(r#"{"crop_size": [0, 112]}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        let err = AnalyzerConfig::from_json_str("{ not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"template_name": "arcface_112", "crop_size": [112, 112]}}"#).unwrap();
        let config = AnalyzerConfig::load(file.path()).unwrap();
        assert_eq!(config.template_name, "arcface_112");
        assert_eq!(config.crop_size, (112, 112));
    }

    #[test]
    fn test_load_missing_file_is_read_error() {
        let err = AnalyzerConfig::load(Path::new("/nonexistent/facealign.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
