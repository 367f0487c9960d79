/// Mean RGB colour used to pad frames before inference.
pub const PIXEL_MEANS: [u8; 3] = [123, 116, 103];

/// Detector input resolution as `(width, height)`.
pub const DETECT_INPUT_SIZE: (u32, u32) = (512, 512);
pub const DETECT_THRESHOLD: f64 = 0.8;
pub const DETECT_TOP_K: usize = 10;

/// Top-K values above this disable the candidate cap.
pub const TOP_K_UNBOUNDED: usize = 100;

/// Landmarker input resolution as `(width, height)`.
pub const LANDMARK_INPUT_SIZE: (u32, u32) = (160, 160);
pub const LANDMARK_POINT_COUNT: usize = 68;

/// Context added on each side of a detection before landmarking, as a
/// fraction of the box width.
pub const LANDMARK_EXTEND_RATIO: f64 = 0.2;

/// Boxes no larger than this in both dimensions are not landmarked.
pub const MIN_FACE_SIZE: f64 = 60.0;

pub const IOU_THRESHOLD: f64 = 0.5;
pub const BOX_SMOOTHING_ALPHA: f64 = 0.3;
pub const LANDMARK_SMOOTHING_ALPHA: f64 = 0.95;

/// Per-point motion (pixels) below which a landmark keeps its previous value.
pub const LANDMARK_MOTION_THRESHOLD: f64 = 1.0;

/// Mean absolute per-channel difference above which a frame counts as changed.
pub const FRAME_DIFF_THRESHOLD: f64 = 5.0;

/// How tightly canonical crops frame the face; smaller leaves more margin.
pub const TEMPLATE_SHRINK_RATIO: f64 = 0.84;

pub const DEFAULT_TEMPLATE: &str = "reference_96x112";

/// Canonical crop size as `(width, height)`.
pub const CROP_SIZE: (u32, u32) = (96, 112);
