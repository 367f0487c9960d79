//! Seams to the pretrained models. Adapters in this module own all pre- and
//! post-processing; implementations only run inference.

use thiserror::Error;

use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum OracleError {
    #[error("failed to load model: {0}")]
    Load(String),
    #[error("inference failed: {0}")]
    Inference(#[from] ort::Error),
    #[error("malformed model output: {0}")]
    MalformedOutput(String),
}

/// Raw detector output before any filtering.
///
/// Boxes are `[y1, x1, y2, x2]` normalised to the model input.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RawDetections {
    pub boxes: Vec<[f32; 4]>,
    pub scores: Vec<f32>,
    /// Number of valid leading entries in `boxes` and `scores`.
    pub count: usize,
}

/// Face detection model taking a fixed-size RGB image.
pub trait DetectionModel: Send {
    /// `(width, height)` the model expects.
    fn input_size(&self) -> (u32, u32);

    fn infer(&mut self, image: &Frame) -> Result<RawDetections, OracleError>;
}

/// Landmark model taking a fixed-size RGB face crop.
///
/// Output is flat: `2 * point_count` normalised coordinates, then a head
/// pose triplet in `[-7..-4]`, then 4 pre-activation state values.
pub trait LandmarkModel: Send {
    /// `(width, height)` the model expects.
    fn input_size(&self) -> (u32, u32);

    fn infer(&mut self, crop: &Frame) -> Result<Vec<f32>, OracleError>;
}
