/// 68-point landmark graph run through ONNX Runtime via `ort`.
///
/// The first output is the flat embedding: landmark coordinates, head pose
/// and state logits.
use std::path::Path;

use crate::detection::domain::oracle::{LandmarkModel, OracleError};
use crate::shared::frame::Frame;

use super::session::{load_session, nhwc_tensor};

pub struct OnnxLandmarkModel {
    session: ort::session::Session,
    input_size: (u32, u32),
}

impl OnnxLandmarkModel {
    pub fn new(model_path: &Path, input_size: (u32, u32)) -> Result<Self, OracleError> {
        Ok(Self {
            session: load_session(model_path)?,
            input_size,
        })
    }
}

impl LandmarkModel for OnnxLandmarkModel {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn infer(&mut self, crop: &Frame) -> Result<Vec<f32>, OracleError> {
        let input_value = ort::value::Tensor::from_array(nhwc_tensor(crop))?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err(OracleError::MalformedOutput(
                "landmark model produced no outputs".into(),
            ));
        }
        let embedding = outputs[0].try_extract_array::<f32>()?;
        Ok(embedding.iter().copied().collect())
    }
}
