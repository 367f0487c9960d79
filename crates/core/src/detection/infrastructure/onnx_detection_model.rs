/// Face detector graph run through ONNX Runtime via `ort`.
///
/// Expects an NHWC float32 input of raw RGB values and three outputs:
/// normalised `[y1, x1, y2, x2]` boxes `[1, N, 4]`, scores `[1, N]` and the
/// valid detection count `[1]`.
use std::path::Path;

use crate::detection::domain::oracle::{DetectionModel, OracleError, RawDetections};
use crate::shared::frame::Frame;

use super::session::{load_session, nhwc_tensor};

pub struct OnnxDetectionModel {
    session: ort::session::Session,
    input_size: (u32, u32),
}

impl OnnxDetectionModel {
    pub fn new(model_path: &Path, input_size: (u32, u32)) -> Result<Self, OracleError> {
        Ok(Self {
            session: load_session(model_path)?,
            input_size,
        })
    }
}

impl DetectionModel for OnnxDetectionModel {
    fn input_size(&self) -> (u32, u32) {
        self.input_size
    }

    fn infer(&mut self, image: &Frame) -> Result<RawDetections, OracleError> {
        let input_value = ort::value::Tensor::from_array(nhwc_tensor(image))?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() < 3 {
            return Err(OracleError::MalformedOutput(format!(
                "detector expected 3 outputs, got {}",
                outputs.len()
            )));
        }

        let flat_boxes: Vec<f32> = outputs[0]
            .try_extract_array::<f32>()?
            .iter()
            .copied()
            .collect();
        if flat_boxes.len() % 4 != 0 {
            return Err(OracleError::MalformedOutput(format!(
                "box output of {} values is not N×4",
                flat_boxes.len()
            )));
        }
        let boxes: Vec<[f32; 4]> = flat_boxes
            .chunks_exact(4)
            .map(|b| [b[0], b[1], b[2], b[3]])
            .collect();
        let scores: Vec<f32> = outputs[1]
            .try_extract_array::<f32>()?
            .iter()
            .copied()
            .collect();

        // Exported graphs disagree on the count dtype.
        let count = match outputs[2].try_extract_array::<f32>() {
            Ok(arr) => arr.iter().next().map_or(0, |&c| c.max(0.0) as usize),
            Err(_) => outputs[2]
                .try_extract_array::<i32>()?
                .iter()
                .next()
                .map_or(0, |&c| c.max(0) as usize),
        };

        Ok(RawDetections {
            boxes,
            scores,
            count,
        })
    }
}
