use image::{imageops, Rgb, RgbImage};

use crate::shared::config::AnalyzerConfig;
use crate::shared::constants::TOP_K_UNBOUNDED;
use crate::shared::frame::Frame;
use crate::shared::geometry::BoundingBox;

use super::oracle::{DetectionModel, OracleError};

/// Detector adapter: letterboxes frames for the model and turns its raw
/// output into source-pixel boxes.
pub struct FaceDetector {
    model: Box<dyn DetectionModel>,
    threshold: f64,
    top_k: usize,
    pixel_means: [u8; 3],
}

impl FaceDetector {
    pub fn new(model: Box<dyn DetectionModel>, config: &AnalyzerConfig) -> Self {
        Self {
            model,
            threshold: config.detect_threshold,
            top_k: config.detect_top_k,
            pixel_means: config.pixel_means,
        }
    }

    /// Faces in `frame`, scored strictly above the threshold and capped to
    /// the `top_k` largest.
    pub fn detect(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, OracleError> {
        let input_size = self.model.input_size();
        let (input, scale) = letterbox(frame, input_size, self.pixel_means);
        let raw = self.model.infer(&input)?;

        let count = raw.count.min(raw.boxes.len()).min(raw.scores.len());
        let sx = input_size.0 as f64 / scale;
        let sy = input_size.1 as f64 / scale;

        // Compared at the model's precision so a score of exactly 0.8 stays out.
        let threshold = self.threshold as f32;
        let boxes: Vec<BoundingBox> = raw.boxes[..count]
            .iter()
            .zip(&raw.scores[..count])
            .filter(|(_, &score)| score > threshold)
            .map(|([y1, x1, y2, x2], &score)| {
                BoundingBox::new(
                    *x1 as f64 * sx,
                    *y1 as f64 * sy,
                    *x2 as f64 * sx,
                    *y2 as f64 * sy,
                )
                .with_score(score as f64)
            })
            .collect();

        log::debug!(
            "frame {}: {} raw detections, {} above {}",
            frame.index(),
            count,
            boxes.len(),
            self.threshold
        );
        Ok(select_largest(boxes, self.top_k))
    }
}

/// Resize `frame` to fit `target` keeping its aspect ratio, anchored at the
/// top-left corner and padded with `fill`.
///
/// Returns the model input and the applied scale.
fn letterbox(frame: &Frame, (tw, th): (u32, u32), fill: [u8; 3]) -> (Frame, f64) {
    let scale = (tw as f64 / frame.width() as f64).min(th as f64 / frame.height() as f64);
    let new_w = ((frame.width() as f64 * scale).round() as u32).clamp(1, tw);
    let new_h = ((frame.height() as f64 * scale).round() as u32).clamp(1, th);

    let resized = frame.resized(new_w, new_h);
    let mut canvas = RgbImage::from_pixel(tw, th, Rgb(fill));
    imageops::replace(&mut canvas, &resized.as_image(), 0, 0);
    (Frame::from_rgb_image(canvas, frame.index()), scale)
}

/// Keep the `k` largest boxes by area, largest first; ties keep their
/// original order. Lists within the cap, or a cap above
/// [`TOP_K_UNBOUNDED`], pass through untouched.
pub fn select_largest(mut boxes: Vec<BoundingBox>, k: usize) -> Vec<BoundingBox> {
    if k > TOP_K_UNBOUNDED || boxes.len() <= k {
        return boxes;
    }
    boxes.sort_by(|a, b| b.area().total_cmp(&a.area()));
    boxes.truncate(k);
    boxes
}
