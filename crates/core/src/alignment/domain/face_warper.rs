use image::{Rgb, RgbImage};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::shared::constants::TEMPLATE_SHRINK_RATIO;
use crate::shared::frame::Frame;
use crate::shared::geometry::Point;

use super::alignment_error::AlignmentError;
use super::point_layout::{check_correspondence, normalize_points};
use super::template::Template;
use super::transform::Transform;
use super::transform_solver::{solve_affine, solve_similarity, solve_three_point_affine};

/// Colour of crop pixels that fall outside the source frame.
const BORDER: Rgb<u8> = Rgb([255, 255, 255]);

/// Transform family fitted between landmarks and template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignMode {
    #[default]
    Similarity,
    Affine,
    /// Exact fit through the first three correspondences.
    ThreePointAffine,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlignOptions {
    pub mode: AlignMode,
    /// Only consulted for [`AlignMode::Similarity`].
    pub reflective: bool,
    /// Template shrink factor around its centre.
    pub ratio: f64,
}

impl Default for AlignOptions {
    fn default() -> Self {
        Self {
            mode: AlignMode::Similarity,
            reflective: true,
            ratio: TEMPLATE_SHRINK_RATIO,
        }
    }
}

/// A canonical crop plus the transforms that produced it.
#[derive(Debug, Clone)]
pub struct AlignedFace {
    pub crop: Frame,
    /// Source pixels → crop pixels.
    pub forward: Transform,
    /// Crop pixels → source pixels, for pasting results back.
    pub inverse: Transform,
}

/// Fit a transform from `landmarks` onto `template` and resample `frame`
/// into an `output_size` crop.
pub fn warp_and_crop(
    frame: &Frame,
    landmarks: &[Point],
    template: &Template,
    output_size: (u32, u32),
    options: &AlignOptions,
) -> Result<AlignedFace, AlignmentError> {
    let target = template.scaled_for(output_size, options.ratio);
    check_correspondence(landmarks, &target)?;

    let (forward, inverse) = match options.mode {
        AlignMode::Similarity => solve_similarity(landmarks, &target, options.reflective)?,
        AlignMode::Affine => with_inverse(solve_affine(landmarks, &target)?)?,
        AlignMode::ThreePointAffine => with_inverse(solve_three_point_affine(landmarks, &target)?)?,
    };

    let crop = resample(frame, &forward, output_size)?;
    Ok(AlignedFace {
        crop,
        forward,
        inverse,
    })
}

/// [`warp_and_crop`] for landmarks laid out as `(K, 2)` or `(2, K)`.
pub fn warp_and_crop_array(
    frame: &Frame,
    landmarks: ArrayView2<'_, f64>,
    template: &Template,
    output_size: (u32, u32),
    options: &AlignOptions,
) -> Result<AlignedFace, AlignmentError> {
    let points = normalize_points(landmarks)?;
    warp_and_crop(frame, &points, template, output_size, options)
}

fn with_inverse(forward: Transform) -> Result<(Transform, Transform), AlignmentError> {
    let inverse = forward.inverse()?;
    Ok((forward, inverse))
}

fn resample(
    frame: &Frame,
    forward: &Transform,
    (width, height): (u32, u32),
) -> Result<Frame, AlignmentError> {
    let [r0, r1] = forward.to_affine_f32();
    let projection = Projection::from_matrix([
        r0[0], r0[1], r0[2], r1[0], r1[1], r1[2], 0.0, 0.0, 1.0,
    ])
    .ok_or_else(|| AlignmentError::InsufficientPoints("warp matrix is not invertible".into()))?;

    let source = frame.to_rgb_image();
    let mut out = RgbImage::new(width, height);
    warp_into(&source, &projection, Interpolation::Bilinear, BORDER, &mut out);
    Ok(Frame::from_rgb_image(out, frame.index()))
}
