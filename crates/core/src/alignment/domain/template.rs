//! Canonical landmark templates that faces are aligned onto.

use std::collections::HashMap;

use crate::shared::geometry::Point;

use super::alignment_error::AlignmentError;

/// Five-point reference (eyes, nose, mouth corners) for a 96×112 crop,
/// offset by one pixel on both axes.
const REFERENCE_96X112: [Point; 5] = [
    (31.294_599_53, 52.696_300_51),
    (66.531_799_32, 52.501_399_99),
    (49.025_199_89, 72.736_602_78),
    (34.549_301_15, 93.365_501_4),
    (63.729_900_36, 93.204_101_56),
];

/// InsightFace/ArcFace five-point reference for a 112×112 crop.
const ARCFACE_112: [Point; 5] = [
    (38.2946, 51.6963),
    (73.5318, 51.5014),
    (56.0252, 71.7366),
    (41.5493, 92.3655),
    (70.7299, 92.2041),
];

/// A named canonical point set and the crop size it is defined for.
#[derive(Clone, Debug, PartialEq)]
pub struct Template {
    name: String,
    points: Vec<Point>,
    /// `(width, height)` of the native crop.
    crop_size: (u32, u32),
}

impl Template {
    pub fn new(name: impl Into<String>, points: Vec<Point>, crop_size: (u32, u32)) -> Self {
        Self {
            name: name.into(),
            points,
            crop_size,
        }
    }

    pub fn reference_96x112() -> Self {
        Self::new("reference_96x112", REFERENCE_96X112.to_vec(), (96, 112))
    }

    pub fn arcface_112() -> Self {
        Self::new("arcface_112", ARCFACE_112.to_vec(), (112, 112))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn crop_size(&self) -> (u32, u32) {
        self.crop_size
    }

    /// Side of the square frame the template is laid out in.
    pub fn reference_side(&self) -> f64 {
        self.crop_size.0.max(self.crop_size.1) as f64
    }

    /// Template points shrunk by `ratio` around the reference centre, then
    /// rescaled so the reference side spans `output_size.0` pixels.
    pub fn scaled_for(&self, output_size: (u32, u32), ratio: f64) -> Vec<Point> {
        let side = self.reference_side();
        let center = side / 2.0;
        let scale = output_size.0 as f64 / side;
        self.points
            .iter()
            .map(|&(x, y)| {
                (
                    ((x - center) * ratio + center) * scale,
                    ((y - center) * ratio + center) * scale,
                )
            })
            .collect()
    }

    /// Derive a template for a padded and resized crop.
    ///
    /// Steps, in order: optionally grow the crop to a square, add
    /// `inner_padding_factor` × size of context around the face, scale
    /// uniformly to fit `output_size` minus the outer padding, then shift by
    /// `outer_padding`. Without an explicit `output_size` it is derived from
    /// the padding.
    pub fn padded(
        &self,
        output_size: Option<(u32, u32)>,
        inner_padding_factor: f64,
        outer_padding: (u32, u32),
        default_square: bool,
    ) -> Result<Template, AlignmentError> {
        let mut points = self.points.clone();
        let mut size = (self.crop_size.0 as f64, self.crop_size.1 as f64);

        if default_square {
            let side = size.0.max(size.1);
            let (dx, dy) = ((side - size.0) / 2.0, (side - size.1) / 2.0);
            shift(&mut points, dx, dy);
            size = (side, side);
        }

        if let Some((w, h)) = output_size {
            if (w as f64, h as f64) == size {
                return Ok(Template::new(self.name.clone(), points, (w, h)));
            }
        }

        if inner_padding_factor == 0.0 && outer_padding == (0, 0) {
            return match output_size {
                None => Ok(Template::new(
                    self.name.clone(),
                    points,
                    (size.0.round() as u32, size.1.round() as u32),
                )),
                Some(out) => Err(AlignmentError::InvalidTemplate(format!(
                    "no padding requested, so output size {out:?} must equal {size:?}"
                ))),
            };
        }

        if !(0.0..=1.0).contains(&inner_padding_factor) {
            return Err(AlignmentError::InvalidTemplate(format!(
                "inner padding factor {inner_padding_factor} outside [0, 1]"
            )));
        }

        let output = output_size.unwrap_or((
            (size.0 * (1.0 + 2.0 * inner_padding_factor)).round() as u32 + outer_padding.0,
            (size.1 * (1.0 + 2.0 * inner_padding_factor)).round() as u32 + outer_padding.1,
        ));
        if 2 * outer_padding.0 >= output.0 || 2 * outer_padding.1 >= output.1 {
            return Err(AlignmentError::InvalidTemplate(format!(
                "outer padding {outer_padding:?} leaves no room in output {output:?}"
            )));
        }

        if inner_padding_factor > 0.0 {
            let dx = size.0 * inner_padding_factor * 2.0;
            let dy = size.1 * inner_padding_factor * 2.0;
            shift(&mut points, dx / 2.0, dy / 2.0);
            size = (size.0 + dx.round(), size.1 + dy.round());
        }

        let inner_w = (output.0 - 2 * outer_padding.0) as f64;
        let inner_h = (output.1 - 2 * outer_padding.1) as f64;
        if (inner_w * size.1 - inner_h * size.0).abs() > 1e-6 {
            return Err(AlignmentError::InvalidTemplate(format!(
                "output {output:?} minus outer padding is not a uniform scale of {size:?}"
            )));
        }

        let scale = inner_w / size.0;
        for p in &mut points {
            p.0 = p.0 * scale + outer_padding.0 as f64;
            p.1 = p.1 * scale + outer_padding.1 as f64;
        }
        Ok(Template::new(self.name.clone(), points, output))
    }
}

fn shift(points: &mut [Point], dx: f64, dy: f64) {
    for p in points {
        p.0 += dx;
        p.1 += dy;
    }
}

/// Immutable name → template lookup, built once and shared.
#[derive(Clone, Debug)]
pub struct TemplateTable {
    templates: HashMap<String, Template>,
}

impl TemplateTable {
    pub fn new(templates: impl IntoIterator<Item = Template>) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
        }
    }

    pub fn builtin() -> Self {
        Self::new([Template::reference_96x112(), Template::arcface_112()])
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn require(&self, name: &str) -> Result<&Template, AlignmentError> {
        self.get(name)
            .ok_or_else(|| AlignmentError::InvalidTemplate(format!("unknown template '{name}'")))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        names.sort();
        names
    }
}

impl Default for TemplateTable {
    fn default() -> Self {
        Self::builtin()
    }
}
