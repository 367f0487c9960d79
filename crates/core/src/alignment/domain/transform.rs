use nalgebra::{Matrix3, Vector3};

use crate::shared::geometry::Point;

use super::alignment_error::AlignmentError;

/// Homogeneous 2D transform acting on column vectors: `[x', y', 1]ᵀ = M·[x, y, 1]ᵀ`.
///
/// Kept in f64; [`Transform::to_affine_f32`] is the only narrowing point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    matrix: Matrix3<f64>,
}

impl Transform {
    pub fn from_matrix(matrix: Matrix3<f64>) -> Self {
        Self { matrix }
    }

    pub fn identity() -> Self {
        Self::from_matrix(Matrix3::identity())
    }

    /// Build from the top two rows of an affine matrix.
    pub fn from_affine(rows: [[f64; 3]; 2]) -> Self {
        Self::from_matrix(Matrix3::new(
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], 0.0, 0.0, 1.0,
        ))
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn apply(&self, (x, y): Point) -> Point {
        let p = self.matrix * Vector3::new(x, y, 1.0);
        (p.x / p.z, p.y / p.z)
    }

    pub fn apply_all(&self, points: &[Point]) -> Vec<Point> {
        points.iter().map(|&p| self.apply(p)).collect()
    }

    /// `self` applied after `first`.
    pub fn then_after(&self, first: &Transform) -> Transform {
        Transform::from_matrix(self.matrix * first.matrix)
    }

    pub fn inverse(&self) -> Result<Transform, AlignmentError> {
        self.matrix
            .try_inverse()
            .map(|mut inv| {
                // Affine inputs stay affine; drop round-off in the projective row.
                inv[(2, 0)] = 0.0;
                inv[(2, 1)] = 0.0;
                inv[(2, 2)] = 1.0;
                Transform::from_matrix(inv)
            })
            .ok_or_else(|| AlignmentError::InsufficientPoints("transform is singular".into()))
    }

    /// Euclidean (Frobenius) norm of `apply(src) - dst` over all points.
    pub fn reprojection_error(&self, src: &[Point], dst: &[Point]) -> f64 {
        src.iter()
            .zip(dst)
            .map(|(&s, &(dx, dy))| {
                let (px, py) = self.apply(s);
                (px - dx).powi(2) + (py - dy).powi(2)
            })
            .sum::<f64>()
            .sqrt()
    }

    /// Uniform scale of the linear part (exact for similarity transforms).
    pub fn scale(&self) -> f64 {
        self.matrix[(0, 0)].hypot(self.matrix[(1, 0)])
    }

    /// Rotation angle of the linear part in radians.
    pub fn rotation(&self) -> f64 {
        self.matrix[(1, 0)].atan2(self.matrix[(0, 0)])
    }

    pub fn translation(&self) -> (f64, f64) {
        (self.matrix[(0, 2)], self.matrix[(1, 2)])
    }

    /// Reduced 2×3 matrix in f32, ready for a warp.
    pub fn to_affine_f32(&self) -> [[f32; 3]; 2] {
        let m = &self.matrix;
        [
            [m[(0, 0)] as f32, m[(0, 1)] as f32, m[(0, 2)] as f32],
            [m[(1, 0)] as f32, m[(1, 1)] as f32, m[(1, 2)] as f32],
        ]
    }
}
