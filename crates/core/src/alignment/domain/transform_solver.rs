//! Least-squares transform estimation between observed landmarks and a
//! canonical template.
//!
//! Solving runs entirely in f64. The similarity model is the classic
//! `cp2tform` formulation: for every template point `(x, y)` two rows
//! `[x, y, 1, 0]` and `[y, -x, 0, 1]` are stacked, and the observed points
//! form the right-hand side. The solved parameters map template space to
//! observed space; the forward transform is their inverse.

use nalgebra::{DMatrix, DVector, Matrix3, Vector3};

use crate::shared::geometry::Point;

use super::alignment_error::AlignmentError;
use super::point_layout::check_correspondence;
use super::transform::Transform;

/// Rank the similarity design matrix needs for a unique solution.
const SIMILARITY_RANK: usize = 4;

/// Numerical rank tolerance matching the usual `max(m, n) * eps * σ_max` rule.
fn rank_tolerance(singular_values: &DVector<f64>, rows: usize, cols: usize) -> f64 {
    singular_values.max() * rows.max(cols) as f64 * f64::EPSILON
}

/// Similarity transform without reflection.
///
/// Returns `(forward, inverse)` where `forward` maps observed points onto
/// the template.
pub fn solve_nonreflective_similarity(
    observed: &[Point],
    template: &[Point],
) -> Result<(Transform, Transform), AlignmentError> {
    check_correspondence(observed, template)?;

    let m = template.len();
    let mut design = DMatrix::<f64>::zeros(2 * m, 4);
    let mut rhs = DVector::<f64>::zeros(2 * m);
    for (i, (&(x, y), &(u, v))) in template.iter().zip(observed).enumerate() {
        design[(i, 0)] = x;
        design[(i, 1)] = y;
        design[(i, 2)] = 1.0;
        design[(m + i, 0)] = y;
        design[(m + i, 1)] = -x;
        design[(m + i, 3)] = 1.0;
        rhs[i] = u;
        rhs[m + i] = v;
    }

    let (rows, cols) = design.shape();
    let svd = design.svd(true, true);
    let tol = rank_tolerance(&svd.singular_values, rows, cols);
    let rank = svd.rank(tol);
    if rank < SIMILARITY_RANK {
        return Err(AlignmentError::InsufficientPoints(format!(
            "similarity needs 2 distinct correspondences (design rank {rank} < {SIMILARITY_RANK})"
        )));
    }

    let params = svd
        .solve(&rhs, tol)
        .map_err(|e| AlignmentError::InsufficientPoints(e.to_string()))?;
    let (sc, ss, tx, ty) = (params[0], params[1], params[2], params[3]);

    let inverse = Transform::from_affine([[sc, ss, tx], [-ss, sc, ty]]);
    let forward = inverse.inverse()?;
    Ok((forward, inverse))
}

/// Similarity transform that may include a reflection.
///
/// Solves once against the template and once against a mirrored copy of it
/// (x negated), undoes the mirror on the second candidate, and keeps
/// whichever reprojects the observed points closer to the template. Ties go
/// to the non-reflective fit. The caller's points are never modified.
pub fn solve_reflective_similarity(
    observed: &[Point],
    template: &[Point],
) -> Result<(Transform, Transform), AlignmentError> {
    let (direct, direct_inv) = solve_nonreflective_similarity(observed, template)?;

    let mirrored: Vec<Point> = template.iter().map(|&(x, y)| (-x, y)).collect();
    let (to_mirrored, _) = solve_nonreflective_similarity(observed, &mirrored)?;
    let unmirror = Transform::from_affine([[-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
    let reflected = unmirror.then_after(&to_mirrored);

    let direct_err = direct.reprojection_error(observed, template);
    let reflected_err = reflected.reprojection_error(observed, template);
    log::trace!("similarity residuals: direct {direct_err:.4}, reflected {reflected_err:.4}");

    if direct_err <= reflected_err {
        Ok((direct, direct_inv))
    } else {
        let reflected_inv = reflected.inverse()?;
        Ok((reflected, reflected_inv))
    }
}

/// Similarity fit, reflective or not.
pub fn solve_similarity(
    observed: &[Point],
    template: &[Point],
    reflective: bool,
) -> Result<(Transform, Transform), AlignmentError> {
    if reflective {
        solve_reflective_similarity(observed, template)
    } else {
        solve_nonreflective_similarity(observed, template)
    }
}

/// General affine fit by homogeneous least squares `[u, v, 1]·A = [x, y, 1]`.
///
/// When the observed points are collinear (rank 2) the translation is forced
/// to zero; below that the identity is returned.
pub fn solve_affine(observed: &[Point], template: &[Point]) -> Result<Transform, AlignmentError> {
    check_correspondence(observed, template)?;

    let n = observed.len();
    let src = DMatrix::<f64>::from_fn(n, 3, |i, j| match j {
        0 => observed[i].0,
        1 => observed[i].1,
        _ => 1.0,
    });
    let dst = DMatrix::<f64>::from_fn(n, 3, |i, j| match j {
        0 => template[i].0,
        1 => template[i].1,
        _ => 1.0,
    });

    let svd = src.svd(true, true);
    let tol = rank_tolerance(&svd.singular_values, n, 3);
    let rank = svd.rank(tol);
    let a = svd
        .solve(&dst, tol)
        .map_err(|e| AlignmentError::InsufficientPoints(e.to_string()))?;

    let transform = match rank {
        3 => Transform::from_affine([
            [a[(0, 0)], a[(1, 0)], a[(2, 0)]],
            [a[(0, 1)], a[(1, 1)], a[(2, 1)]],
        ]),
        2 => Transform::from_affine([[a[(0, 0)], a[(1, 0)], 0.0], [a[(0, 1)], a[(1, 1)], 0.0]]),
        _ => {
            log::warn!("affine fit has rank {rank}, falling back to identity");
            Transform::identity()
        }
    };
    Ok(transform)
}

/// Exact affine map through the first three correspondences.
pub fn solve_three_point_affine(
    observed: &[Point],
    template: &[Point],
) -> Result<Transform, AlignmentError> {
    check_correspondence(observed, template)?;

    let src = Matrix3::new(
        observed[0].0,
        observed[0].1,
        1.0,
        observed[1].0,
        observed[1].1,
        1.0,
        observed[2].0,
        observed[2].1,
        1.0,
    );
    let src_inv = src.try_inverse().ok_or_else(|| {
        AlignmentError::InsufficientPoints("first three observed points are collinear".into())
    })?;

    let row_x = src_inv * Vector3::new(template[0].0, template[1].0, template[2].0);
    let row_y = src_inv * Vector3::new(template[0].1, template[1].1, template[2].1);
    Ok(Transform::from_affine([
        [row_x[0], row_x[1], row_x[2]],
        [row_y[0], row_y[1], row_y[2]],
    ]))
}
