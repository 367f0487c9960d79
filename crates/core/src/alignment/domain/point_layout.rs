//! The one place where point-array layout is normalised.
//!
//! Point arrays arrive either as `(K, 2)` (one row per point) or `(2, K)`
//! (one row per axis). A `(2, K)` array with `K >= 3` is transposed; every
//! other layout must already be `(K, 2)` with `K >= 3`.

use ndarray::{Array2, ArrayView2};

use crate::shared::geometry::Point;

use super::alignment_error::AlignmentError;

/// Minimum correspondences any solver accepts.
pub const MIN_POINTS: usize = 3;

/// Normalise a `(K, 2)` or `(2, K)` array into `K` points.
pub fn normalize_points(points: ArrayView2<'_, f64>) -> Result<Vec<Point>, AlignmentError> {
    let (rows, cols) = points.dim();
    if rows.max(cols) < MIN_POINTS || rows.min(cols) != 2 {
        return Err(AlignmentError::ShapeMismatch(format!(
            "points must be shaped (K,2) or (2,K) with K>={MIN_POINTS}, got ({rows},{cols})"
        )));
    }

    let by_point = if rows == 2 {
        points.reversed_axes()
    } else {
        points
    };
    Ok(by_point.rows().into_iter().map(|r| (r[0], r[1])).collect())
}

/// Points as a `(K, 2)` array.
pub fn to_array(points: &[Point]) -> Array2<f64> {
    Array2::from_shape_fn((points.len(), 2), |(i, axis)| {
        if axis == 0 {
            points[i].0
        } else {
            points[i].1
        }
    })
}

/// Check that two point sets can be put into correspondence.
pub fn check_correspondence(observed: &[Point], template: &[Point]) -> Result<(), AlignmentError> {
    if observed.len() != template.len() {
        return Err(AlignmentError::ShapeMismatch(format!(
            "observed has {} points but template has {}",
            observed.len(),
            template.len()
        )));
    }
    if observed.len() < MIN_POINTS {
        return Err(AlignmentError::ShapeMismatch(format!(
            "need at least {MIN_POINTS} points, got {}",
            observed.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rstest::rstest;

    #[test]
    fn test_row_per_point_passes_through() {
        let pts = array![[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]];
        let normalized = normalize_points(pts.view()).unwrap();
        assert_eq!(normalized, vec![(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)]);
    }

    #[test]
    fn test_row_per_axis_is_transposed() {
        let pts = array![[1.0, 3.0, 5.0, 7.0], [2.0, 4.0, 6.0, 8.0]];
        let normalized = normalize_points(pts.view()).unwrap();
        assert_eq!(normalized, vec![(1.0, 2.0), (3.0, 4.0), (5.0, 6.0), (7.0, 8.0)]);
    }

    #[rstest]
    #[case::too_few(Array2::zeros((2, 2)))]
    #[case::three_columns(Array2::zeros((5, 3)))]
    #[case::single_row(Array2::zeros((1, 5)))]
    fn test_invalid_layouts_rejected(#[case] pts: Array2<f64>) {
        assert!(matches!(
            normalize_points(pts.view()),
            Err(AlignmentError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_to_array_round_trip() {
        let pts = vec![(1.0, 2.0), (3.0, 4.0), (5.0, 6.0)];
        assert_eq!(normalize_points(to_array(&pts).view()).unwrap(), pts);
    }

    #[test]
    fn test_correspondence_count_mismatch() {
        let a = vec![(0.0, 0.0); 5];
        let b = vec![(0.0, 0.0); 4];
        assert!(matches!(
            check_correspondence(&a, &b),
            Err(AlignmentError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_correspondence_needs_three_points() {
        let a = vec![(0.0, 0.0); 2];
        assert!(check_correspondence(&a, &a).is_err());
        let c = vec![(0.0, 0.0); 3];
        assert!(check_correspondence(&c, &c).is_ok());
    }
}
