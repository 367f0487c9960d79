//! Reduce a 68-point landmark set to the five points templates are defined
//! on: left pupil, right pupil, nose tip, left and right mouth corner.

use std::ops::Range;

use image::{imageops, GrayImage, Luma};
use imageproc::contrast::{equalize_histogram, otsu_level};
use imageproc::drawing::draw_polygon_mut;
use imageproc::point::Point as PixelPoint;

use crate::alignment::domain::alignment_error::AlignmentError;
use crate::shared::frame::Frame;
use crate::shared::geometry::{LandmarkSet, Point};

// Full six-point contours so the pupil mask polygon closes over the whole eye.
const LEFT_EYE: Range<usize> = 36..42;
const RIGHT_EYE: Range<usize> = 42..48;
const NOSE_TIP: usize = 30;
const MOUTH_LEFT: usize = 48;
const MOUTH_RIGHT: usize = 54;
const REQUIRED_POINTS: usize = 68;

/// Five alignment points from a 68-point set.
///
/// Pupils come from [`find_pupil`]; if either search fails both eyes fall
/// back to the mean of their contour points.
pub fn five_points(landmarks: &LandmarkSet, frame: &Frame) -> Result<[Point; 5], AlignmentError> {
    if landmarks.len() < REQUIRED_POINTS {
        return Err(AlignmentError::ShapeMismatch(format!(
            "five-point extraction needs {REQUIRED_POINTS} landmarks, got {}",
            landmarks.len()
        )));
    }
    let points = landmarks.points();

    let pupils = find_pupil(&points[LEFT_EYE], frame).zip(find_pupil(&points[RIGHT_EYE], frame));
    let (left, right) = match pupils {
        Some(found) => found,
        None => {
            log::warn!("pupil search failed, using eye contour means");
            contour_means(landmarks)
        }
    };

    Ok([
        left,
        right,
        points[NOSE_TIP],
        points[MOUTH_LEFT],
        points[MOUTH_RIGHT],
    ])
}

fn contour_means(landmarks: &LandmarkSet) -> (Point, Point) {
    // Both ranges are in bounds once the 68-point check has passed.
    let left = landmarks.mean_of(LEFT_EYE).unwrap_or_default();
    let right = landmarks.mean_of(RIGHT_EYE).unwrap_or_default();
    (left, right)
}

/// Locate the pupil inside an eye contour.
///
/// The contour's integer bounding box is cut from the frame, equalised and
/// Otsu-thresholded. Dark pixels inside the contour polygon vote, and the
/// upper median column and row win. With no votes the region centre is used.
/// Returns `None` when the box is empty or leaves the frame.
pub fn find_pupil(contour: &[Point], frame: &Frame) -> Option<Point> {
    if contour.is_empty() {
        return None;
    }
    let xmin = contour.iter().map(|p| p.0).fold(f64::INFINITY, f64::min) as i64;
    let xmax = contour.iter().map(|p| p.0).fold(f64::NEG_INFINITY, f64::max) as i64;
    let ymin = contour.iter().map(|p| p.1).fold(f64::INFINITY, f64::min) as i64;
    let ymax = contour.iter().map(|p| p.1).fold(f64::NEG_INFINITY, f64::max) as i64;

    if ymin >= ymax
        || xmin >= xmax
        || xmin < 0
        || ymin < 0
        || xmax > frame.width() as i64
        || ymax > frame.height() as i64
    {
        return None;
    }

    let eye = frame.crop(xmin, ymin, xmax, ymax)?;
    let gray = equalize_histogram(&imageops::grayscale(&eye.as_image()));
    let level = otsu_level(&gray);
    let mask = contour_mask(contour, xmin, ymin, gray.width(), gray.height());

    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (x, y, pixel) in gray.enumerate_pixels() {
        if pixel[0] <= level && mask.get_pixel(x, y)[0] > 0 {
            xs.push(x as f64);
            ys.push(y as f64);
        }
    }

    let (px, py) = if xs.is_empty() {
        (gray.width() as f64 / 2.0, gray.height() as f64 / 2.0)
    } else {
        // Pixels are visited row-major, so rows are already sorted.
        xs.sort_by(f64::total_cmp);
        let mid = xs.len() / 2;
        (xs[mid], ys[mid])
    };
    Some((px + xmin as f64, py + ymin as f64))
}

fn contour_mask(contour: &[Point], ox: i64, oy: i64, width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    let mut poly: Vec<PixelPoint<i32>> = Vec::with_capacity(contour.len());
    for &(x, y) in contour {
        let p = PixelPoint::new(x as i32 - ox as i32, y as i32 - oy as i32);
        if poly.last() != Some(&p) {
            poly.push(p);
        }
    }
    while poly.len() > 1 && poly.first() == poly.last() {
        poly.pop();
    }
    if poly.len() >= 3 {
        draw_polygon_mut(&mut mask, &poly, Luma([1]));
    }
    mask
}
