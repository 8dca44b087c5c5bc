//! Box and polygon geometry.
//!
//! Polygons are flat `[x0, y0, x1, y1, ...]` coordinate lists. The batch
//! functions take a slice of polygons; the `poly_*` wrappers handle one.

use std::cmp::Ordering;

use crate::utils::round_to;

/// Decimal places kept in normalized label coordinates.
pub const COORD_DECIMALS: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageDims {
    pub width: f64,
    pub height: f64,
}

impl ImageDims {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width as f64,
            height: height as f64,
        }
    }
}

/// Convert absolute polygons to coordinates normalized by the image size.
pub fn polys_abs_to_norm(polys: &[Vec<f64>], dims: ImageDims) -> Vec<Vec<f64>> {
    polys
        .iter()
        .map(|poly| scale_poly(poly, 1.0 / dims.width, 1.0 / dims.height))
        .collect()
}

/// Convert normalized polygons back to absolute coordinates.
pub fn polys_norm_to_abs(polys: &[Vec<f64>], dims: ImageDims) -> Vec<Vec<f64>> {
    polys
        .iter()
        .map(|poly| scale_poly(poly, dims.width, dims.height))
        .collect()
}

pub fn poly_abs_to_norm(poly: &[f64], dims: ImageDims) -> Vec<f64> {
    scale_poly(poly, 1.0 / dims.width, 1.0 / dims.height)
}

pub fn poly_norm_to_abs(poly: &[f64], dims: ImageDims) -> Vec<f64> {
    scale_poly(poly, dims.width, dims.height)
}

// x at even indices, y at odd
fn scale_poly(poly: &[f64], fx: f64, fy: f64) -> Vec<f64> {
    poly.iter()
        .enumerate()
        .map(|(i, v)| if i % 2 == 0 { v * fx } else { v * fy })
        .collect()
}

/// A sign annotation as four absolute pixel corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CornerBox {
    pub lower_left: (i32, i32),
    pub lower_right: (i32, i32),
    pub upper_left: (i32, i32),
    pub upper_right: (i32, i32),
}

impl CornerBox {
    /// Parse `llx lly lrx lry ulx uly urx ury`.
    pub fn from_coords(c: [i32; 8]) -> Self {
        Self {
            lower_left: (c[0], c[1]),
            lower_right: (c[2], c[3]),
            upper_left: (c[4], c[5]),
            upper_right: (c[6], c[7]),
        }
    }

    /// Both left corners must lie on the same side of the right corners, and
    /// both lower corners on the same side of the upper ones.
    pub fn ordering_error(&self) -> Option<String> {
        // differences of i32 values always fit in i64
        let lower_dx = i64::from(self.lower_right.0) - i64::from(self.lower_left.0);
        let upper_dx = i64::from(self.upper_right.0) - i64::from(self.upper_left.0);
        if lower_dx.signum() * upper_dx.signum() < 0 {
            return Some("left and right corners are swapped on one edge".to_string());
        }
        let left_dy = i64::from(self.lower_left.1) - i64::from(self.upper_left.1);
        let right_dy = i64::from(self.lower_right.1) - i64::from(self.upper_right.1);
        if left_dy.signum() * right_dy.signum() < 0 {
            return Some("lower and upper corners are swapped on one side".to_string());
        }
        None
    }

    /// Axis-aligned center box derived from the lower edge and left side,
    /// normalized and rounded to [`COORD_DECIMALS`].
    pub fn to_norm_box(&self, dims: ImageDims) -> NormBox {
        let (llx, lly) = self.lower_left;
        let (lrx, _) = self.lower_right;
        let (_, uly) = self.upper_left;
        let (llx, lly, lrx, uly) = (llx as f64, lly as f64, lrx as f64, uly as f64);

        let x_center = (llx + lrx) / 2.0;
        let y_center = (lly + uly) / 2.0;
        let width = (llx - lrx).abs();
        let height = (lly - uly).abs();

        NormBox {
            x_center: round_to(x_center / dims.width, COORD_DECIMALS),
            y_center: round_to(y_center / dims.height, COORD_DECIMALS),
            width: round_to(width / dims.width, COORD_DECIMALS),
            height: round_to(height / dims.height, COORD_DECIMALS),
        }
    }
}

/// A YOLO box: center and size, all normalized to `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormBox {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl NormBox {
    pub fn is_normalized(&self) -> bool {
        [self.x_center, self.y_center, self.width, self.height]
            .iter()
            .all(|v| (0.0..=1.0).contains(v))
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Corners as a flat normalized polygon `ll, lr, ul, ur`.
    pub fn to_corner_poly(&self) -> Vec<f64> {
        let left = self.x_center - self.width / 2.0;
        let right = self.x_center + self.width / 2.0;
        let lower = self.y_center - self.height / 2.0;
        let upper = self.y_center + self.height / 2.0;
        vec![left, lower, right, lower, left, upper, right, upper]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Clockwise,
    CounterClockwise,
}

/// Order vertices around their centroid, starting at the vertex closest to
/// the top-left corner of their bounding box.
pub fn sort_vertices(vertices: &[[f64; 2]], direction: Direction) -> Vec<[f64; 2]> {
    let n = vertices.len();
    if n == 0 {
        return Vec::new();
    }

    let cx = vertices.iter().map(|v| v[0]).sum::<f64>() / n as f64;
    let cy = vertices.iter().map(|v| v[1]).sum::<f64>() / n as f64;

    // Descending angle: clockwise on screen, starting from 3 o'clock
    let mut sorted: Vec<(f64, [f64; 2])> = vertices
        .iter()
        .map(|v| ((v[1] - cy).atan2(v[0] - cx), *v))
        .collect();
    sorted.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));
    let mut sorted: Vec<[f64; 2]> = sorted.into_iter().map(|(_, v)| v).collect();
    if direction == Direction::CounterClockwise {
        sorted.reverse();
    }

    let left = sorted.iter().map(|v| v[0]).fold(f64::INFINITY, f64::min);
    let top = sorted.iter().map(|v| v[1]).fold(f64::INFINITY, f64::min);
    let top_left = sorted
        .iter()
        .enumerate()
        .map(|(i, v)| (i, (v[0] - left).hypot(v[1] - top)))
        .fold((0, f64::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
        .0;
    sorted.rotate_left(top_left);
    sorted
}

/// Split a flat polygon into `[x, y]` vertices; a trailing odd value is dropped.
pub fn to_vertices(poly: &[f64]) -> Vec<[f64; 2]> {
    poly.chunks_exact(2).map(|c| [c[0], c[1]]).collect()
}
