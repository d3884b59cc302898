//! Transects through gridded fields in pixel coordinates.

use crate::error::{BrkupError, Result};
use ndarray::{Array1, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Straight line from `(x0, y0)` to `(x1, y1)` in pixel coordinates, where
/// `x` counts columns and `y` rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Line {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Line {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Line { x0, y0, x1, y1 }
    }

    /// `num` equally spaced points, both ends included.
    pub fn points(&self, num: usize) -> Vec<(f64, f64)> {
        match num {
            0 => Vec::new(),
            1 => vec![(self.x0, self.y0)],
            _ => (0..num)
                .map(|k| {
                    let t = k as f64 / (num - 1) as f64;
                    (self.x0 + t * (self.x1 - self.x0), self.y0 + t * (self.y1 - self.y0))
                })
                .collect(),
        }
    }
}

/// Bilinear sample at a fractional pixel position. Positions outside the
/// image take the value of the nearest edge; NaN counts as zero.
fn sample(image: &ArrayView2<f64>, x: f64, y: f64) -> f64 {
    let (ny, nx) = image.dim();
    let value = |j: usize, i: usize| {
        let v = image[[j, i]];
        if v.is_nan() { 0.0 } else { v }
    };
    let x = x.clamp(0.0, (nx - 1) as f64);
    let y = y.clamp(0.0, (ny - 1) as f64);
    let (i0, j0) = (x.floor() as usize, y.floor() as usize);
    let (i1, j1) = ((i0 + 1).min(nx - 1), (j0 + 1).min(ny - 1));
    let (tx, ty) = (x - i0 as f64, y - j0 as f64);
    let top = value(j0, i0) * (1.0 - tx) + value(j0, i1) * tx;
    let bottom = value(j1, i0) * (1.0 - tx) + value(j1, i1) * tx;
    top * (1.0 - ty) + bottom * ty
}

/// Samples a 2-D image along `line`.
pub fn extract_transect(image: ArrayView2<f64>, line: &Line, num: usize) -> Result<Array1<f64>> {
    let (ny, nx) = image.dim();
    if ny == 0 || nx == 0 {
        return Err(BrkupError::insufficient(if ny == 0 { "y" } else { "x" }, 0, 1));
    }
    Ok(line
        .points(num)
        .into_iter()
        .map(|(x, y)| sample(&image, x, y))
        .collect())
}

/// Samples every time step of a `(time, y, x)` field; the result is
/// `(time, num)`.
pub fn extract_transect_series(field: &Array3<f64>, line: &Line, num: usize) -> Result<Array2<f64>> {
    let mut out = Array2::zeros((field.len_of(Axis(0)), num));
    for (t, slice) in field.axis_iter(Axis(0)).enumerate() {
        out.row_mut(t).assign(&extract_transect(slice, line, num)?);
    }
    Ok(out)
}
