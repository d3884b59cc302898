//! Sea-ice deformation rates from velocity fields.

use crate::error::{BrkupError, Result};
use ndarray::{Array2, Array3, ArrayView2, Axis, Zip};

/// Seconds per day, the default time scaling of the rates.
pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Grid spacing along one direction (m).
#[derive(Debug, Clone, PartialEq)]
pub enum Spacing {
    Uniform(f64),
    /// One value per `(y, x)` cell
    PerCell(Array2<f64>),
}

impl Spacing {
    fn at(&self, j: usize, i: usize) -> f64 {
        match self {
            Spacing::Uniform(d) => *d,
            Spacing::PerCell(d) => d[[j, i]],
        }
    }

    fn check(&self, grid: (usize, usize)) -> Result<()> {
        match self {
            Spacing::PerCell(d) if d.dim() != grid => Err(BrkupError::DimensionMismatch {
                expected: vec![grid.0, grid.1],
                found: vec![d.dim().0, d.dim().1],
            }),
            _ => Ok(()),
        }
    }
}

/// Shear, divergence and total deformation, each `(time, y, x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Deformation {
    pub shear: Array3<f64>,
    pub divergence: Array3<f64>,
    pub total: Array3<f64>,
}

/// Index-space gradient along `axis` of a 2-D field: central differences
/// inside, one-sided first differences at the two ends.
fn gradient(f: &ArrayView2<f64>, axis: usize) -> Result<Array2<f64>> {
    let n = f.len_of(Axis(axis));
    if n < 2 {
        let name = if axis == 0 { "y" } else { "x" };
        return Err(BrkupError::insufficient(name, n, 2));
    }
    let mut out = Array2::zeros(f.dim());
    for ((j, i), g) in out.indexed_iter_mut() {
        let at = |k: usize| if axis == 0 { f[[k, i]] } else { f[[j, k]] };
        let k = if axis == 0 { j } else { i };
        *g = if k == 0 {
            at(1) - at(0)
        } else if k == n - 1 {
            at(n - 1) - at(n - 2)
        } else {
            (at(k + 1) - at(k - 1)) / 2.0
        };
    }
    Ok(out)
}

/// Deformation rates of the `(u, v)` velocity field.
///
/// `dt` converts the rates from per second to the wanted unit; use
/// [`SECONDS_PER_DAY`] for per day.
pub fn deformation_rate(
    u: &Array3<f64>,
    v: &Array3<f64>,
    dx: &Spacing,
    dy: &Spacing,
    dt: f64,
) -> Result<Deformation> {
    if u.dim() != v.dim() {
        return Err(BrkupError::shape_mismatch(format!(
            "u {:?} and v {:?} differ",
            u.dim(),
            v.dim()
        )));
    }
    let (nt, ny, nx) = u.dim();
    dx.check((ny, nx))?;
    dy.check((ny, nx))?;

    let mut shear = Array3::zeros(u.dim());
    let mut divergence = Array3::zeros(u.dim());
    let mut total = Array3::zeros(u.dim());
    for t in 0..nt {
        let (us, vs) = (u.index_axis(Axis(0), t), v.index_axis(Axis(0), t));
        let (du_rows, du_cols) = (gradient(&us, 0)?, gradient(&us, 1)?);
        let (dv_rows, dv_cols) = (gradient(&vs, 0)?, gradient(&vs, 1)?);

        Zip::indexed(divergence.index_axis_mut(Axis(0), t))
            .and(shear.index_axis_mut(Axis(0), t))
            .and(total.index_axis_mut(Axis(0), t))
            .for_each(|(j, i), div, sh, tot| {
                let (hx, hy) = (dx.at(j, i), dy.at(j, i));
                let dudx = du_cols[[j, i]] / hx;
                let dudy = du_rows[[j, i]] / hy;
                let dvdx = dv_cols[[j, i]] / hx;
                let dvdy = dv_rows[[j, i]] / hy;
                *div = dt * (dudx + dvdy);
                *sh = dt * (dudx - dvdy).hypot(dudy + dvdx);
                *tot = div.hypot(*sh);
            });
    }
    Ok(Deformation {
        shear,
        divergence,
        total,
    })
}
