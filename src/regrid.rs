//! # Regridding
//!
//! Bilinear interpolation from a regular latitude/longitude grid onto an
//! irregular grid given by 2-D longitude/latitude arrays.
//!
//! Each target point is located once, when the [`Regridder`] is built; every
//! time slice then reuses the same cell indices and weights. Slices are
//! interpolated in parallel with rayon and assembled in time order.
//!
//! Target coordinates outside the source bounds are clamped to the nearest
//! bound first, so such points take the boundary value instead of being
//! extrapolated.

use crate::error::{BrkupError, Result};
use crate::grid::{GriddedField, Longitude, RegularField};
use crate::reader;
use chrono::NaiveDate;
use indicatif::ProgressBar;
use log::{debug, info};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;
use std::path::Path;

/// Position of `v` along a strictly increasing axis: the lower node of the
/// bracketing interval and the fractional offset within it. `v` is clamped to
/// the axis range, so the offset stays in `[0, 1]`.
fn locate(axis: &[f64], v: f64) -> (usize, f64) {
    let n = axis.len();
    let v = v.clamp(axis[0], axis[n - 1]);
    let i = axis
        .partition_point(|&a| a <= v)
        .saturating_sub(1)
        .min(n - 2);
    let t = (v - axis[i]) / (axis[i + 1] - axis[i]);
    (i, t)
}

fn check_axis(name: &str, axis: &[f64]) -> Result<()> {
    if axis.len() < 2 {
        return Err(BrkupError::insufficient(name, axis.len(), 2));
    }
    if !axis.windows(2).all(|w| w[1] > w[0]) {
        return Err(BrkupError::NonMonotonicAxis(name.to_string()));
    }
    Ok(())
}

/// Degree-1 bivariate spline over a rectangular grid.
#[derive(Debug, Clone)]
pub struct BilinearSpline<'a> {
    y: &'a [f64],
    x: &'a [f64],
    values: ArrayView2<'a, f64>,
}

impl<'a> BilinearSpline<'a> {
    /// `values` is indexed `(y, x)`.
    pub fn new(y: &'a [f64], x: &'a [f64], values: ArrayView2<'a, f64>) -> Result<Self> {
        check_axis("y", y)?;
        check_axis("x", x)?;
        if values.dim() != (y.len(), x.len()) {
            return Err(BrkupError::shape_mismatch(format!(
                "values {:?} do not match axes ({}, {})",
                values.dim(),
                y.len(),
                x.len()
            )));
        }
        Ok(BilinearSpline { y, x, values })
    }

    pub fn eval(&self, y: f64, x: f64) -> f64 {
        let (j, ty) = locate(self.y, y);
        let (i, tx) = locate(self.x, x);
        Stencil { j, i, ty, tx }.apply(&self.values)
    }
}

#[derive(Debug, Clone, Copy)]
struct Stencil {
    j: usize,
    i: usize,
    ty: f64,
    tx: f64,
}

impl Stencil {
    fn apply(&self, values: &ArrayView2<f64>) -> f64 {
        let Stencil { j, i, ty, tx } = *self;
        let bottom = values[[j, i]] * (1.0 - tx) + values[[j, i + 1]] * tx;
        let top = values[[j + 1, i]] * (1.0 - tx) + values[[j + 1, i + 1]] * tx;
        bottom * (1.0 - ty) + top * ty
    }
}

/// Interpolates fields on one regular source grid onto one irregular target
/// grid.
#[derive(Debug, Clone)]
pub struct Regridder {
    source_shape: (usize, usize),
    target_longitude: Array2<f64>,
    target_latitude: Array2<f64>,
    stencils: Array2<Stencil>,
    progress: ProgressBar,
}

impl Regridder {
    /// Source axes must be strictly increasing with at least two points each.
    /// Target longitudes are converted to the source's longitude convention.
    pub fn new(
        source_latitude: &[f64],
        source_longitude: &[f64],
        target_longitude: &Array2<f64>,
        target_latitude: &Array2<f64>,
    ) -> Result<Self> {
        if target_longitude.dim() != target_latitude.dim() {
            return Err(BrkupError::shape_mismatch(format!(
                "target longitude {:?} and latitude {:?} differ",
                target_longitude.dim(),
                target_latitude.dim()
            )));
        }
        check_axis("latitude", source_latitude)?;
        check_axis("longitude", source_longitude)?;

        let convention = Longitude::detect(source_longitude);
        let target_longitude = convention.normalize_array(target_longitude);
        let mut stencils = Array2::from_elem(
            target_longitude.dim(),
            Stencil {
                j: 0,
                i: 0,
                ty: 0.0,
                tx: 0.0,
            },
        );
        ndarray::Zip::from(&mut stencils)
            .and(&target_longitude)
            .and(target_latitude)
            .for_each(|s, &lon, &lat| {
                let (j, ty) = locate(source_latitude, lat);
                let (i, tx) = locate(source_longitude, lon);
                *s = Stencil { j, i, ty, tx };
            });
        debug!(
            "regridder {}x{} -> {:?} ({:?} longitudes)",
            source_latitude.len(),
            source_longitude.len(),
            target_longitude.dim(),
            convention
        );
        Ok(Regridder {
            source_shape: (source_latitude.len(), source_longitude.len()),
            target_longitude,
            target_latitude: target_latitude.clone(),
            stencils,
            progress: ProgressBar::hidden(),
        })
    }

    /// Ticks `progress` once per interpolated time slice.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    /// Target longitudes in the source convention.
    pub fn target_longitude(&self) -> &Array2<f64> {
        &self.target_longitude
    }

    /// Interpolates one `(lat, lon)` slice.
    pub fn regrid_slice(&self, values: ArrayView2<f64>) -> Result<Array2<f64>> {
        if values.dim() != self.source_shape {
            return Err(BrkupError::shape_mismatch(format!(
                "slice {:?} does not match source grid {:?}",
                values.dim(),
                self.source_shape
            )));
        }
        Ok(self.stencils.mapv(|s| s.apply(&values)))
    }

    /// Interpolates every time slice of `field`; the result keeps the
    /// field's time axis.
    pub fn regrid(&self, field: &RegularField) -> Result<GriddedField> {
        let nt = field.data.len_of(Axis(0));
        self.progress.set_length(nt as u64);
        let slices: Vec<Array2<f64>> = (0..nt)
            .into_par_iter()
            .map(|t| {
                let out = self.regrid_slice(field.data.index_axis(Axis(0), t));
                self.progress.inc(1);
                out
            })
            .collect::<Result<_>>()?;
        self.progress.finish_and_clear();

        let views: Vec<_> = slices.iter().map(|s| s.view()).collect();
        let data: Array3<f64> = ndarray::stack(Axis(0), &views)
            .map_err(|e| BrkupError::shape_mismatch(format!("cannot stack slices: {}", e)))?;
        GriddedField::new(
            field.name.clone(),
            data,
            self.target_longitude.clone(),
            self.target_latitude.clone(),
            field.time.clone(),
        )
    }
}

/// Regrids the data variable of a reanalysis file onto a mooring file's grid,
/// optionally keeping only the dates in an inclusive range.
///
/// # Arguments
///
/// * `era_file` - Regular lat/lon file; its first data variable is used
/// * `mooring_file` - File providing 2-D `longitude`/`latitude`
/// * `dates` - Inclusive `(start, end)` dates to keep, or all time steps
/// * `progress` - Bar ticked once per regridded time slice
///
/// # Returns
///
/// A [`GriddedField`] named after the reanalysis variable, on the mooring
/// grid, with longitudes in the reanalysis convention.
///
/// # Errors
///
/// Fails on unreadable files, a missing `time` variable when `dates` is
/// given, or source axes that are too short or not monotonic.
pub fn regrid_era_to_mooring<P: AsRef<Path>, Q: AsRef<Path>>(
    era_file: P,
    mooring_file: Q,
    dates: Option<(NaiveDate, NaiveDate)>,
    progress: ProgressBar,
) -> Result<GriddedField> {
    let mut field = reader::open_regular(era_file.as_ref())?;
    if let Some((start, end)) = dates {
        let time = field
            .time
            .as_ref()
            .ok_or_else(|| BrkupError::MissingVariable("time".to_string()))?;
        let indices = time.indices_between(start, end);
        field = field.select_time(&indices)?;
    }

    let mooring = netcdf::open(mooring_file.as_ref())?;
    let longitude = reader::read_2d(&mooring, "longitude")?;
    let latitude = reader::read_2d(&mooring, "latitude")?;

    let regridder = Regridder::new(&field.latitude, &field.longitude, &longitude, &latitude)?
        .with_progress(progress);
    let out = regridder.regrid(&field)?;
    info!(
        "regridded '{}' ({} time steps) onto {:?}",
        out.name,
        out.n_time(),
        out.grid_shape()
    );
    Ok(out)
}
