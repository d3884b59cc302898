//! ERA5 file layout and sea-level-pressure gradients.

use crate::error::{BrkupError, Result};
use crate::grid::{Longitude, RegularField};
use log::debug;
use ndarray::Axis;
use std::path::{Path, PathBuf};

/// Daily ERA5 file of `variable` for `year` under `root`.
pub fn era5_path<P: AsRef<Path>>(root: P, variable: &str, year: i32) -> PathBuf {
    root.as_ref()
        .join("ERA5")
        .join("daily")
        .join(format!("ERA5_{}_y{}_daily.nc", variable, year))
}

fn nearest(axis: &[f64], value: f64) -> Option<usize> {
    axis.iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| (*a - value).abs().total_cmp(&(*b - value).abs()))
        .map(|(i, _)| i)
}

/// Index `(lat, lon)` of the grid point nearest to a `(lon, lat)` position,
/// with longitudes compared in `[-180, 180)`.
pub fn nearest_point(field: &RegularField, point: (f64, f64)) -> Result<(usize, usize)> {
    let lons: Vec<f64> = field
        .longitude
        .iter()
        .map(|&lon| Longitude::PlusMinus180.normalize(lon))
        .collect();
    let target_lon = Longitude::PlusMinus180.normalize(point.0);
    let i = nearest(&lons, target_lon).ok_or_else(|| BrkupError::insufficient("longitude", 0, 1))?;
    let j = nearest(&field.latitude, point.1).ok_or_else(|| BrkupError::insufficient("latitude", 0, 1))?;
    Ok((j, i))
}

/// Per time step, the field at the grid point nearest `start` minus the one
/// nearest `end`. Positions are `(lon, lat)` in degrees.
pub fn slp_gradient(field: &RegularField, start: (f64, f64), end: (f64, f64)) -> Result<Vec<f64>> {
    let (j0, i0) = nearest_point(field, start)?;
    let (j1, i1) = nearest_point(field, end)?;
    debug!(
        "pressure difference between ({}, {}) and ({}, {})",
        field.longitude[i0], field.latitude[j0], field.longitude[i1], field.latitude[j1]
    );
    Ok(field
        .data
        .axis_iter(Axis(0))
        .map(|slice| slice[[j0, i0]] - slice[[j1, i1]])
        .collect())
}
