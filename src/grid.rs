//! # Gridded Data Containers
//!
//! - [`GriddedField`]: one `(time, y, x)` field on an irregular grid with 2-D
//!   longitude/latitude.
//! - [`Dataset`]: several fields sharing one irregular grid and time axis,
//!   the in-memory form of a mooring file.
//! - [`RegularField`]: a `(time, lat, lon)` field on a regular grid with 1-D
//!   coordinates, the in-memory form of a reanalysis file.
//! - [`BoundingBox`]: pixel-index box for rectangular subsetting.
//! - [`Longitude`]: the single place where longitude conventions are converted.

use crate::error::{BrkupError, Result};
use crate::time::{Period, TimeAxis};
use ndarray::{s, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Longitude conventions found in the input products.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Longitude {
    /// `[0, 360)`, used by ERA5.
    ZeroTo360,
    /// `[-180, 180)`, used by the model grids.
    PlusMinus180,
}

impl Longitude {
    /// Detects the convention of a set of longitudes: anything above 180
    /// degrees means `[0, 360)`.
    pub fn detect<'a>(lons: impl IntoIterator<Item = &'a f64>) -> Self {
        if lons.into_iter().any(|&lon| lon > 180.0) {
            Longitude::ZeroTo360
        } else {
            Longitude::PlusMinus180
        }
    }

    pub fn normalize(&self, lon: f64) -> f64 {
        match self {
            Longitude::ZeroTo360 => lon.rem_euclid(360.0),
            Longitude::PlusMinus180 => (lon + 180.0).rem_euclid(360.0) - 180.0,
        }
    }

    pub fn normalize_array(&self, lons: &Array2<f64>) -> Array2<f64> {
        lons.mapv(|lon| self.normalize(lon))
    }
}

/// Pixel-index box `(x0, x1, y0, y1)` over the trailing `(y, x)` axes.
/// Bounds are half-open and clamped to the grid like array slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: usize,
    pub x1: usize,
    pub y0: usize,
    pub y1: usize,
}

impl BoundingBox {
    pub const fn new(x0: usize, x1: usize, y0: usize, y1: usize) -> Self {
        BoundingBox { x0, x1, y0, y1 }
    }

    /// Row and column ranges after clamping to a `(ny, nx)` grid.
    pub fn ranges(&self, ny: usize, nx: usize) -> Result<(std::ops::Range<usize>, std::ops::Range<usize>)> {
        let rows = self.y0.min(ny)..self.y1.min(ny);
        let cols = self.x0.min(nx)..self.x1.min(nx);
        if rows.is_empty() || cols.is_empty() {
            return Err(BrkupError::InvalidBox(format!(
                "{:?} selects no cells of a {}x{} grid",
                self, ny, nx
            )));
        }
        Ok((rows, cols))
    }

    pub fn apply2(&self, array: &Array2<f64>) -> Result<Array2<f64>> {
        let (ny, nx) = array.dim();
        let (rows, cols) = self.ranges(ny, nx)?;
        Ok(array.slice(s![rows, cols]).to_owned())
    }

    pub fn apply3(&self, array: &Array3<f64>) -> Result<Array3<f64>> {
        let (_, ny, nx) = array.dim();
        let (rows, cols) = self.ranges(ny, nx)?;
        Ok(array.slice(s![.., rows, cols]).to_owned())
    }
}

fn check_coords(data_yx: (usize, usize), lon: &Array2<f64>, lat: &Array2<f64>) -> Result<()> {
    if lon.dim() != lat.dim() {
        return Err(BrkupError::shape_mismatch(format!(
            "longitude {:?} and latitude {:?} differ",
            lon.dim(),
            lat.dim()
        )));
    }
    if lon.dim() != data_yx {
        return Err(BrkupError::shape_mismatch(format!(
            "coordinates {:?} do not match data (y, x) {:?}",
            lon.dim(),
            data_yx
        )));
    }
    Ok(())
}

fn check_time(nt: usize, time: &Option<TimeAxis>) -> Result<()> {
    match time {
        Some(axis) if axis.len() != nt => Err(BrkupError::shape_mismatch(format!(
            "time axis has {} values, data has {} time steps",
            axis.len(),
            nt
        ))),
        None if nt != 1 => Err(BrkupError::shape_mismatch(format!(
            "{} time steps but no time coordinate",
            nt
        ))),
        _ => Ok(()),
    }
}

/// A scalar field on an irregular `(y, x)` grid.
#[derive(Debug, Clone, PartialEq)]
pub struct GriddedField {
    pub name: String,
    pub data: Array3<f64>,
    pub longitude: Array2<f64>,
    pub latitude: Array2<f64>,
    pub time: Option<TimeAxis>,
}

impl GriddedField {
    pub fn new(
        name: impl Into<String>,
        data: Array3<f64>,
        longitude: Array2<f64>,
        latitude: Array2<f64>,
        time: Option<TimeAxis>,
    ) -> Result<Self> {
        let (nt, ny, nx) = data.dim();
        check_coords((ny, nx), &longitude, &latitude)?;
        check_time(nt, &time)?;
        Ok(GriddedField {
            name: name.into(),
            data,
            longitude,
            latitude,
            time,
        })
    }

    /// Wraps a 2-D field as a single time step without a time coordinate.
    pub fn from_2d(
        name: impl Into<String>,
        data: Array2<f64>,
        longitude: Array2<f64>,
        latitude: Array2<f64>,
    ) -> Result<Self> {
        Self::new(name, data.insert_axis(Axis(0)), longitude, latitude, None)
    }

    pub fn grid_shape(&self) -> (usize, usize) {
        self.longitude.dim()
    }

    pub fn n_time(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    pub fn slice(&self, t: usize) -> ArrayView2<'_, f64> {
        self.data.index_axis(Axis(0), t)
    }

    pub fn subset(&self, bbox: &BoundingBox) -> Result<Self> {
        Ok(GriddedField {
            name: self.name.clone(),
            data: bbox.apply3(&self.data)?,
            longitude: bbox.apply2(&self.longitude)?,
            latitude: bbox.apply2(&self.latitude)?,
            time: self.time.clone(),
        })
    }
}

/// Fields sharing one irregular grid, as read from a mooring file.
///
/// Time-dependent variables are stored as `(time, y, x)`; static ones such as
/// cell area as `(y, x)`.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    pub longitude: Array2<f64>,
    pub latitude: Array2<f64>,
    pub time: Option<TimeAxis>,
    pub variables: BTreeMap<String, Array3<f64>>,
    pub statics: BTreeMap<String, Array2<f64>>,
}

impl Dataset {
    pub fn new(longitude: Array2<f64>, latitude: Array2<f64>, time: Option<TimeAxis>) -> Result<Self> {
        check_coords(longitude.dim(), &longitude, &latitude)?;
        Ok(Dataset {
            longitude,
            latitude,
            time,
            variables: BTreeMap::new(),
            statics: BTreeMap::new(),
        })
    }

    pub fn grid_shape(&self) -> (usize, usize) {
        self.longitude.dim()
    }

    pub fn n_time(&self) -> usize {
        self.time.as_ref().map(|t| t.len()).unwrap_or(1)
    }

    pub fn insert(&mut self, name: impl Into<String>, data: Array3<f64>) -> Result<()> {
        let (nt, ny, nx) = data.dim();
        check_coords((ny, nx), &self.longitude, &self.latitude)?;
        check_time(nt, &self.time)?;
        self.variables.insert(name.into(), data);
        Ok(())
    }

    pub fn insert_static(&mut self, name: impl Into<String>, data: Array2<f64>) -> Result<()> {
        check_coords(data.dim(), &self.longitude, &self.latitude)?;
        self.statics.insert(name.into(), data);
        Ok(())
    }

    pub fn var(&self, name: &str) -> Result<&Array3<f64>> {
        self.variables
            .get(name)
            .ok_or_else(|| BrkupError::MissingVariable(name.to_string()))
    }

    pub fn var_mut(&mut self, name: &str) -> Result<&mut Array3<f64>> {
        self.variables
            .get_mut(name)
            .ok_or_else(|| BrkupError::MissingVariable(name.to_string()))
    }

    /// A static field, falling back to the first time step of a
    /// time-dependent variable of the same name.
    pub fn static_field(&self, name: &str) -> Result<Array2<f64>> {
        if let Some(field) = self.statics.get(name) {
            return Ok(field.clone());
        }
        Ok(self.var(name)?.index_axis(Axis(0), 0).to_owned())
    }

    pub fn field(&self, name: &str) -> Result<GriddedField> {
        GriddedField::new(
            name,
            self.var(name)?.clone(),
            self.longitude.clone(),
            self.latitude.clone(),
            self.time.clone(),
        )
    }

    pub fn subset(&self, bbox: &BoundingBox) -> Result<Self> {
        let mut out = Dataset::new(
            bbox.apply2(&self.longitude)?,
            bbox.apply2(&self.latitude)?,
            self.time.clone(),
        )?;
        for (name, data) in &self.variables {
            out.variables.insert(name.clone(), bbox.apply3(data)?);
        }
        for (name, data) in &self.statics {
            out.statics.insert(name.clone(), bbox.apply2(data)?);
        }
        Ok(out)
    }

    /// Keeps the given time steps of every time-dependent variable.
    pub fn select_time(&self, indices: &[usize]) -> Result<Self> {
        let time = self
            .time
            .as_ref()
            .ok_or_else(|| BrkupError::MissingVariable("time".to_string()))?;
        let mut out = Dataset::new(
            self.longitude.clone(),
            self.latitude.clone(),
            Some(time.select(indices)),
        )?;
        for (name, data) in &self.variables {
            out.variables.insert(name.clone(), data.select(Axis(0), indices));
        }
        out.statics = self.statics.clone();
        Ok(out)
    }

    /// Averages every time-dependent variable over each period, skipping NaN.
    /// The result is labelled with the start of each period.
    pub fn time_mean(&self, period: Period) -> Result<Self> {
        let time = self
            .time
            .as_ref()
            .ok_or_else(|| BrkupError::MissingVariable("time".to_string()))?;
        let groups = period.groups(time);
        let labels: Vec<_> = groups.iter().map(|(label, _)| *label).collect();
        let axis = TimeAxis::from_datetimes(time.units.clone(), &labels);

        let mut out = Dataset::new(self.longitude.clone(), self.latitude.clone(), Some(axis))?;
        let (ny, nx) = self.grid_shape();
        for (name, data) in &self.variables {
            let mut averaged = Array3::<f64>::from_elem((groups.len(), ny, nx), f64::NAN);
            for (g, (_, indices)) in groups.iter().enumerate() {
                let slab = data.select(Axis(0), indices);
                averaged
                    .index_axis_mut(Axis(0), g)
                    .assign(&nanmean_axis0(&slab));
            }
            out.variables.insert(name.clone(), averaged);
        }
        out.statics = self.statics.clone();
        Ok(out)
    }

    /// Concatenates datasets along time. Coordinates and static fields come
    /// from the first dataset; variables missing from any part are dropped.
    pub fn concat_time(parts: Vec<Dataset>) -> Result<Self> {
        let first = parts
            .first()
            .ok_or_else(|| BrkupError::insufficient("files", 0, 1))?;
        let axes: Vec<&TimeAxis> = parts.iter().filter_map(|p| p.time.as_ref()).collect();
        if axes.len() != parts.len() {
            return Err(BrkupError::MissingVariable("time".to_string()));
        }
        let time = TimeAxis::concat(&axes);

        let mut out = Dataset::new(first.longitude.clone(), first.latitude.clone(), time)?;
        out.statics = first.statics.clone();
        for name in first.variables.keys() {
            if !parts.iter().all(|p| p.variables.contains_key(name)) {
                log::warn!("variable '{}' is not present in every file, dropping it", name);
                continue;
            }
            let views: Vec<_> = parts.iter().map(|p| p.variables[name].view()).collect();
            let joined = ndarray::concatenate(Axis(0), &views).map_err(|e| {
                BrkupError::shape_mismatch(format!("cannot concatenate '{}': {}", name, e))
            })?;
            out.insert(name.clone(), joined)?;
        }
        Ok(out)
    }
}

/// NaN-skipping mean over the leading axis.
pub fn nanmean_axis0(data: &Array3<f64>) -> Array2<f64> {
    let (_, ny, nx) = data.dim();
    Array2::from_shape_fn((ny, nx), |(j, i)| {
        let (sum, count) = data
            .slice(s![.., j, i])
            .iter()
            .filter(|v| !v.is_nan())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
        if count == 0 { f64::NAN } else { sum / count as f64 }
    })
}

/// A field on a regular latitude/longitude grid with 1-D coordinates.
#[derive(Debug, Clone, PartialEq)]
pub struct RegularField {
    pub name: String,
    /// `(time, lat, lon)`
    pub data: Array3<f64>,
    pub latitude: Vec<f64>,
    pub longitude: Vec<f64>,
    pub time: Option<TimeAxis>,
}

impl RegularField {
    pub fn new(
        name: impl Into<String>,
        data: Array3<f64>,
        latitude: Vec<f64>,
        longitude: Vec<f64>,
        time: Option<TimeAxis>,
    ) -> Result<Self> {
        let (nt, nlat, nlon) = data.dim();
        if nlat != latitude.len() || nlon != longitude.len() {
            return Err(BrkupError::shape_mismatch(format!(
                "data (lat, lon) {:?} does not match axes ({}, {})",
                (nlat, nlon),
                latitude.len(),
                longitude.len()
            )));
        }
        check_time(nt, &time)?;
        Ok(RegularField {
            name: name.into(),
            data,
            latitude,
            longitude,
            time,
        })
    }

    /// Reverses a decreasing latitude axis (and the data along it) so that
    /// latitude increases.
    pub fn with_increasing_latitude(mut self) -> Self {
        if self.latitude.len() > 1 && self.latitude[0] > self.latitude[self.latitude.len() - 1] {
            self.latitude.reverse();
            self.data.invert_axis(Axis(1));
            self.data = self.data.as_standard_layout().to_owned();
        }
        self
    }

    pub fn select_time(&self, indices: &[usize]) -> Result<Self> {
        let time = self
            .time
            .as_ref()
            .ok_or_else(|| BrkupError::MissingVariable("time".to_string()))?;
        Ok(RegularField {
            name: self.name.clone(),
            data: self.data.select(Axis(0), indices),
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
            time: Some(time.select(indices)),
        })
    }
}
