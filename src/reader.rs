//! # NetCDF Input
//!
//! Reading helpers shared by every loader in the crate, plus the mooring and
//! reanalysis file loaders.
//!
//! All variables are read as `f64`. `_FillValue` and `missing_value` become
//! NaN and `scale_factor`/`add_offset` are applied when present. Variables
//! with more dimensions than requested are reduced by taking index 0 along
//! the extra leading dimensions, so a `(time, y, x)` coordinate variable reads
//! as its first `(y, x)` slice.

use crate::error::{BrkupError, Result};
use crate::grid::{BoundingBox, Dataset, RegularField};
use crate::regions::named_box;
use crate::time::{CfTimeUnits, Period, TimeAxis};
use chrono::NaiveDate;
use indicatif::ProgressBar;
use log::{debug, info, warn};
use ndarray::{Array2, Array3, ArrayD, Axis, IxDyn};
use netcdf::AttributeValue;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const COORDINATE_NAMES: [&str; 5] = ["longitude", "latitude", "time", "lon", "lat"];

fn has_attr(var: &netcdf::Variable, name: &str) -> bool {
    var.attributes().any(|attr| attr.name() == name)
}

fn attr_f64(var: &netcdf::Variable, name: &str) -> Option<f64> {
    if !has_attr(var, name) {
        return None;
    }
    let value = var.attribute_value(name)?.ok()?;
    f64::try_from(value).ok()
}

fn attr_string(var: &netcdf::Variable, name: &str) -> Option<String> {
    if !has_attr(var, name) {
        return None;
    }
    match var.attribute_value(name)?.ok()? {
        AttributeValue::Str(s) => Some(s),
        _ => None,
    }
}

pub fn variable<'f>(file: &'f netcdf::File, name: &str) -> Result<netcdf::Variable<'f>> {
    file.variable(name)
        .ok_or_else(|| BrkupError::MissingVariable(name.to_string()))
}

pub fn shape_of(var: &netcdf::Variable) -> Vec<usize> {
    var.dimensions().iter().map(|d| d.len()).collect()
}

/// Reads a whole variable, decoding fill values and packing attributes.
pub fn read_array(file: &netcdf::File, name: &str) -> Result<ArrayD<f64>> {
    let var = variable(file, name)?;
    let raw: Vec<f64> = var.get_values(..)?;
    let fill = attr_f64(&var, "_FillValue");
    let missing = attr_f64(&var, "missing_value");
    let scale = attr_f64(&var, "scale_factor").unwrap_or(1.0);
    let offset = attr_f64(&var, "add_offset").unwrap_or(0.0);

    let values: Vec<f64> = raw
        .into_iter()
        .map(|v| {
            if Some(v) == fill || Some(v) == missing {
                f64::NAN
            } else {
                v * scale + offset
            }
        })
        .collect();
    let shape = shape_of(&var);
    ArrayD::from_shape_vec(IxDyn(&shape), values)
        .map_err(|e| BrkupError::shape_mismatch(format!("variable '{}': {}", name, e)))
}

fn leading_slices(mut array: ArrayD<f64>, ndim: usize) -> ArrayD<f64> {
    while array.ndim() > ndim {
        array = array.index_axis_move(Axis(0), 0);
    }
    array
}

fn dims_error(name: &str, required: usize, found: usize) -> BrkupError {
    BrkupError::shape_mismatch(format!(
        "variable '{}' has {} dimensions, at least {} required",
        name, found, required
    ))
}

/// All values of a variable, flattened.
pub fn read_1d(file: &netcdf::File, name: &str) -> Result<Vec<f64>> {
    Ok(read_array(file, name)?.iter().copied().collect())
}

/// The first `(y, x)` slice of a variable.
pub fn read_2d(file: &netcdf::File, name: &str) -> Result<Array2<f64>> {
    let array = read_array(file, name)?;
    if array.ndim() < 2 {
        return Err(dims_error(name, 2, array.ndim()));
    }
    leading_slices(array, 2)
        .into_dimensionality()
        .map_err(|e| BrkupError::shape_mismatch(format!("variable '{}': {}", name, e)))
}

/// A `(time, y, x)` variable; 2-D variables get a time axis of length 1.
pub fn read_3d(file: &netcdf::File, name: &str) -> Result<Array3<f64>> {
    let array = read_array(file, name)?;
    let array = match array.ndim() {
        0 | 1 => return Err(dims_error(name, 2, array.ndim())),
        2 => array.insert_axis(Axis(0)),
        _ => leading_slices(array, 3),
    };
    array
        .into_dimensionality()
        .map_err(|e| BrkupError::shape_mismatch(format!("variable '{}': {}", name, e)))
}

/// The `time` variable with its CF units, if the file has one.
pub fn read_time_axis(file: &netcdf::File) -> Result<Option<TimeAxis>> {
    let Some(var) = file.variable("time") else {
        return Ok(None);
    };
    let units = attr_string(&var, "units")
        .ok_or_else(|| BrkupError::InvalidTimeUnits("time variable has no units".to_string()))?;
    let units: CfTimeUnits = units.parse()?;
    let values: Vec<f64> = var.get_values(..)?;
    Ok(Some(TimeAxis::new(units, values)))
}

fn first_existing<'f>(file: &'f netcdf::File, names: &[&'f str]) -> Result<&'f str> {
    names
        .iter()
        .find(|n| file.variable(n).is_some())
        .copied()
        .ok_or_else(|| BrkupError::MissingVariable(names.join("|")))
}

/// Opens a mooring file on an irregular grid with 2-D `longitude`/`latitude`.
///
/// With `names` given only those variables are read (any missing one is an
/// error); otherwise every variable on the grid is.
pub fn open_dataset<P: AsRef<Path>>(path: P, names: Option<&[String]>) -> Result<Dataset> {
    let path = path.as_ref();
    let file = netcdf::open(path)?;
    let longitude = read_2d(&file, "longitude")?;
    let latitude = read_2d(&file, "latitude")?;
    let time = read_time_axis(&file)?;
    let nt = time.as_ref().map(|t| t.len());
    let mut dataset = Dataset::new(longitude, latitude, time)?;
    let grid = dataset.grid_shape();

    let selected: Vec<String> = match names {
        Some(names) => names.to_vec(),
        None => file
            .variables()
            .map(|v| v.name())
            .filter(|n| !COORDINATE_NAMES.contains(&n.as_str()))
            .collect(),
    };

    for name in &selected {
        let var = variable(&file, name)?;
        let shape = shape_of(&var);
        if shape.len() < 2 || (shape[shape.len() - 2], shape[shape.len() - 1]) != grid {
            if names.is_some() {
                return Err(BrkupError::shape_mismatch(format!(
                    "variable '{}' {:?} is not on the {:?} grid",
                    name, shape, grid
                )));
            }
            debug!("skipping '{}' {:?}: not on the grid", name, shape);
            continue;
        }
        if shape.len() >= 3 && Some(shape[0]) == nt {
            dataset.insert(name.clone(), read_3d(&file, name)?)?;
        } else {
            dataset.insert_static(name.clone(), read_2d(&file, name)?)?;
        }
    }
    debug!(
        "opened {}: {} variables, {} static, {} time steps",
        path.display(),
        dataset.variables.len(),
        dataset.statics.len(),
        dataset.n_time()
    );
    Ok(dataset)
}

/// Opens a reanalysis file on a regular grid with 1-D latitude/longitude,
/// reading its first data variable. Latitude is returned increasing.
pub fn open_regular<P: AsRef<Path>>(path: P) -> Result<RegularField> {
    let path = path.as_ref();
    let file = netcdf::open(path)?;
    let lat_name = first_existing(&file, &["latitude", "lat"])?;
    let lon_name = first_existing(&file, &["longitude", "lon"])?;
    let latitude = read_1d(&file, lat_name)?;
    let longitude = read_1d(&file, lon_name)?;
    let time = read_time_axis(&file)?;

    let name = file
        .variables()
        .find(|v| !COORDINATE_NAMES.contains(&v.name().as_str()) && v.dimensions().len() >= 2)
        .map(|v| v.name())
        .ok_or_else(|| BrkupError::MissingVariable(format!("data variable in {}", path.display())))?;
    let data = read_3d(&file, &name)?;
    debug!("opened {}: '{}' {:?}", path.display(), name, data.dim());
    Ok(RegularField::new(name, data, latitude, longitude, time)?.with_increasing_latitude())
}

fn default_years() -> Vec<i32> {
    (1995..=2018).collect()
}

fn default_months() -> Vec<u32> {
    (1..=12).collect()
}

/// Which mooring files to load and how to reduce them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MooringSelection {
    /// Root directory holding `{year}/nextsim/Moorings_{year}m{MM}.nc`
    pub dir: PathBuf,
    #[serde(default = "default_years")]
    pub years: Vec<i32>,
    #[serde(default = "default_months")]
    pub months: Vec<u32>,
    /// Variables to read; all grid variables when absent.
    #[serde(default)]
    pub variables: Option<Vec<String>>,
    /// Named box; overridden by `bbox`.
    #[serde(default)]
    pub box_name: Option<String>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
    /// Inclusive date range.
    #[serde(default)]
    pub dates: Option<(NaiveDate, NaiveDate)>,
    #[serde(default)]
    pub period: Option<Period>,
}

impl MooringSelection {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        MooringSelection {
            dir: dir.as_ref().to_path_buf(),
            years: default_years(),
            months: default_months(),
            variables: None,
            box_name: None,
            bbox: None,
            dates: None,
            period: None,
        }
    }

    /// Candidate file paths, by year then month.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.years
            .iter()
            .flat_map(|year| {
                self.months.iter().map(move |month| {
                    self.dir
                        .join(year.to_string())
                        .join("nextsim")
                        .join(format!("Moorings_{}m{:02}.nc", year, month))
                })
            })
            .collect()
    }

    pub fn bounding_box(&self) -> Result<BoundingBox> {
        match self.bbox {
            Some(bbox) => Ok(bbox),
            None => named_box(self.box_name.as_deref()),
        }
    }
}

/// Loads every existing mooring file of the selection, concatenated along
/// time, then applies the box, the date range and the time mean in that order.
///
/// # Arguments
///
/// * `selection` - Files, variables, box, dates and averaging period to use
/// * `progress` - Bar ticked once per file read; pass `ProgressBar::hidden()`
///   for silent loading
///
/// # Returns
///
/// One [`Dataset`] on the boxed grid with the concatenated time axis.
///
/// # Errors
///
/// Returns `InsufficientGrid` when none of the candidate files exists,
/// `UnknownBox` for an unknown box name, and any read or shape error of the
/// individual files. Missing files are skipped with a warning.
pub fn load_moorings(selection: &MooringSelection, progress: &ProgressBar) -> Result<Dataset> {
    let bbox = selection.bounding_box()?;
    let paths: Vec<PathBuf> = selection
        .paths()
        .into_iter()
        .filter(|p| {
            let exists = p.exists();
            if !exists {
                warn!("mooring file {} not found, skipping", p.display());
            }
            exists
        })
        .collect();
    if paths.is_empty() {
        return Err(BrkupError::insufficient("mooring files", 0, 1));
    }

    progress.set_length(paths.len() as u64);
    let mut parts = Vec::with_capacity(paths.len());
    for path in &paths {
        progress.set_message(format!("{}", path.display()));
        let part = open_dataset(path, selection.variables.as_deref())?;
        parts.push(part.subset(&bbox)?);
        progress.inc(1);
    }
    progress.finish_and_clear();

    let mut dataset = Dataset::concat_time(parts)?;
    if let Some((start, end)) = selection.dates {
        let time = dataset
            .time
            .as_ref()
            .ok_or_else(|| BrkupError::MissingVariable("time".to_string()))?;
        let indices = time.indices_between(start, end);
        dataset = dataset.select_time(&indices)?;
    }
    if let Some(period) = selection.period {
        dataset = dataset.time_mean(period)?;
    }
    info!(
        "loaded {} mooring files: grid {:?}, {} time steps",
        paths.len(),
        dataset.grid_shape(),
        dataset.n_time()
    );
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mooring_paths() {
        let mut selection = MooringSelection::new("/data/moorings");
        selection.years = vec![2005, 2006];
        selection.months = vec![1, 11];
        let paths = selection.paths();
        assert_eq!(paths.len(), 4);
        assert_eq!(
            paths[1],
            PathBuf::from("/data/moorings/2005/nextsim/Moorings_2005m11.nc")
        );
        assert_eq!(
            paths[2],
            PathBuf::from("/data/moorings/2006/nextsim/Moorings_2006m01.nc")
        );
    }

    #[test]
    fn test_default_selection() {
        let selection: MooringSelection = serde_json::from_str(r#"{"dir": "/m"}"#).unwrap();
        assert_eq!(selection.years.len(), 24);
        assert_eq!(selection.months, (1..=12).collect::<Vec<u32>>());
        assert_eq!(
            selection.bounding_box().unwrap(),
            BoundingBox::new(0, 528, 0, 603)
        );
    }

    #[test]
    fn test_explicit_bbox_overrides_name() {
        let mut selection = MooringSelection::new("/m");
        selection.box_name = Some("Beaufort".to_string());
        assert_eq!(
            selection.bounding_box().unwrap(),
            BoundingBox::new(95, 225, 425, 575)
        );
        selection.bbox = Some(BoundingBox::new(1, 2, 3, 4));
        assert_eq!(selection.bounding_box().unwrap(), BoundingBox::new(1, 2, 3, 4));
    }
}
