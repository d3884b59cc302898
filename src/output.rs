//! # Output Module
//!
//! Writes results to disk:
//!
//! - **Gridded fields** to NetCDF with dimensions `time`, `y`, `x` and 2-D
//!   `longitude`/`latitude` variables
//! - **Region masks** to NetCDF as 0/1 integers
//! - **Tables** (ice growth) to Parquet through polars
//!

use crate::error::Result;
use crate::grid::GriddedField;
use crate::mask::RegionMask;
use log::debug;
use ndarray::Array2;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

fn standard_values(array: &Array2<f64>) -> Vec<f64> {
    array.iter().copied().collect()
}

fn put_coordinates(file: &mut netcdf::FileMut, longitude: &Array2<f64>, latitude: &Array2<f64>) -> Result<()> {
    let (ny, nx) = longitude.dim();
    file.add_dimension("y", ny)?;
    file.add_dimension("x", nx)?;

    {
        let mut lon = file.add_variable::<f64>("longitude", &["y", "x"])?;
        lon.put_attribute("units", "degrees_east")?;
        lon.put_attribute("standard_name", "longitude")?;
        lon.put_values(&standard_values(longitude), ..)?;
    }
    {
        let mut lat = file.add_variable::<f64>("latitude", &["y", "x"])?;
        lat.put_attribute("units", "degrees_north")?;
        lat.put_attribute("standard_name", "latitude")?;
        lat.put_values(&standard_values(latitude), ..)?;
    }
    Ok(())
}

/// Writes a field as `name(time, y, x)`. Fields without a time coordinate
/// get a bare `time` dimension.
pub fn write_field_netcdf<P: AsRef<Path>>(field: &GriddedField, path: P) -> Result<()> {
    write_fields_netcdf(&[field], path)
}

/// Writes several fields sharing one grid and time axis into one file.
/// The grid and time axis are taken from the first field.
pub fn write_fields_netcdf<P: AsRef<Path>>(fields: &[&GriddedField], path: P) -> Result<()> {
    let path = path.as_ref();
    let Some(first) = fields.first() else {
        return Ok(());
    };
    debug!("Writing {} fields to NetCDF file: {}", fields.len(), path.display());
    let mut file = netcdf::create(path)?;
    put_coordinates(&mut file, &first.longitude, &first.latitude)?;
    file.add_dimension("time", first.n_time())?;

    if let Some(axis) = &first.time {
        let mut time = file.add_variable::<f64>("time", &["time"])?;
        time.put_attribute("units", axis.units.to_string())?;
        time.put_attribute("calendar", "standard")?;
        time.put_values(&axis.values, ..)?;
    }

    for field in fields {
        let mut var = file.add_variable::<f64>(&field.name, &["time", "y", "x"])?;
        var.put_attribute("coordinates", "longitude latitude")?;
        let values: Vec<f64> = field.data.iter().copied().collect();
        var.put_values(&values, ..)?;
        debug!("  {} {:?}", field.name, field.data.dim());
    }
    Ok(())
}

/// Writes a mask as `mask(y, x)` of 0/1 integers, labelled with its name.
pub fn write_mask_netcdf<P: AsRef<Path>>(
    mask: &RegionMask,
    longitude: &Array2<f64>,
    latitude: &Array2<f64>,
    path: P,
) -> Result<()> {
    let path = path.as_ref();
    debug!("Writing mask '{}' to NetCDF file: {}", mask.label(), path.display());
    let mut file = netcdf::create(path)?;
    put_coordinates(&mut file, longitude, latitude)?;
    let mut var = file.add_variable::<i32>("mask", &["y", "x"])?;
    var.put_attribute("long_name", mask.label())?;
    if let Some(depth) = mask.depth {
        var.put_attribute("min_depth", depth)?;
    }
    let values: Vec<i32> = mask.data.iter().map(|&m| m as i32).collect();
    var.put_values(&values, ..)?;
    Ok(())
}

/// Writes a DataFrame to a Parquet file.
pub fn write_dataframe_to_parquet<P: AsRef<Path>>(df: &DataFrame, output_path: P) -> Result<()> {
    let output_path = output_path.as_ref();
    debug!("Writing DataFrame to parquet file: {}", output_path.display());
    debug!("DataFrame shape: {:?}", df.shape());
    debug!("DataFrame schema:\n{:?}", df.schema());

    let file = File::create(output_path)?;
    let mut df = df.clone();
    ParquetWriter::new(file).finish(&mut df)?;
    debug!("Successfully wrote parquet file: {}", output_path.display());
    Ok(())
}
