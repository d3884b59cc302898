//! CREG025 ocean grid: cell areas, land/sea mask and bathymetry.

use crate::error::{BrkupError, Result};
use crate::grid::BoundingBox;
use crate::reader;
use log::debug;
use ndarray::{Array2, Zip};
use std::path::{Path, PathBuf};

pub const BYTE_MASK_FILE: &str = "CREG025.L75_byte_mask.nc";
pub const MESH_HGR_FILE: &str = "CREG025.L75_mesh_hgr.nc";
pub const MESH_ZGR_FILE: &str = "CREG025.L75_mesh_zgr.nc";

/// Maps every cell's bathymetry level index to its depth.
///
/// # Arguments
///
/// * `levels` - Depth (m) of each model level, increasing with the index
/// * `mbathy` - Index into `levels` of the last wet level of every cell
///
/// # Returns
///
/// `depth[i, j] = levels[mbathy[i, j]]`, with the shape of `mbathy`.
///
/// # Errors
///
/// Fails with `IndexOutOfRange` on the first index below zero or past the end
/// of `levels`, reporting the cell it was found in.
pub fn bathymetry_from_levels(levels: &[f64], mbathy: &Array2<i64>) -> Result<Array2<f64>> {
    let mut depth = Array2::zeros(mbathy.dim());
    for ((row, col), &index) in mbathy.indexed_iter() {
        if index < 0 || index as usize >= levels.len() {
            return Err(BrkupError::IndexOutOfRange {
                index,
                row,
                col,
                levels: levels.len(),
            });
        }
        depth[[row, col]] = levels[index as usize];
    }
    Ok(depth)
}

/// The CREG025 grid files in one directory, optionally reduced to a box.
#[derive(Debug, Clone)]
pub struct CregGrid {
    dir: PathBuf,
    bbox: Option<BoundingBox>,
}

impl CregGrid {
    pub fn new<P: AsRef<Path>>(dir: P, bbox: Option<BoundingBox>) -> Self {
        CregGrid {
            dir: dir.as_ref().to_path_buf(),
            bbox,
        }
    }

    fn read(&self, file: &str, var: &str) -> Result<Array2<f64>> {
        let path = self.dir.join(file);
        let nc = netcdf::open(&path)?;
        let field = reader::read_2d(&nc, var)?;
        debug!("{} from {}: {:?}", var, path.display(), field.dim());
        match &self.bbox {
            Some(bbox) => bbox.apply2(&field),
            None => Ok(field),
        }
    }

    pub fn longitude(&self) -> Result<Array2<f64>> {
        self.read(MESH_HGR_FILE, "nav_lon")
    }

    pub fn latitude(&self) -> Result<Array2<f64>> {
        self.read(MESH_HGR_FILE, "nav_lat")
    }

    /// Surface land/sea mask: true over ocean.
    pub fn ocean_mask(&self) -> Result<Array2<bool>> {
        Ok(self.read(BYTE_MASK_FILE, "tmask")?.mapv(|v| v != 0.0 && !v.is_nan()))
    }

    /// Cell area `e1t * e2t` (m²), NaN over land.
    pub fn area(&self) -> Result<Array2<f64>> {
        let e1t = self.read(MESH_HGR_FILE, "e1t")?;
        let e2t = self.read(MESH_HGR_FILE, "e2t")?;
        let ocean = self.ocean_mask()?;
        let mut area = &e1t * &e2t;
        Zip::from(&mut area).and(&ocean).for_each(|a, &wet| {
            if !wet {
                *a = f64::NAN;
            }
        });
        Ok(area)
    }

    /// Depth (m) of the last wet level of every cell.
    pub fn depth(&self) -> Result<Array2<f64>> {
        let path = self.dir.join(MESH_ZGR_FILE);
        let nc = netcdf::open(&path)?;
        let levels = reader::read_1d(&nc, "gdept_1d")?;
        let mbathy = self.read(MESH_ZGR_FILE, "mbathy")?.mapv(|v| v.round() as i64);
        bathymetry_from_levels(&levels, &mbathy)
    }
}
