//! # Region Masks
//!
//! Boolean masks over a dataset's irregular grid.
//!
//! NSIDC region masks are built by projecting both the NSIDC category raster
//! and the target grid onto one polar stereographic plane, contouring the
//! raster's indicator for the region code at 0.5, keeping the largest contour
//! and testing every target point against it. Masks may then be refined by
//! bathymetry.

use crate::contour::{extract_contours, largest};
use crate::error::{BrkupError, Result};
use crate::projection::PolarStereographic;
use crate::reader;
use crate::regions::NsidcRegion;
use log::{debug, info};
use ndarray::{Array2, ArrayView2, Zip};
use std::path::Path;

/// The NSIDC Arctic regions raster: integer codes with 2-D lon/lat.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRaster {
    pub codes: Array2<i32>,
    pub longitude: Array2<f64>,
    pub latitude: Array2<f64>,
}

impl CategoryRaster {
    pub fn new(codes: Array2<i32>, longitude: Array2<f64>, latitude: Array2<f64>) -> Result<Self> {
        if codes.dim() != longitude.dim() || codes.dim() != latitude.dim() {
            return Err(BrkupError::shape_mismatch(format!(
                "category raster {:?} with coordinates {:?}/{:?}",
                codes.dim(),
                longitude.dim(),
                latitude.dim()
            )));
        }
        Ok(CategoryRaster {
            codes,
            longitude,
            latitude,
        })
    }

    /// Reads the raster from variables `mask`, `lon` and `lat`.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = netcdf::open(path.as_ref())?;
        let codes = reader::read_2d(&file, "mask")?.mapv(|v| if v.is_nan() { 0 } else { v.round() as i32 });
        let longitude = reader::read_2d(&file, "lon")?;
        let latitude = reader::read_2d(&file, "lat")?;
        debug!("category raster {:?} from {}", codes.dim(), path.as_ref().display());
        Self::new(codes, longitude, latitude)
    }

    /// 1.0 where the raster holds `code`, 0.0 elsewhere.
    pub fn indicator(&self, code: i32) -> Array2<f64> {
        indicator(self.codes.view(), code)
    }
}

/// A boolean mask over a `(y, x)` grid. Refinement returns a new mask.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionMask {
    pub name: String,
    /// Depth threshold (m) applied by [`RegionMask::refine_depth`], if any.
    pub depth: Option<f64>,
    pub data: Array2<bool>,
}

impl RegionMask {
    pub fn new(name: impl Into<String>, data: Array2<bool>) -> Self {
        RegionMask {
            name: name.into(),
            depth: None,
            data,
        }
    }

    /// `"<name>"`, or `"<name>_d<depth>"` for a depth-refined mask.
    pub fn label(&self) -> String {
        match self.depth {
            Some(depth) => format!("{}_d{}", self.name, depth),
            None => self.name.clone(),
        }
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn as_f64(&self) -> Array2<f64> {
        self.data.mapv(|v| if v { 1.0 } else { 0.0 })
    }

    /// Clears every cell whose bathymetry is shallower than `depth`. NaN
    /// bathymetry (land) is cleared too.
    pub fn refine_depth(&self, bathymetry: &Array2<f64>, depth: f64) -> Result<RegionMask> {
        if bathymetry.dim() != self.data.dim() {
            let (my, mx) = self.data.dim();
            let (by, bx) = bathymetry.dim();
            return Err(BrkupError::DimensionMismatch {
                expected: vec![my, mx],
                found: vec![by, bx],
            });
        }
        let mut data = self.data.clone();
        Zip::from(&mut data).and(bathymetry).for_each(|m, &b| {
            if !(b >= depth) {
                *m = false;
            }
        });
        Ok(RegionMask {
            name: self.name.clone(),
            depth: Some(self.depth.map_or(depth, |d| d.max(depth))),
            data,
        })
    }
}

fn indicator(codes: ArrayView2<i32>, code: i32) -> Array2<f64> {
    codes.mapv(|c| if c == code { 1.0 } else { 0.0 })
}

/// Mask of the target points lying inside the largest contour of the
/// raster's `code` indicator, all coordinates already projected.
pub fn mask_from_projected(
    codes: ArrayView2<i32>,
    raster_x: ArrayView2<f64>,
    raster_y: ArrayView2<f64>,
    target_x: ArrayView2<f64>,
    target_y: ArrayView2<f64>,
    code: i32,
) -> Result<Array2<bool>> {
    if target_x.dim() != target_y.dim() {
        return Err(BrkupError::shape_mismatch(format!(
            "target x {:?} and y {:?} differ",
            target_x.dim(),
            target_y.dim()
        )));
    }
    if !codes.iter().any(|&c| c == code) {
        return Err(BrkupError::EmptyRegion(code));
    }
    let field = indicator(codes, code);
    let contours = extract_contours(field.view(), raster_x, raster_y, 0.5)?;
    let outline = largest(&contours).ok_or(BrkupError::EmptyRegion(code))?;
    debug!(
        "region {}: {} contours, largest has {} vertices",
        code,
        contours.len(),
        outline.len()
    );

    let mut mask = Array2::from_elem(target_x.dim(), false);
    Zip::from(&mut mask)
        .and(&target_x)
        .and(&target_y)
        .for_each(|m, &x, &y| *m = outline.contains(x, y));
    Ok(mask)
}

/// Builds masks for one target grid.
#[derive(Debug, Clone)]
pub struct MaskBuilder {
    longitude: Array2<f64>,
    latitude: Array2<f64>,
    projection: PolarStereographic,
}

impl MaskBuilder {
    pub fn new(longitude: Array2<f64>, latitude: Array2<f64>) -> Result<Self> {
        if longitude.dim() != latitude.dim() {
            return Err(BrkupError::shape_mismatch(format!(
                "longitude {:?} and latitude {:?} differ",
                longitude.dim(),
                latitude.dim()
            )));
        }
        Ok(MaskBuilder {
            longitude,
            latitude,
            projection: PolarStereographic::nsidc_north(),
        })
    }

    pub fn with_projection(mut self, projection: PolarStereographic) -> Self {
        self.projection = projection;
        self
    }

    pub fn grid_shape(&self) -> (usize, usize) {
        self.longitude.dim()
    }

    /// Mask of an NSIDC region on the target grid.
    pub fn nsidc_mask(&self, raster: &CategoryRaster, region: NsidcRegion) -> Result<RegionMask> {
        let (rx, ry) = self.projection.forward_grid(&raster.longitude, &raster.latitude);
        let (tx, ty) = self.projection.forward_grid(&self.longitude, &self.latitude);
        let data = mask_from_projected(
            raster.codes.view(),
            rx.view(),
            ry.view(),
            tx.view(),
            ty.view(),
            region.code(),
        )?;
        let mask = RegionMask::new(region.name(), data);
        info!("mask '{}' covers {} cells", mask.label(), mask.count());
        Ok(mask)
    }

    /// Looks up the region by exact name and builds its mask, optionally
    /// refined to cells at least `depth` deep.
    ///
    /// # Arguments
    ///
    /// * `raster` - NSIDC category raster
    /// * `name` - Region name as in the NSIDC table, e.g. `"Beaufort"`
    /// * `refinement` - Bathymetry on the target grid and minimum depth (m)
    ///
    /// # Errors
    ///
    /// `UnknownRegion` for a name missing from the table, `EmptyRegion` when
    /// the raster has no cell of the region, `DimensionMismatch` when the
    /// bathymetry is not on the target grid.
    pub fn region_mask(
        &self,
        raster: &CategoryRaster,
        name: &str,
        refinement: Option<(&Array2<f64>, f64)>,
    ) -> Result<RegionMask> {
        let region: NsidcRegion = name.parse()?;
        let mask = self.nsidc_mask(raster, region)?;
        match refinement {
            Some((bathymetry, depth)) => mask.refine_depth(bathymetry, depth),
            None => Ok(mask),
        }
    }
}

fn lat_lon_box_mask(
    name: &str,
    longitude: &Array2<f64>,
    latitude: &Array2<f64>,
    ocean: &Array2<bool>,
    inside: impl Fn(f64, f64) -> bool,
) -> Result<RegionMask> {
    if longitude.dim() != ocean.dim() || latitude.dim() != ocean.dim() {
        let (oy, ox) = ocean.dim();
        let (ly, lx) = longitude.dim();
        return Err(BrkupError::DimensionMismatch {
            expected: vec![oy, ox],
            found: vec![ly, lx],
        });
    }
    let mut data = Array2::from_elem(ocean.dim(), false);
    Zip::from(&mut data)
        .and(longitude)
        .and(latitude)
        .and(ocean)
        .for_each(|m, &lon, &lat, &wet| *m = wet && inside(lon, lat));
    Ok(RegionMask::new(name, data))
}

/// The large Beaufort box: lat < 81, -155 < lon <= -125, ocean only.
pub fn large_beaufort_mask(
    longitude: &Array2<f64>,
    latitude: &Array2<f64>,
    ocean: &Array2<bool>,
) -> Result<RegionMask> {
    lat_lon_box_mask("Large_Beaufort", longitude, latitude, ocean, |lon, lat| {
        lat < 81.0 && lon > -155.0 && lon <= -125.0
    })
}

/// The Beaufort box of Moore et al. (2022): 69 < lat < 78, -160 < lon < -120,
/// ocean only.
pub fn moore2022_beaufort_mask(
    longitude: &Array2<f64>,
    latitude: &Array2<f64>,
    ocean: &Array2<bool>,
) -> Result<RegionMask> {
    lat_lon_box_mask("Moore2022_Beaufort", longitude, latitude, ocean, |lon, lat| {
        lat > 69.0 && lat < 78.0 && lon > -160.0 && lon < -120.0
    })
}
