//! # brkup-utils
//!
//! Analysis utilities for neXtSIM "Moorings" NetCDF output and the gridded
//! products it is compared against: ERA5 reanalysis, the CREG025 ocean grid
//! and the NSIDC Arctic regions raster.
//!
//! ## Features
//!
//! - **Regridding**: bilinear interpolation of regular lat/lon fields onto the
//!   model's irregular grid, one time slice per rayon task
//! - **Region masks**: NSIDC regions via polar stereographic projection and
//!   contour containment, depth refinement from CREG bathymetry, lat/lon boxes
//! - **Mooring analysis**: multi-file loading, box subsetting, daily/monthly
//!   means, lead detection, ice volume growth, deformation rates, pressure
//!   gradients and transects
//! - **Jobs**: JSON/YAML job files executed by [`run_job`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use brkup_utils::{run_job, input::JobConfig};
//!
//! let config = JobConfig::from_file("beaufort_growth.yaml").expect("Failed to load config");
//! run_job(&config).expect("Job failed");
//! ```
//!
//! ## Configuration Example
//!
//! ```yaml
//! task:
//!   kind: ice_growth
//!   params:
//!     moorings:
//!       dir: /data/nextsim
//!       years: [2013]
//!       box_name: Beaufort
//!     mask:
//!       kind: nsidc
//!       params:
//!         raster_file: /data/NSIDC_Regions_Masks.nc
//!         region: Beaufort
//!     output: beaufort_growth.parquet
//!     totals_output: beaufort_growth_yearly.parquet
//! options:
//!   log_level: debug
//!   progress: true
//! ```

pub mod contour;
pub mod creg;
pub mod deformation;
pub mod era5;
pub mod error;
pub mod grid;
pub mod growth;
pub mod input;
pub mod leads;
pub mod log;
pub mod mask;
pub mod output;
pub mod projection;
pub mod reader;
pub mod regions;
pub mod regrid;
pub mod time;
pub mod transect;

#[cfg(test)]
mod tests;

pub use crate::error::{BrkupError, Result};

use crate::creg::CregGrid;
use crate::grid::GriddedField;
use crate::growth::{IceGrowth, total_growth};
use crate::input::{
    CregParams, IceGrowthParams, JobConfig, LeadsParams, MaskConfig, RegionMaskParams,
    RegridParams, TaskConfig,
};
use crate::leads::detect_leads;
use crate::log::{describe_dataset, init_logging, job_echo, progress_bar};
use crate::mask::{
    CategoryRaster, MaskBuilder, RegionMask, large_beaufort_mask, moore2022_beaufort_mask,
};
use crate::output::{write_dataframe_to_parquet, write_field_netcdf, write_fields_netcdf, write_mask_netcdf};
use crate::reader::load_moorings;
use crate::regions::NsidcRegion;
use crate::regrid::regrid_era_to_mooring;
use anyhow::{Context, anyhow};
use ndarray::Array2;

/// Runs one job: initialises logging from the job options, then executes the
/// task and writes its outputs.
///
/// # Errors
///
/// Any failure to read inputs, compute the result or write outputs aborts
/// the job; nothing is retried and no partial output is promised.
pub fn run_job(config: &JobConfig) -> anyhow::Result<()> {
    init_logging(&config.options.log_level);
    job_echo(config);
    let progress = config.options.progress;
    match &config.task {
        TaskConfig::Regrid { params } => run_regrid(params, progress),
        TaskConfig::RegionMask { params } => run_region_mask(params),
        TaskConfig::Leads { params } => run_leads(params, progress),
        TaskConfig::IceGrowth { params } => run_ice_growth(params, progress),
    }
}

fn run_regrid(params: &RegridParams, progress: bool) -> anyhow::Result<()> {
    let bar = progress_bar(0, progress, "regridding");
    let field = regrid_era_to_mooring(&params.era_file, &params.mooring_file, params.dates, bar)
        .with_context(|| format!("Failed to regrid {}", params.era_file.display()))?;
    write_field_netcdf(&field, &params.output)
        .with_context(|| format!("Failed to write {}", params.output.display()))?;
    Ok(())
}

fn creg_grid(creg: Option<&CregParams>, purpose: &str) -> anyhow::Result<CregGrid> {
    let creg = creg.ok_or_else(|| anyhow!("{} needs the CREG grid files (`creg`)", purpose))?;
    Ok(CregGrid::new(&creg.dir, Some(creg.bounding_box()?)))
}

/// Builds the configured mask on the grid given by `longitude`/`latitude`.
pub fn build_mask(
    mask: &MaskConfig,
    creg: Option<&CregParams>,
    longitude: &Array2<f64>,
    latitude: &Array2<f64>,
) -> anyhow::Result<RegionMask> {
    match mask {
        MaskConfig::Nsidc { params } => {
            let raster = CategoryRaster::open(&params.raster_file).with_context(|| {
                format!("Failed to read NSIDC raster {}", params.raster_file.display())
            })?;
            let region = if params.substring {
                NsidcRegion::find_in(&params.region)?
            } else {
                params.region.parse::<NsidcRegion>()?
            };
            let builder = MaskBuilder::new(longitude.clone(), latitude.clone())?;
            let mask = builder.nsidc_mask(&raster, region)?;
            match params.depth {
                Some(depth) => {
                    let bathymetry = creg_grid(creg, "depth refinement")?
                        .depth()
                        .context("Failed to read CREG bathymetry")?;
                    Ok(mask.refine_depth(&bathymetry, depth)?)
                }
                None => Ok(mask),
            }
        }
        MaskConfig::LargeBeaufort => {
            let ocean = creg_grid(creg, "the large Beaufort mask")?.ocean_mask()?;
            Ok(large_beaufort_mask(longitude, latitude, &ocean)?)
        }
        MaskConfig::Moore2022Beaufort => {
            let ocean = creg_grid(creg, "the Moore 2022 Beaufort mask")?.ocean_mask()?;
            Ok(moore2022_beaufort_mask(longitude, latitude, &ocean)?)
        }
    }
}

fn run_region_mask(params: &RegionMaskParams) -> anyhow::Result<()> {
    let file = netcdf::open(&params.grid_file)
        .with_context(|| format!("Failed to open {}", params.grid_file.display()))?;
    let longitude = reader::read_2d(&file, "longitude")?;
    let latitude = reader::read_2d(&file, "latitude")?;
    let mask = build_mask(&params.mask, params.creg.as_ref(), &longitude, &latitude)?;
    write_mask_netcdf(&mask, &longitude, &latitude, &params.output)
        .with_context(|| format!("Failed to write {}", params.output.display()))?;
    Ok(())
}

fn run_leads(params: &LeadsParams, progress: bool) -> anyhow::Result<()> {
    let bar = progress_bar(0, progress, "loading moorings");
    let dataset = load_moorings(&params.moorings, &bar).context("Failed to load moorings")?;
    describe_dataset(&dataset);
    let leads = detect_leads(&dataset, params.method, params.cutoff)?;

    let fraction = GriddedField::new(
        "lead_fraction",
        leads.fraction,
        dataset.longitude.clone(),
        dataset.latitude.clone(),
        dataset.time.clone(),
    )?;
    let mask = GriddedField::new(
        "lead_mask",
        leads.mask,
        dataset.longitude.clone(),
        dataset.latitude.clone(),
        dataset.time.clone(),
    )?;
    write_fields_netcdf(&[&fraction, &mask], &params.output)
        .with_context(|| format!("Failed to write {}", params.output.display()))?;
    Ok(())
}

fn run_ice_growth(params: &IceGrowthParams, progress: bool) -> anyhow::Result<()> {
    let bar = progress_bar(0, progress, "loading moorings");
    let dataset = load_moorings(&params.moorings, &bar).context("Failed to load moorings")?;
    describe_dataset(&dataset);
    let mask = build_mask(
        &params.mask,
        params.creg.as_ref(),
        &dataset.longitude,
        &dataset.latitude,
    )?;

    let mut growth = IceGrowth::new(dataset);
    growth.fix_growth_rate()?;
    let table = growth.volume_growth(&mask.data)?;
    write_dataframe_to_parquet(&table, &params.output)
        .with_context(|| format!("Failed to write {}", params.output.display()))?;

    if let Some(path) = &params.totals_output {
        let totals = total_growth(&table)?;
        ::log::info!("Yearly totals for '{}':\n{}", mask.label(), totals);
        write_dataframe_to_parquet(&totals, path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(())
}
