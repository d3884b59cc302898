//! # Job Configuration Module
//!
//! This module provides parsing for brkup-utils job files. A job file names one
//! analysis task, its inputs and outputs, and a few run options. Files may be
//! JSON or YAML; the format is chosen by extension.
//!
//! ## Configuration Structure
//!
//! - **task**: the analysis to run, tagged by `kind`, with its `params`
//! - **options**: `log_level` and `progress` (both optional)
//!
//! ## Task Types
//!
//! - **regrid**: regrid a reanalysis file onto a mooring grid, write NetCDF
//! - **region_mask**: build a region mask on a mooring grid, write NetCDF
//! - **leads**: detect leads in mooring output, write NetCDF
//! - **ice_growth**: integrate ice volume growth over a region, write Parquet
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use brkup_utils::input::JobConfig;
//!
//! // Load from file
//! let config = JobConfig::from_file("growth.yaml")?;
//!
//! // Load from JSON string
//! let json = r#"
//! {
//!   "task": {
//!     "kind": "regrid",
//!     "params": {
//!       "era_file": "ERA5_msl_y2013_daily.nc",
//!       "mooring_file": "Moorings_2013m01.nc",
//!       "output": "msl_on_moorings.nc"
//!     }
//!   }
//! }"#;
//! let config = JobConfig::from_json(json)?;
//! # Ok::<(), brkup_utils::BrkupError>(())
//! ```

use crate::error::Result;
use crate::grid::BoundingBox;
use crate::leads::LeadMethod;
use crate::reader::MooringSelection;
use crate::regions::named_box;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure for brkup-utils jobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    /// The task to run
    pub task: TaskConfig,
    /// Run options
    #[serde(default)]
    pub options: JobOptions,
}

/// Options that do not change results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobOptions {
    /// `log` level filter: error, warn, info, debug or trace
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Show progress bars
    #[serde(default)]
    pub progress: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for JobOptions {
    fn default() -> Self {
        JobOptions {
            log_level: default_log_level(),
            progress: false,
        }
    }
}

/// Enumeration of all supported tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum TaskConfig {
    /// Regrid a reanalysis variable onto a mooring grid
    #[serde(rename = "regrid")]
    Regrid { params: RegridParams },
    /// Build a region mask on a mooring grid
    #[serde(rename = "region_mask")]
    RegionMask { params: RegionMaskParams },
    /// Lead fraction and lead mask from mooring output
    #[serde(rename = "leads")]
    Leads { params: LeadsParams },
    /// Region-integrated ice volume growth
    #[serde(rename = "ice_growth")]
    IceGrowth { params: IceGrowthParams },
}

impl TaskConfig {
    /// Returns the string identifier for this task type.
    ///
    /// ```rust
    /// use brkup_utils::input::{TaskConfig, RegridParams};
    ///
    /// let task = TaskConfig::Regrid {
    ///     params: RegridParams {
    ///         era_file: "era.nc".into(),
    ///         mooring_file: "moorings.nc".into(),
    ///         dates: None,
    ///         output: "out.nc".into(),
    ///     },
    /// };
    /// assert_eq!(task.kind(), "regrid");
    /// ```
    pub fn kind(&self) -> &'static str {
        match self {
            TaskConfig::Regrid { .. } => "regrid",
            TaskConfig::RegionMask { .. } => "region_mask",
            TaskConfig::Leads { .. } => "leads",
            TaskConfig::IceGrowth { .. } => "ice_growth",
        }
    }
}

/// Parameters for regridding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegridParams {
    /// Reanalysis file on a regular lat/lon grid
    pub era_file: PathBuf,
    /// Mooring file providing the target grid
    pub mooring_file: PathBuf,
    /// Inclusive date range to keep
    #[serde(default)]
    pub dates: Option<(NaiveDate, NaiveDate)>,
    /// Output NetCDF path
    pub output: PathBuf,
}

/// Location of the CREG025 grid files and the box matching the mooring grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CregParams {
    pub dir: PathBuf,
    #[serde(default)]
    pub box_name: Option<String>,
    #[serde(default)]
    pub bbox: Option<BoundingBox>,
}

impl CregParams {
    pub fn bounding_box(&self) -> Result<BoundingBox> {
        match self.bbox {
            Some(bbox) => Ok(bbox),
            None => named_box(self.box_name.as_deref()),
        }
    }
}

/// How a region mask is defined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MaskConfig {
    /// NSIDC Arctic region, optionally restricted by depth
    #[serde(rename = "nsidc")]
    Nsidc { params: NsidcMaskParams },
    /// Latitude/longitude box over the wider Beaufort Sea
    #[serde(rename = "large_beaufort")]
    LargeBeaufort,
    /// Beaufort box of Moore et al. (2022)
    #[serde(rename = "moore2022_beaufort")]
    Moore2022Beaufort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NsidcMaskParams {
    /// NSIDC regions raster (`mask`, `lon`, `lat`)
    pub raster_file: PathBuf,
    /// Region name, e.g. `Beaufort`
    pub region: String,
    /// Find the region name inside `region` instead of matching it exactly
    #[serde(default)]
    pub substring: bool,
    /// Keep only cells at least this deep (m); needs CREG files
    #[serde(default)]
    pub depth: Option<f64>,
}

/// Parameters for mask building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionMaskParams {
    /// File with 2-D `longitude`/`latitude` of the target grid
    pub grid_file: PathBuf,
    pub mask: MaskConfig,
    #[serde(default)]
    pub creg: Option<CregParams>,
    /// Output NetCDF path
    pub output: PathBuf,
}

/// Parameters for lead detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadsParams {
    pub moorings: MooringSelection,
    pub method: LeadMethod,
    /// Cut-off; the method's default when absent
    #[serde(default)]
    pub cutoff: Option<f64>,
    /// Output NetCDF path
    pub output: PathBuf,
}

/// Parameters for ice growth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IceGrowthParams {
    pub moorings: MooringSelection,
    pub mask: MaskConfig,
    #[serde(default)]
    pub creg: Option<CregParams>,
    /// Per-time-step growth table (Parquet)
    pub output: PathBuf,
    /// Per-year totals (Parquet)
    #[serde(default)]
    pub totals_output: Option<PathBuf>,
}

impl JobConfig {
    /// Loads a job configuration from a JSON or YAML file. Files ending in
    /// `.yaml` or `.yml` are read as YAML, everything else as JSON.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Loads a job configuration from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        let config: JobConfig = serde_json::from_str(json_str)?;
        Ok(config)
    }

    /// Loads a job configuration from a YAML string.
    pub fn from_yaml(yaml_str: &str) -> Result<Self> {
        let config: JobConfig = serde_yaml::from_str(yaml_str)?;
        Ok(config)
    }
}
