//! # Ice Growth
//!
//! Sea-ice volume growth from neXtSIM mooring output. Growth variables are
//! stored per output interval; [`IceGrowth::fix_growth_rate`] rescales them,
//! [`IceGrowth::volume_growth`] integrates them over a region into a polars
//! table (one row per time step) and [`total_growth`] sums that table per
//! calendar year.

use crate::error::{BrkupError, Result};
use crate::grid::Dataset;
use chrono::Datelike;
use log::{debug, info};
use ndarray::{Array2, Axis, Zip};
use polars::prelude::*;

/// Growth variables as stored in the mooring files.
pub const RAW_GROWTH_VARIABLES: [&str; 3] = ["newice", "del_vi_thin", "del_hi"];

/// Growth variables after `del_hi` has been converted to a volume.
pub const VOLUME_GROWTH_VARIABLES: [&str; 3] = ["newice", "del_vi_thin", "del_vi"];

/// Ice growth computations over one mooring dataset.
#[derive(Debug, Clone)]
pub struct IceGrowth {
    pub dataset: Dataset,
    rates_fixed: bool,
}

impl IceGrowth {
    pub fn new(dataset: Dataset) -> Self {
        IceGrowth {
            dataset,
            rates_fixed: false,
        }
    }

    /// Rescales the growth variables by the output interval in days and adds
    /// `del_vi = del_hi * (sic - sic_thin)`. Calling it again is a no-op.
    pub fn fix_growth_rate(&mut self) -> Result<()> {
        if self.rates_fixed {
            return Ok(());
        }
        let time = self
            .dataset
            .time
            .as_ref()
            .ok_or_else(|| BrkupError::MissingVariable("time".to_string()))?;
        let output_freq = 24.0 / time.step_hours()?;
        info!("output frequency {} per day", output_freq);

        for name in RAW_GROWTH_VARIABLES {
            self.dataset.var_mut(name)?.mapv_inplace(|v| v / output_freq);
        }
        let del_vi = {
            let sic = self.dataset.var("sic")?;
            let sic_thin = self.dataset.var("sic_thin")?;
            Zip::from(self.dataset.var("del_hi")?)
                .and(sic)
                .and(sic_thin)
                .map_collect(|&dh, &c, &ct| dh * (c - ct))
        };
        self.dataset.insert("del_vi", del_vi)?;
        self.rates_fixed = true;
        Ok(())
    }

    fn variables(&self) -> [&'static str; 3] {
        if self.rates_fixed {
            VOLUME_GROWTH_VARIABLES
        } else {
            RAW_GROWTH_VARIABLES
        }
    }

    /// Region-integrated volume growth per time step.
    ///
    /// Sums `mod_area * var` over cells inside `mask` where the first `sic`
    /// time step is finite, skipping NaN. Columns: `time` (string), `year`,
    /// then one column per growth variable.
    pub fn volume_growth(&self, mask: &Array2<bool>) -> Result<DataFrame> {
        let grid = self.dataset.grid_shape();
        if mask.dim() != grid {
            return Err(BrkupError::DimensionMismatch {
                expected: vec![grid.0, grid.1],
                found: vec![mask.dim().0, mask.dim().1],
            });
        }
        let area = self.dataset.static_field("mod_area")?;
        let sic0 = self.dataset.var("sic")?.index_axis(Axis(0), 0).to_owned();
        let mut weights = Array2::<f64>::zeros(grid);
        Zip::from(&mut weights)
            .and(mask)
            .and(&sic0)
            .and(&area)
            .for_each(|w, &inside, &c, &a| {
                *w = if inside && c.is_finite() { a } else { f64::NAN };
            });

        let time = self
            .dataset
            .time
            .as_ref()
            .ok_or_else(|| BrkupError::MissingVariable("time".to_string()))?;
        let datetimes = time.datetimes();
        let labels: Vec<String> = datetimes
            .iter()
            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
            .collect();
        let years: Vec<i32> = datetimes.iter().map(|dt| dt.year()).collect();

        let mut columns: Vec<Column> = vec![
            Series::new("time".into(), labels).into(),
            Series::new("year".into(), years).into(),
        ];
        for name in self.variables() {
            let data = self.dataset.var(name)?;
            let sums: Vec<f64> = data
                .axis_iter(Axis(0))
                .map(|slice| {
                    Zip::from(&slice)
                        .and(&weights)
                        .fold(0.0, |acc, &v, &w| {
                            let dv = w * v;
                            if dv.is_nan() { acc } else { acc + dv }
                        })
                })
                .collect();
            columns.push(Series::new(name.into(), sums).into());
        }
        let df = DataFrame::new(columns)?;
        debug!("volume growth table {:?}", df.shape());
        Ok(df)
    }
}

/// Total growth per calendar year: the final value of each year's
/// cumulative sum, sorted by year.
pub fn total_growth(df: &DataFrame) -> Result<DataFrame> {
    let aggs: Vec<Expr> = df
        .get_column_names()
        .iter()
        .map(|s| s.as_str())
        .filter(|name| *name != "time" && *name != "year")
        .map(|name| col(name).sum())
        .collect();
    let totals = df
        .clone()
        .lazy()
        .group_by([col("year")])
        .agg(aggs)
        .sort(["year"], SortMultipleOptions::default())
        .collect()?;
    Ok(totals)
}
