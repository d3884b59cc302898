//! # Time Axes
//!
//! CF-convention time coordinates (`"<unit> since <epoch>"`) and the time
//! reductions used on mooring data: date-range selection, daily means and
//! monthly means per year.

use crate::error::{BrkupError, Result};
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unit of a CF time coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeStep {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl TimeStep {
    /// Length of one unit in milliseconds.
    pub fn millis(&self) -> f64 {
        match self {
            TimeStep::Seconds => 1e3,
            TimeStep::Minutes => 6e4,
            TimeStep::Hours => 3.6e6,
            TimeStep::Days => 8.64e7,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TimeStep::Seconds => "seconds",
            TimeStep::Minutes => "minutes",
            TimeStep::Hours => "hours",
            TimeStep::Days => "days",
        }
    }
}

/// Parsed CF time units, e.g. `days since 1900-01-01 00:00:00`.
#[derive(Debug, Clone, PartialEq)]
pub struct CfTimeUnits {
    pub step: TimeStep,
    pub epoch: NaiveDateTime,
}

const EPOCH_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
];

impl FromStr for CfTimeUnits {
    type Err = BrkupError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || BrkupError::InvalidTimeUnits(s.to_string());
        let (unit, epoch) = s.split_once(" since ").ok_or_else(invalid)?;

        let step = match unit.trim().to_lowercase().as_str() {
            "seconds" | "second" | "secs" | "s" => TimeStep::Seconds,
            "minutes" | "minute" | "mins" => TimeStep::Minutes,
            "hours" | "hour" | "hrs" | "h" => TimeStep::Hours,
            "days" | "day" | "d" => TimeStep::Days,
            _ => return Err(invalid()),
        };

        let epoch = epoch
            .trim()
            .trim_end_matches("UTC")
            .trim_end_matches('Z')
            .trim();
        let parsed = EPOCH_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(epoch, fmt).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(epoch, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
            .ok_or_else(invalid)?;

        Ok(CfTimeUnits {
            step,
            epoch: parsed,
        })
    }
}

impl fmt::Display for CfTimeUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} since {}",
            self.step.as_str(),
            self.epoch.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

impl CfTimeUnits {
    pub fn decode(&self, value: f64) -> NaiveDateTime {
        let millis = (value * self.step.millis()).round() as i64;
        self.epoch + Duration::milliseconds(millis)
    }

    pub fn encode(&self, datetime: NaiveDateTime) -> f64 {
        let millis = (datetime - self.epoch).num_milliseconds() as f64;
        millis / self.step.millis()
    }
}

/// A numeric time coordinate together with its units.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeAxis {
    pub units: CfTimeUnits,
    pub values: Vec<f64>,
}

impl TimeAxis {
    pub fn new(units: CfTimeUnits, values: Vec<f64>) -> Self {
        TimeAxis { units, values }
    }

    /// Builds an axis from date-times, encoded with the given units.
    pub fn from_datetimes(units: CfTimeUnits, datetimes: &[NaiveDateTime]) -> Self {
        let values = datetimes.iter().map(|dt| units.encode(*dt)).collect();
        TimeAxis { units, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn datetimes(&self) -> Vec<NaiveDateTime> {
        self.values.iter().map(|v| self.units.decode(*v)).collect()
    }

    pub fn select(&self, indices: &[usize]) -> TimeAxis {
        TimeAxis {
            units: self.units.clone(),
            values: indices.iter().map(|&i| self.values[i]).collect(),
        }
    }

    /// Indices whose calendar date lies in `[start, end]`, both inclusive.
    pub fn indices_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<usize> {
        self.datetimes()
            .iter()
            .enumerate()
            .filter(|(_, dt)| dt.date() >= start && dt.date() <= end)
            .map(|(i, _)| i)
            .collect()
    }

    /// Spacing between the first two samples, in hours.
    pub fn step_hours(&self) -> Result<f64> {
        if self.values.len() < 2 {
            return Err(BrkupError::insufficient("time", self.values.len(), 2));
        }
        let dts = self.datetimes();
        Ok((dts[1] - dts[0]).num_seconds() as f64 / 3600.0)
    }

    /// Concatenates axes that may use different units, re-encoding with the
    /// units of the first one.
    pub fn concat(axes: &[&TimeAxis]) -> Option<TimeAxis> {
        let units = axes.first()?.units.clone();
        let values = axes
            .iter()
            .flat_map(|axis| axis.datetimes())
            .map(|dt| units.encode(dt))
            .collect();
        Some(TimeAxis { units, values })
    }
}

/// Grouping key for time averaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    /// Calendar days, time stamps floored to midnight.
    Daily,
    /// Calendar months of each year.
    Monthly,
}

impl Period {
    /// Label of the group a time stamp belongs to.
    pub fn floor(&self, dt: NaiveDateTime) -> NaiveDateTime {
        let date = match self {
            Period::Daily => dt.date(),
            Period::Monthly => dt.date().with_day(1).unwrap_or(dt.date()),
        };
        date.and_time(NaiveTime::MIN)
    }

    /// Groups time indices by period, in chronological order of the labels.
    pub fn groups(&self, axis: &TimeAxis) -> Vec<(NaiveDateTime, Vec<usize>)> {
        let mut groups: std::collections::BTreeMap<NaiveDateTime, Vec<usize>> =
            std::collections::BTreeMap::new();
        for (i, dt) in axis.datetimes().into_iter().enumerate() {
            groups.entry(self.floor(dt)).or_default().push(i);
        }
        groups.into_iter().collect()
    }
}
