use crate::input::*;
use ndarray::Array2;
use std::path::Path;
use tempfile::tempdir;

/// A variable to write into a NetCDF fixture.
struct FixtureVar<'a> {
    name: &'a str,
    dims: &'a [&'a str],
    values: Vec<f64>,
    attrs: Vec<(&'a str, f64)>,
    units: Option<&'a str>,
}

impl<'a> FixtureVar<'a> {
    fn new(name: &'a str, dims: &'a [&'a str], values: Vec<f64>) -> Self {
        FixtureVar {
            name,
            dims,
            values,
            attrs: Vec::new(),
            units: None,
        }
    }

    fn attr(mut self, name: &'a str, value: f64) -> Self {
        self.attrs.push((name, value));
        self
    }

    fn units(mut self, units: &'a str) -> Self {
        self.units = Some(units);
        self
    }
}

fn write_nc(path: &Path, dims: &[(&str, usize)], vars: Vec<FixtureVar>) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut file = netcdf::create(path).unwrap();
    for (name, len) in dims {
        file.add_dimension(name, *len).unwrap();
    }
    for var in vars {
        let mut v = file.add_variable::<f64>(var.name, var.dims).unwrap();
        if let Some(units) = var.units {
            v.put_attribute("units", units).unwrap();
        }
        for (name, value) in var.attrs {
            v.put_attribute(name, value).unwrap();
        }
        v.put_values(&var.values, ..).unwrap();
    }
}

/// Regular lon/lat grid over the Beaufort Sea, `(y, x)`.
fn beaufort_grid(ny: usize, nx: usize) -> (Array2<f64>, Array2<f64>) {
    let lon = Array2::from_shape_fn((ny, nx), |(_, i)| -160.0 + 3.0 * i as f64);
    let lat = Array2::from_shape_fn((ny, nx), |(j, _)| 70.0 + j as f64);
    (lon, lat)
}

fn flat(a: &Array2<f64>) -> Vec<f64> {
    a.iter().copied().collect()
}

/// NSIDC-like raster on the given grid: Beaufort (13) over rows 2..5 and
/// columns 3..7, Arctic (15) elsewhere.
fn write_raster(path: &Path, lon: &Array2<f64>, lat: &Array2<f64>) -> Array2<bool> {
    let (ny, nx) = lon.dim();
    let footprint = Array2::from_shape_fn((ny, nx), |(j, i)| (2..5).contains(&j) && (3..7).contains(&i));
    let codes = footprint.mapv(|b| if b { 13.0 } else { 15.0 });
    write_nc(
        path,
        &[("y", ny), ("x", nx)],
        vec![
            FixtureVar::new("mask", &["y", "x"], flat(&codes)),
            FixtureVar::new("lon", &["y", "x"], flat(lon)),
            FixtureVar::new("lat", &["y", "x"], flat(lat)),
        ],
    );
    footprint
}

/// Mooring file with two 12-hourly steps starting at `start_hours`.
fn write_mooring(path: &Path, lon: &Array2<f64>, lat: &Array2<f64>, start_hours: f64) {
    let (ny, nx) = lon.dim();
    let n = 2 * ny * nx;
    let dims3: &[&str] = &["time", "y", "x"];
    write_nc(
        path,
        &[("time", 2), ("y", ny), ("x", nx)],
        vec![
            FixtureVar::new("longitude", &["y", "x"], flat(lon)),
            FixtureVar::new("latitude", &["y", "x"], flat(lat)),
            FixtureVar::new("time", &["time"], vec![start_hours, start_hours + 12.0])
                .units("hours since 2013-01-01 00:00:00"),
            FixtureVar::new("sic", dims3, vec![0.9; n]),
            FixtureVar::new("sic_thin", dims3, vec![0.1; n]),
            FixtureVar::new("sit", dims3, vec![1.5; n]),
            FixtureVar::new("sit_thin", dims3, vec![0.005; n]),
            FixtureVar::new("newice", dims3, vec![2.0; n]),
            FixtureVar::new("del_vi_thin", dims3, vec![0.0; n]),
            FixtureVar::new("del_hi", dims3, vec![0.0; n]),
            FixtureVar::new("mod_area", &["y", "x"], vec![1.0; ny * nx]),
        ],
    );
}

#[cfg(test)]
mod input_tests {
    use super::*;
    use crate::leads::LeadMethod;

    #[test]
    fn test_job_config_from_json() {
        let json = r#"
        {
            "task": {
                "kind": "regrid",
                "params": {
                    "era_file": "ERA5_msl_y2013_daily.nc",
                    "mooring_file": "Moorings_2013m01.nc",
                    "dates": ["2013-01-01", "2013-01-31"],
                    "output": "msl.nc"
                }
            },
            "options": { "log_level": "debug" }
        }"#;

        let config = JobConfig::from_json(json).unwrap();
        assert_eq!(config.task.kind(), "regrid");
        assert_eq!(config.options.log_level, "debug");
        assert!(!config.options.progress);
        match config.task {
            TaskConfig::Regrid { params } => {
                let (start, end) = params.dates.unwrap();
                assert_eq!(start.to_string(), "2013-01-01");
                assert_eq!(end.to_string(), "2013-01-31");
            }
            other => panic!("unexpected task {:?}", other),
        }
    }

    #[test]
    fn test_job_config_from_yaml() {
        let yaml = r#"
task:
  kind: leads
  params:
    moorings:
      dir: /data/nextsim
      years: [2013]
      months: [1, 2, 3]
      box_name: Beaufort
      period: daily
    method: olason2021
    output: leads.nc
"#;
        let config = JobConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.options, JobOptions::default());
        match config.task {
            TaskConfig::Leads { params } => {
                assert_eq!(params.method, LeadMethod::Olason2021);
                assert_eq!(params.cutoff, None);
                assert_eq!(params.moorings.months, vec![1, 2, 3]);
                assert_eq!(params.moorings.period, Some(crate::time::Period::Daily));
            }
            other => panic!("unexpected task {:?}", other),
        }
    }

    #[test]
    fn test_mask_configs() {
        let json = r#"
        {
            "task": {
                "kind": "region_mask",
                "params": {
                    "grid_file": "grid.nc",
                    "mask": {
                        "kind": "nsidc",
                        "params": { "raster_file": "regions.nc", "region": "Arctic_shelf", "substring": true, "depth": 200.0 }
                    },
                    "creg": { "dir": "/data/creg", "box_name": "Beaufort" },
                    "output": "mask.nc"
                }
            }
        }"#;
        let config = JobConfig::from_json(json).unwrap();
        let TaskConfig::RegionMask { params } = config.task else {
            panic!("expected a region_mask task");
        };
        assert!(matches!(
            params.mask,
            MaskConfig::Nsidc { ref params } if params.substring && params.depth == Some(200.0)
        ));
        assert_eq!(
            params.creg.unwrap().bounding_box().unwrap(),
            crate::grid::BoundingBox::new(95, 225, 425, 575)
        );

        let unit: MaskConfig = serde_json::from_str(r#"{"kind": "moore2022_beaufort"}"#).unwrap();
        assert_eq!(unit, MaskConfig::Moore2022Beaufort);
    }

    #[test]
    fn test_from_file_picks_format_by_extension() {
        let dir = tempdir().unwrap();
        let yaml_path = dir.path().join("job.yml");
        std::fs::write(
            &yaml_path,
            "task:\n  kind: region_mask\n  params:\n    grid_file: g.nc\n    mask:\n      kind: large_beaufort\n    output: m.nc\n",
        )
        .unwrap();
        assert_eq!(JobConfig::from_file(&yaml_path).unwrap().task.kind(), "region_mask");

        let json_path = dir.path().join("job.json");
        std::fs::write(&json_path, "task:\n  kind: region_mask\n").unwrap();
        assert!(matches!(
            JobConfig::from_file(&json_path),
            Err(crate::BrkupError::Json(_))
        ));
    }

    #[test]
    fn test_unknown_task_kind() {
        let json = r#"{ "task": { "kind": "plot", "params": {} } }"#;
        assert!(JobConfig::from_json(json).is_err());
    }
}

#[cfg(test)]
mod reader_tests {
    use super::*;
    use crate::error::BrkupError;
    use crate::reader::*;
    use crate::time::Period;

    #[test]
    fn test_open_dataset_decodes_attributes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("moorings.nc");
        let (lon, lat) = beaufort_grid(2, 2);
        write_nc(
            &path,
            &[("time", 2), ("y", 2), ("x", 2)],
            vec![
                FixtureVar::new("longitude", &["y", "x"], flat(&lon)),
                FixtureVar::new("latitude", &["y", "x"], flat(&lat)),
                FixtureVar::new("time", &["time"], vec![0.0, 1.0]).units("days since 2013-01-01"),
                FixtureVar::new("sit", &["time", "y", "x"], vec![100.0, -999.0, 200.0, 300.0, 0.0, 50.0, -999.0, 10.0])
                    .attr("missing_value", -999.0)
                    .attr("scale_factor", 0.01)
                    .attr("add_offset", 1.0),
                FixtureVar::new("mod_area", &["y", "x"], vec![4.0, 5.0, 6.0, 7.0]),
            ],
        );

        let ds = open_dataset(&path, None).unwrap();
        assert_eq!(ds.grid_shape(), (2, 2));
        assert_eq!(ds.n_time(), 2);
        let sit = ds.var("sit").unwrap();
        assert!((sit[[0, 0, 0]] - 2.0).abs() < 1e-12);
        assert!(sit[[0, 0, 1]].is_nan());
        assert!((sit[[1, 0, 1]] - 1.5).abs() < 1e-12);
        assert_eq!(ds.static_field("mod_area").unwrap()[[1, 1]], 7.0);

        let only = open_dataset(&path, Some(&["mod_area".to_string()])).unwrap();
        assert!(only.variables.is_empty());
        assert!(matches!(
            open_dataset(&path, Some(&["sic".to_string()])),
            Err(BrkupError::MissingVariable(_))
        ));
    }

    #[test]
    fn test_load_moorings_concatenates_and_averages() {
        let dir = tempdir().unwrap();
        let (lon, lat) = beaufort_grid(3, 4);
        let jan = dir.path().join("2013/nextsim/Moorings_2013m01.nc");
        let feb = dir.path().join("2013/nextsim/Moorings_2013m02.nc");
        write_mooring(&jan, &lon, &lat, 0.0);
        write_mooring(&feb, &lon, &lat, 744.0);

        let mut selection = MooringSelection::new(dir.path());
        selection.years = vec![2013];
        selection.months = vec![1, 2, 3];
        selection.variables = Some(vec!["sic".to_string(), "newice".to_string()]);
        selection.bbox = Some(crate::grid::BoundingBox::new(1, 3, 0, 2));

        let all = load_moorings(&selection, &indicatif::ProgressBar::hidden()).unwrap();
        assert_eq!(all.n_time(), 4);
        assert_eq!(all.grid_shape(), (2, 2));
        assert_eq!(all.longitude[[0, 0]], -157.0);

        selection.period = Some(Period::Monthly);
        let monthly = load_moorings(&selection, &indicatif::ProgressBar::hidden()).unwrap();
        assert_eq!(monthly.n_time(), 2);
        let labels = monthly.time.as_ref().unwrap().datetimes();
        assert_eq!(labels[1].to_string(), "2013-02-01 00:00:00");
        assert!((monthly.var("sic").unwrap()[[1, 0, 0]] - 0.9).abs() < 1e-12);

        selection.period = None;
        selection.dates = Some((
            chrono::NaiveDate::from_ymd_opt(2013, 2, 1).unwrap(),
            chrono::NaiveDate::from_ymd_opt(2013, 2, 28).unwrap(),
        ));
        let february = load_moorings(&selection, &indicatif::ProgressBar::hidden()).unwrap();
        assert_eq!(february.n_time(), 2);
    }

    #[test]
    fn test_load_moorings_without_files() {
        let dir = tempdir().unwrap();
        let mut selection = MooringSelection::new(dir.path());
        selection.years = vec![1999];
        assert!(matches!(
            load_moorings(&selection, &indicatif::ProgressBar::hidden()),
            Err(BrkupError::InsufficientGrid { .. })
        ));
    }
}

#[cfg(test)]
mod regrid_tests {
    use super::*;
    use crate::reader::open_dataset;
    use crate::regrid::regrid_era_to_mooring;
    use chrono::NaiveDate;

    fn msl(t: usize, lat: f64, lon: f64) -> f64 {
        2.0 * lat + 0.1 * lon + 100.0 * t as f64
    }

    #[test]
    fn test_regrid_era_file_onto_mooring_grid() {
        let dir = tempdir().unwrap();
        let era = dir.path().join("ERA5_msl_y2013_daily.nc");
        let grid = dir.path().join("Moorings_2013m01.nc");

        // decreasing latitude, longitudes in [0, 360)
        let lats = [85.0, 80.0, 75.0, 70.0, 65.0];
        let lons: Vec<f64> = (0..6).map(|i| 60.0 * i as f64).collect();
        let mut values = Vec::new();
        for t in 0..3 {
            for &la in &lats {
                for &lo in &lons {
                    values.push(msl(t, la, lo));
                }
            }
        }
        write_nc(
            &era,
            &[("time", 3), ("latitude", 5), ("longitude", 6)],
            vec![
                FixtureVar::new("latitude", &["latitude"], lats.to_vec()),
                FixtureVar::new("longitude", &["longitude"], lons.clone()),
                FixtureVar::new("time", &["time"], vec![0.0, 24.0, 48.0])
                    .units("hours since 2013-01-01 00:00:00"),
                FixtureVar::new("msl", &["time", "latitude", "longitude"], values),
            ],
        );

        let (lon, lat) = beaufort_grid(2, 3);
        write_nc(
            &grid,
            &[("y", 2), ("x", 3)],
            vec![
                FixtureVar::new("longitude", &["y", "x"], flat(&lon)),
                FixtureVar::new("latitude", &["y", "x"], flat(&lat)),
            ],
        );

        let dates = (
            NaiveDate::from_ymd_opt(2013, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2013, 1, 3).unwrap(),
        );
        let field = regrid_era_to_mooring(&era, &grid, Some(dates), indicatif::ProgressBar::hidden()).unwrap();
        assert_eq!(field.name, "msl");
        assert_eq!(field.data.dim(), (2, 2, 3));
        for ((t, j, i), v) in field.data.indexed_iter() {
            let expected = msl(t + 1, lat[[j, i]], lon[[j, i]] + 360.0);
            assert!((v - expected).abs() < 1e-9, "({t}, {j}, {i}): {v} vs {expected}");
        }

        // written fields read back on the mooring grid
        let out = dir.path().join("msl_on_grid.nc");
        crate::output::write_field_netcdf(&field, &out).unwrap();
        let back = open_dataset(&out, None).unwrap();
        assert_eq!(back.var("msl").unwrap(), &field.data);
        assert_eq!(back.time.unwrap().datetimes()[0].to_string(), "2013-01-02 00:00:00");
    }
}

#[cfg(test)]
mod mask_tests {
    use super::*;
    use crate::creg::CregGrid;
    use crate::error::BrkupError;
    use crate::grid::BoundingBox;
    use crate::mask::{CategoryRaster, MaskBuilder};
    use crate::regions::NsidcRegion;

    #[test]
    fn test_nsidc_mask_on_raster_grid_equals_footprint() {
        let dir = tempdir().unwrap();
        let raster_path = dir.path().join("regions.nc");
        let (lon, lat) = beaufort_grid(7, 10);
        let footprint = write_raster(&raster_path, &lon, &lat);

        let raster = CategoryRaster::open(&raster_path).unwrap();
        assert_eq!(raster.codes[[3, 4]], 13);
        let builder = MaskBuilder::new(lon, lat).unwrap();
        let mask = builder.nsidc_mask(&raster, NsidcRegion::Beaufort).unwrap();
        assert_eq!(mask.data, footprint);
        assert_eq!(mask.label(), "Beaufort");

        assert!(matches!(
            builder.nsidc_mask(&raster, NsidcRegion::Kara),
            Err(BrkupError::EmptyRegion(9))
        ));
    }

    fn write_creg(dir: &Path) {
        // 1 x 2 x 3 x 4 byte mask: column 0 is land
        let tmask: Vec<f64> = (0..24).map(|k| if k % 4 == 0 { 0.0 } else { 1.0 }).collect();
        write_nc(
            &dir.join(crate::creg::BYTE_MASK_FILE),
            &[("t", 1), ("z", 2), ("y", 3), ("x", 4)],
            vec![FixtureVar::new("tmask", &["t", "z", "y", "x"], tmask)],
        );
        let (lon, lat) = beaufort_grid(3, 4);
        write_nc(
            &dir.join(crate::creg::MESH_HGR_FILE),
            &[("t", 1), ("y", 3), ("x", 4)],
            vec![
                FixtureVar::new("nav_lon", &["y", "x"], flat(&lon)),
                FixtureVar::new("nav_lat", &["y", "x"], flat(&lat)),
                FixtureVar::new("e1t", &["t", "y", "x"], vec![2.0; 12]),
                FixtureVar::new("e2t", &["t", "y", "x"], vec![3.0; 12]),
            ],
        );
        write_nc(
            &dir.join(crate::creg::MESH_ZGR_FILE),
            &[("t", 1), ("z", 4), ("y", 3), ("x", 4)],
            vec![
                FixtureVar::new("gdept_1d", &["t", "z"], vec![0.0, 10.0, 20.0, 30.0]),
                FixtureVar::new("mbathy", &["t", "y", "x"], (0..12).map(|k| (k % 4) as f64).collect()),
            ],
        );
    }

    #[test]
    fn test_creg_grid_fields() {
        let dir = tempdir().unwrap();
        write_creg(dir.path());

        let grid = CregGrid::new(dir.path(), None);
        let area = grid.area().unwrap();
        assert!(area[[0, 0]].is_nan());
        assert_eq!(area[[2, 3]], 6.0);
        assert_eq!(grid.depth().unwrap()[[1, 2]], 20.0);

        let boxed = CregGrid::new(dir.path(), Some(BoundingBox::new(2, 4, 1, 3)));
        assert_eq!(boxed.depth().unwrap(), ndarray::array![[20.0, 30.0], [20.0, 30.0]]);
        assert_eq!(boxed.ocean_mask().unwrap().dim(), (2, 2));
        assert_eq!(boxed.longitude().unwrap()[[0, 0]], -154.0);
    }

    #[test]
    fn test_depth_refined_mask_written_and_read() {
        let dir = tempdir().unwrap();
        write_creg(dir.path());
        let grid = CregGrid::new(dir.path(), None);
        let (lon, lat) = (grid.longitude().unwrap(), grid.latitude().unwrap());
        let ocean = grid.ocean_mask().unwrap();

        let mask = crate::mask::large_beaufort_mask(&lon, &lat, &ocean).unwrap();
        let refined = mask.refine_depth(&grid.depth().unwrap(), 15.0).unwrap();
        assert_eq!(refined.label(), "Large_Beaufort_d15");
        // lon -160 is outside the box and land anyway; depth >= 15 keeps x = 2, 3
        assert_eq!(refined.count(), 6);

        let path = dir.path().join("mask.nc");
        crate::output::write_mask_netcdf(&refined, &lon, &lat, &path).unwrap();
        let file = netcdf::open(&path).unwrap();
        let back = crate::reader::read_2d(&file, "mask").unwrap();
        assert_eq!(back, refined.as_f64());
    }
}

#[cfg(test)]
mod job_tests {
    use super::*;
    use crate::run_job;
    use polars::prelude::*;

    #[test]
    fn test_ice_growth_job() {
        let dir = tempdir().unwrap();
        let (lon, lat) = beaufort_grid(7, 10);
        write_raster(&dir.path().join("regions.nc"), &lon, &lat);
        write_mooring(&dir.path().join("moorings/2013/nextsim/Moorings_2013m01.nc"), &lon, &lat, 0.0);
        write_mooring(&dir.path().join("moorings/2013/nextsim/Moorings_2013m02.nc"), &lon, &lat, 744.0);

        let job = format!(
            r#"
task:
  kind: ice_growth
  params:
    moorings:
      dir: {root}/moorings
      years: [2013]
      months: [1, 2]
    mask:
      kind: nsidc
      params:
        raster_file: {root}/regions.nc
        region: Beaufort
    output: {root}/growth.parquet
    totals_output: {root}/totals.parquet
options:
  log_level: warn
"#,
            root = dir.path().display()
        );
        let job_path = dir.path().join("job.yaml");
        std::fs::write(&job_path, job).unwrap();
        run_job(&JobConfig::from_file(&job_path).unwrap()).unwrap();

        let table = ParquetReader::new(std::fs::File::open(dir.path().join("growth.parquet")).unwrap())
            .finish()
            .unwrap();
        assert_eq!(table.height(), 4);
        // 12 Beaufort cells of unit area, newice halved for 12-hourly output
        let newice: Vec<f64> = table.column("newice").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(newice, vec![12.0; 4]);

        let totals = ParquetReader::new(std::fs::File::open(dir.path().join("totals.parquet")).unwrap())
            .finish()
            .unwrap();
        assert_eq!(totals.height(), 1);
        let total: Vec<f64> = totals.column("newice").unwrap().f64().unwrap().into_no_null_iter().collect();
        assert_eq!(total, vec![48.0]);
    }

    #[test]
    fn test_leads_job_writes_both_fields() {
        let dir = tempdir().unwrap();
        let (lon, lat) = beaufort_grid(3, 4);
        write_mooring(&dir.path().join("2013/nextsim/Moorings_2013m01.nc"), &lon, &lat, 0.0);

        let json = format!(
            r#"{{
                "task": {{
                    "kind": "leads",
                    "params": {{
                        "moorings": {{ "dir": "{root}", "years": [2013], "months": [1] }},
                        "method": "breakup_paper",
                        "output": "{root}/leads.nc"
                    }}
                }}
            }}"#,
            root = dir.path().display()
        );
        run_job(&JobConfig::from_json(&json).unwrap()).unwrap();

        let leads = crate::reader::open_dataset(dir.path().join("leads.nc"), None).unwrap();
        let fraction = leads.var("lead_fraction").unwrap();
        assert!((fraction[[0, 0, 0]] - 0.2).abs() < 1e-12);
        assert!(leads.var("lead_mask").unwrap().iter().all(|&m| m == 1.0));
    }

    #[test]
    fn test_job_errors_carry_context() {
        let json = r#"{
            "task": {
                "kind": "regrid",
                "params": { "era_file": "/nonexistent/era.nc", "mooring_file": "/nonexistent/m.nc", "output": "/nonexistent/o.nc" }
            }
        }"#;
        let err = run_job(&JobConfig::from_json(json).unwrap()).unwrap_err();
        assert!(format!("{:#}", err).contains("Failed to regrid /nonexistent/era.nc"));
    }
}
