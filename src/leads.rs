//! Lead detection from mooring sea-ice fields.
//!
//! Every method returns a lead fraction and a 0/1 lead mask per cell and time
//! step. Land cells, where `sit` is NaN, are NaN in the mask.

use crate::error::Result;
use crate::grid::Dataset;
use log::debug;
use ndarray::{Array3, Zip};
use serde::{Deserialize, Serialize};

/// Lead detection criteria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadMethod {
    /// Open water plus thin-ice concentration above the cut-off.
    BreakupPaper,
    /// Open water plus thin ice no thicker than 10 cm (Ólason et al. 2021).
    Olason2021,
    /// Thin-ice thickness up to 20 cm (Willmes & Heinemann 2019).
    Willmes2019,
    /// Any thin ice thinner than 10 cm (Martin et al. 2004).
    Martin2004,
    /// Open-water fraction alone.
    OpenWater,
    /// Cells with frazil ice formation.
    FrazilFormation,
}

impl LeadMethod {
    /// Cut-off used when none is given: 0.1 for [`LeadMethod::OpenWater`],
    /// 0.05 otherwise.
    pub fn default_cutoff(&self) -> f64 {
        match self {
            LeadMethod::OpenWater => 0.1,
            _ => 0.05,
        }
    }

    fn required_variables(&self) -> &'static [&'static str] {
        match self {
            LeadMethod::BreakupPaper => &["sic", "sic_thin", "sit"],
            LeadMethod::Olason2021 => &["sic", "sic_thin", "sit_thin", "sit"],
            LeadMethod::Willmes2019 | LeadMethod::Martin2004 => &["sic_thin", "sit_thin", "sit"],
            LeadMethod::OpenWater => &["sic", "sit"],
            LeadMethod::FrazilFormation => &["newice", "sit"],
        }
    }
}

/// Lead fraction and lead mask, both `(time, y, x)`.
#[derive(Debug, Clone, PartialEq)]
pub struct Leads {
    pub method: LeadMethod,
    pub cutoff: f64,
    pub fraction: Array3<f64>,
    pub mask: Array3<f64>,
}

fn indicator(flag: bool) -> f64 {
    if flag { 1.0 } else { 0.0 }
}

/// Slab thickness of the thin-ice category.
fn slab_thickness(sit_thin: f64, sic_thin: f64) -> f64 {
    sit_thin / sic_thin
}

/// Applies `method` to `dataset`; `cutoff` defaults to the method's own.
pub fn detect_leads(dataset: &Dataset, method: LeadMethod, cutoff: Option<f64>) -> Result<Leads> {
    for name in method.required_variables() {
        dataset.var(name)?;
    }
    let clim = cutoff.unwrap_or_else(|| method.default_cutoff());

    let (fraction, mut mask) = match method {
        LeadMethod::BreakupPaper => {
            let frac = Zip::from(dataset.var("sic")?)
                .and(dataset.var("sic_thin")?)
                .map_collect(|&sic, &thin| (1.0 - sic) + thin);
            let mask = frac.mapv(|f| indicator(f > clim));
            (frac, mask)
        }
        LeadMethod::Olason2021 => {
            let frac = Zip::from(dataset.var("sic")?)
                .and(dataset.var("sic_thin")?)
                .and(dataset.var("sit_thin")?)
                .map_collect(|&sic, &sic_thin, &sit_thin| {
                    let h = if sic_thin > 0.0 {
                        slab_thickness(sit_thin, sic_thin)
                    } else {
                        0.0
                    };
                    let thin = if h <= 0.1 { sic_thin } else { 0.0 };
                    (1.0 - sic) + thin
                });
            let mask = frac.mapv(|f| indicator(f > clim));
            (frac, mask)
        }
        LeadMethod::Willmes2019 | LeadMethod::Martin2004 => {
            let strict = method == LeadMethod::Martin2004;
            let frac = Zip::from(dataset.var("sic_thin")?)
                .and(dataset.var("sit_thin")?)
                .map_collect(|&sic_thin, &sit_thin| {
                    let h = slab_thickness(sit_thin, sic_thin);
                    let thin = if strict { h < 0.1 } else { h <= 0.2 };
                    if thin { h } else { 0.0 }
                });
            let mask = if strict {
                frac.mapv(|f| indicator(f > 0.0))
            } else {
                frac.mapv(|f| indicator(f > clim))
            };
            (frac, mask)
        }
        LeadMethod::OpenWater => {
            let frac = dataset.var("sic")?.mapv(|sic| 1.0 - sic);
            let mask = frac.mapv(|f| indicator(f >= clim));
            (frac, mask)
        }
        LeadMethod::FrazilFormation => {
            let frac = dataset.var("newice")?.clone();
            let mask = frac.mapv(|f| indicator(f > 0.0));
            (frac, mask)
        }
    };

    Zip::from(&mut mask)
        .and(dataset.var("sit")?)
        .for_each(|m, &sit| {
            if sit.is_nan() {
                *m = f64::NAN;
            }
        });
    debug!(
        "{:?} leads (cut-off {}): {} lead cells",
        method,
        clim,
        mask.iter().filter(|&&m| m == 1.0).count()
    );
    Ok(Leads {
        method,
        cutoff: clim,
        fraction,
        mask,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrkupError;
    use ndarray::{Array2, Array3};

    fn dataset(sic: [f64; 3], sic_thin: [f64; 3], sit_thin: [f64; 3], sit: [f64; 3]) -> Dataset {
        let lon = Array2::from_shape_vec((1, 3), vec![-150.0, -149.0, -148.0]).unwrap();
        let lat = Array2::from_elem((1, 3), 75.0);
        let mut ds = Dataset::new(lon, lat, None).unwrap();
        let field = |v: [f64; 3]| Array3::from_shape_vec((1, 1, 3), v.to_vec()).unwrap();
        ds.insert("sic", field(sic)).unwrap();
        ds.insert("sic_thin", field(sic_thin)).unwrap();
        ds.insert("sit_thin", field(sit_thin)).unwrap();
        ds.insert("sit", field(sit)).unwrap();
        ds.insert("newice", field([0.0, 0.01, 0.0])).unwrap();
        ds
    }

    #[test]
    fn test_breakup_paper() {
        let ds = dataset([0.99, 0.9, 1.0], [0.0, 0.02, 0.0], [0.0, 0.001, 0.0], [2.0, 1.5, f64::NAN]);
        let leads = detect_leads(&ds, LeadMethod::BreakupPaper, None).unwrap();
        assert!((leads.fraction[[0, 0, 1]] - 0.12).abs() < 1e-12);
        assert_eq!(leads.mask[[0, 0, 0]], 0.0);
        assert_eq!(leads.mask[[0, 0, 1]], 1.0);
        assert!(leads.mask[[0, 0, 2]].is_nan());
    }

    #[test]
    fn test_olason_excludes_thick_thin_ice() {
        // cell 0: h = 0.05, kept; cell 1: h = 0.5, dropped; cell 2: no thin ice
        let ds = dataset([0.97, 0.97, 1.0], [0.1, 0.1, 0.0], [0.005, 0.05, 0.0], [1.0, 1.0, 1.0]);
        let leads = detect_leads(&ds, LeadMethod::Olason2021, None).unwrap();
        assert!((leads.fraction[[0, 0, 0]] - 0.13).abs() < 1e-12);
        assert!((leads.fraction[[0, 0, 1]] - 0.03).abs() < 1e-12);
        assert_eq!(leads.fraction[[0, 0, 2]], 0.0);
        assert_eq!(leads.mask.as_slice().unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_thickness_thresholds() {
        let ds = dataset([1.0; 3], [0.5, 0.5, 0.0], [0.04, 0.075, 0.0], [1.0; 3]);
        let willmes = detect_leads(&ds, LeadMethod::Willmes2019, None).unwrap();
        assert!((willmes.fraction[[0, 0, 0]] - 0.08).abs() < 1e-12);
        assert!((willmes.fraction[[0, 0, 1]] - 0.15).abs() < 1e-12);
        // 0/0 thickness is not thin ice
        assert_eq!(willmes.fraction[[0, 0, 2]], 0.0);

        let martin = detect_leads(&ds, LeadMethod::Martin2004, None).unwrap();
        assert_eq!(martin.mask.as_slice().unwrap(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_open_water_default_cutoff() {
        let ds = dataset([0.85, 0.95, 0.5], [0.0; 3], [0.0; 3], [1.0; 3]);
        let leads = detect_leads(&ds, LeadMethod::OpenWater, None).unwrap();
        assert_eq!(leads.cutoff, 0.1);
        assert_eq!(leads.mask.as_slice().unwrap(), &[1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_frazil_and_missing_variable() {
        let ds = dataset([1.0; 3], [0.0; 3], [0.0; 3], [1.0; 3]);
        let leads = detect_leads(&ds, LeadMethod::FrazilFormation, None).unwrap();
        assert_eq!(leads.mask.as_slice().unwrap(), &[0.0, 1.0, 0.0]);

        let mut partial = ds.clone();
        partial.variables.remove("sic");
        assert!(matches!(
            detect_leads(&partial, LeadMethod::OpenWater, None),
            Err(BrkupError::MissingVariable(_))
        ));
    }

    #[test]
    fn test_method_names() {
        let method: LeadMethod = serde_json::from_str("\"open_water\"").unwrap();
        assert_eq!(method, LeadMethod::OpenWater);
        let method: LeadMethod = serde_json::from_str("\"olason2021\"").unwrap();
        assert_eq!(method, LeadMethod::Olason2021);
    }
}
