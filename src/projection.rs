//! North polar stereographic projection on an ellipsoid.
//!
//! The NSIDC regions raster and the neXtSIM grids are both defined on polar
//! stereographic planes over the Hughes 1980 ellipsoid; they differ only in
//! the latitude of true scale. Masking projects both the raster and the
//! target grid with the same instance.

use ndarray::Array2;
use ndarray::Zip;
use std::f64::consts::FRAC_PI_4;

/// Hughes 1980 semi-major axis (m).
pub const HUGHES_A: f64 = 6_378_273.0;
/// Hughes 1980 semi-minor axis (m).
pub const HUGHES_B: f64 = 6_356_889.449;

/// North polar stereographic projection parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct PolarStereographic {
    /// Central meridian in radians
    pub lon0: f64,
    /// Latitude of true scale in radians
    pub lat_ts: f64,
    /// Semi-major axis (m)
    pub a: f64,
    /// First eccentricity
    e: f64,
    /// a * m(lat_ts) / t(lat_ts)
    k: f64,
}

impl PolarStereographic {
    pub fn new(lon0_deg: f64, lat_ts_deg: f64, a: f64, b: f64) -> Self {
        let e = (1.0 - (b * b) / (a * a)).sqrt();
        let lat_ts = lat_ts_deg.to_radians();
        let m_ts = lat_ts.cos() / (1.0 - e * e * lat_ts.sin().powi(2)).sqrt();
        let t_ts = conformal_t(lat_ts, e);
        PolarStereographic {
            lon0: lon0_deg.to_radians(),
            lat_ts,
            a,
            e,
            k: a * m_ts / t_ts,
        }
    }

    /// The NSIDC sea ice polar stereographic north plane (true scale at 70N,
    /// central meridian 45W).
    pub fn nsidc_north() -> Self {
        Self::new(-45.0, 70.0, HUGHES_A, HUGHES_B)
    }

    /// The neXtSIM model plane (true scale at 60N, central meridian 45W).
    pub fn nextsim() -> Self {
        Self::new(-45.0, 60.0, HUGHES_A, HUGHES_B)
    }

    /// Projects geographic degrees to plane coordinates in metres.
    pub fn forward(&self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        let lat = lat_deg.to_radians();
        let dlon = lon_deg.to_radians() - self.lon0;
        let rho = self.k * conformal_t(lat, self.e);
        (rho * dlon.sin(), -rho * dlon.cos())
    }

    /// Projects a 2-D coordinate grid.
    pub fn forward_grid(&self, lon: &Array2<f64>, lat: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
        let mut x = Array2::zeros(lon.dim());
        let mut y = Array2::zeros(lon.dim());
        Zip::from(&mut x)
            .and(&mut y)
            .and(lon)
            .and(lat)
            .for_each(|x, y, &lon, &lat| {
                let (px, py) = self.forward(lon, lat);
                *x = px;
                *y = py;
            });
        (x, y)
    }
}

fn conformal_t(lat: f64, e: f64) -> f64 {
    let es = e * lat.sin();
    (FRAC_PI_4 - lat / 2.0).tan() / ((1.0 - es) / (1.0 + es)).powf(e / 2.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pole_maps_to_origin() {
        let proj = PolarStereographic::nsidc_north();
        let (x, y) = proj.forward(123.0, 90.0);
        assert!(x.abs() < 1e-6 && y.abs() < 1e-6);
    }

    #[test]
    fn test_central_meridian_points_down() {
        let proj = PolarStereographic::nsidc_north();
        let (x, y) = proj.forward(-45.0, 70.0);
        assert!(x.abs() < 1e-6);
        assert!((y + 2_187_973.8).abs() < 1.0);
    }

    #[test]
    fn test_nsidc_grid_corner() {
        // upper-left corner of the 25 km NSIDC north grid
        let proj = PolarStereographic::nsidc_north();
        let (x, y) = proj.forward(168.35, 30.98);
        assert!((x + 3_850_000.0).abs() < 1_000.0, "x = {}", x);
        assert!((y - 5_850_000.0).abs() < 1_000.0, "y = {}", y);
    }

    #[test]
    fn test_forward_grid_matches_pointwise() {
        let proj = PolarStereographic::nextsim();
        let lon = Array2::from_shape_fn((2, 3), |(j, i)| -150.0 + 10.0 * (i + j) as f64);
        let lat = Array2::from_shape_fn((2, 3), |(j, i)| 70.0 + (i + 2 * j) as f64);
        let (x, y) = proj.forward_grid(&lon, &lat);
        let (px, py) = proj.forward(lon[[1, 2]], lat[[1, 2]]);
        assert_eq!(x[[1, 2]], px);
        assert_eq!(y[[1, 2]], py);
    }
}
