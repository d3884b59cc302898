//! # Contour Extraction
//!
//! Marching squares over a 2-D field with curvilinear coordinates, producing
//! closed polygons at a single level. Containment is tested with `geo`.
//!
//! The field is padded with a ring of below-level values (coordinates
//! extrapolated linearly) so every contour closes, including regions that
//! touch the raster border. Saddle cells keep their two above-level corners
//! apart.

use crate::error::{BrkupError, Result};
use geo::{Contains, LineString, Point, Polygon};
use ndarray::{Array2, ArrayView2};
use std::collections::{HashMap, HashSet};

/// A crossing point, identified by the grid edge it lies on (padded indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum EdgeKey {
    /// Edge between `(r, c)` and `(r, c + 1)`
    H(usize, usize),
    /// Edge between `(r, c)` and `(r + 1, c)`
    V(usize, usize),
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Top,
    Right,
    Bottom,
    Left,
}

impl Side {
    fn key(self, r: usize, c: usize) -> EdgeKey {
        match self {
            Side::Top => EdgeKey::H(r, c),
            Side::Bottom => EdgeKey::H(r + 1, c),
            Side::Left => EdgeKey::V(r, c),
            Side::Right => EdgeKey::V(r, c + 1),
        }
    }
}

/// Segments per cell case. Bits: top-left 8, top-right 4, bottom-right 2,
/// bottom-left 1.
fn cell_segments(case: u8) -> &'static [(Side, Side)] {
    use Side::*;
    match case {
        1 => &[(Left, Bottom)],
        2 => &[(Bottom, Right)],
        3 => &[(Left, Right)],
        4 => &[(Top, Right)],
        5 => &[(Left, Bottom), (Top, Right)],
        6 => &[(Top, Bottom)],
        7 => &[(Left, Top)],
        8 => &[(Left, Top)],
        9 => &[(Top, Bottom)],
        10 => &[(Left, Top), (Bottom, Right)],
        11 => &[(Top, Right)],
        12 => &[(Left, Right)],
        13 => &[(Bottom, Right)],
        14 => &[(Left, Bottom)],
        _ => &[],
    }
}

/// A closed polygon in plane coordinates. The closing edge from the last
/// vertex back to the first is implicit.
#[derive(Debug, Clone, PartialEq)]
pub struct Contour {
    pub vertices: Vec<(f64, f64)>,
    polygon: Polygon<f64>,
}

impl Contour {
    pub fn new(vertices: Vec<(f64, f64)>) -> Self {
        let polygon = Polygon::new(LineString::from(vertices.clone()), vec![]);
        Contour { vertices, polygon }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// True when `(x, y)` lies strictly inside the polygon.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.vertices.len() >= 3 && self.polygon.contains(&Point::new(x, y))
    }
}

/// Value of a coordinate array at a padded index, extrapolating linearly one
/// cell beyond each border.
fn padded_coord(a: &ArrayView2<f64>, r: usize, c: usize) -> f64 {
    let (ny, nx) = a.dim();
    let row = |r: usize, c: usize| -> f64 {
        // c is an unpadded column here
        if r == 0 {
            2.0 * a[[0, c]] - a[[1, c]]
        } else if r == ny + 1 {
            2.0 * a[[ny - 1, c]] - a[[ny - 2, c]]
        } else {
            a[[r - 1, c]]
        }
    };
    if c == 0 {
        2.0 * row(r, 0) - row(r, 1)
    } else if c == nx + 1 {
        2.0 * row(r, nx - 1) - row(r, nx - 2)
    } else {
        row(r, c - 1)
    }
}

/// Extracts all closed contours of `values` at `level`.
///
/// `x` and `y` give the plane position of every node and must have the shape
/// of `values`. Contours are returned in the order their first crossing is
/// met scanning cells row by row.
pub fn extract_contours(
    values: ArrayView2<f64>,
    x: ArrayView2<f64>,
    y: ArrayView2<f64>,
    level: f64,
) -> Result<Vec<Contour>> {
    let (ny, nx) = values.dim();
    if x.dim() != values.dim() || y.dim() != values.dim() {
        return Err(BrkupError::shape_mismatch(format!(
            "contour coordinates {:?}/{:?} do not match values {:?}",
            x.dim(),
            y.dim(),
            values.dim()
        )));
    }
    if ny < 2 {
        return Err(BrkupError::insufficient("y", ny, 2));
    }
    if nx < 2 {
        return Err(BrkupError::insufficient("x", nx, 2));
    }

    let min = values.iter().cloned().filter(|v| !v.is_nan()).fold(f64::INFINITY, f64::min);
    let fill = if min < level { min } else { level - 1.0 };
    let padded = Array2::from_shape_fn((ny + 2, nx + 2), |(r, c)| {
        if r == 0 || c == 0 || r == ny + 1 || c == nx + 1 {
            fill
        } else {
            let v = values[[r - 1, c - 1]];
            if v.is_nan() { fill } else { v }
        }
    });
    let above = |r: usize, c: usize| padded[[r, c]] > level;

    let mut adjacency: HashMap<EdgeKey, Vec<EdgeKey>> = HashMap::new();
    let mut order: Vec<EdgeKey> = Vec::new();
    for r in 0..ny + 1 {
        for c in 0..nx + 1 {
            let case = (above(r, c) as u8) << 3
                | (above(r, c + 1) as u8) << 2
                | (above(r + 1, c + 1) as u8) << 1
                | above(r + 1, c) as u8;
            for &(a, b) in cell_segments(case) {
                let (ka, kb) = (a.key(r, c), b.key(r, c));
                for (from, to) in [(ka, kb), (kb, ka)] {
                    let entry = adjacency.entry(from).or_insert_with(|| {
                        order.push(from);
                        Vec::with_capacity(2)
                    });
                    entry.push(to);
                }
            }
        }
    }

    let position = |key: EdgeKey| -> (f64, f64) {
        let ((r0, c0), (r1, c1)) = match key {
            EdgeKey::H(r, c) => ((r, c), (r, c + 1)),
            EdgeKey::V(r, c) => ((r, c), (r + 1, c)),
        };
        let (v0, v1) = (padded[[r0, c0]], padded[[r1, c1]]);
        let t = if v1 == v0 { 0.5 } else { (level - v0) / (v1 - v0) };
        let lerp = |a: &ArrayView2<f64>| {
            let p0 = padded_coord(a, r0, c0);
            let p1 = padded_coord(a, r1, c1);
            p0 + t * (p1 - p0)
        };
        (lerp(&x), lerp(&y))
    };

    let mut visited: HashSet<EdgeKey> = HashSet::new();
    let mut contours = Vec::new();
    for &start in &order {
        if visited.contains(&start) {
            continue;
        }
        let mut vertices = Vec::new();
        let mut prev: Option<EdgeKey> = None;
        let mut current = start;
        loop {
            visited.insert(current);
            vertices.push(position(current));
            let next = adjacency[&current]
                .iter()
                .copied()
                .find(|k| Some(*k) != prev);
            match next {
                Some(k) if k != start && !visited.contains(&k) => {
                    prev = Some(current);
                    current = k;
                }
                _ => break,
            }
        }
        contours.push(Contour::new(vertices));
    }
    log::debug!("extracted {} contours at level {}", contours.len(), level);
    Ok(contours)
}

/// The contour with the most vertices; the first one wins ties.
pub fn largest(contours: &[Contour]) -> Option<&Contour> {
    contours.iter().fold(None, |best: Option<&Contour>, c| match best {
        Some(b) if b.len() >= c.len() => Some(b),
        _ => Some(c),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn index_coords(ny: usize, nx: usize) -> (Array2<f64>, Array2<f64>) {
        let x = Array2::from_shape_fn((ny, nx), |(_, i)| i as f64);
        let y = Array2::from_shape_fn((ny, nx), |(j, _)| j as f64);
        (x, y)
    }

    #[test]
    fn test_square_contains() {
        let square = Contour::new(vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)]);
        assert!(square.contains(1.0, 1.0));
        assert!(!square.contains(3.0, 1.0));
        assert!(!square.contains(-0.5, 1.0));
        // the ring is closed by geo
        assert_eq!(square.polygon().exterior().0.len(), 5);

        let notch = Contour::new(vec![(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (2.0, 1.0), (0.0, 4.0)]);
        assert!(notch.contains(1.0, 1.0));
        assert!(!notch.contains(2.0, 3.0));
        assert!(!Contour::new(vec![(0.0, 0.0), (1.0, 1.0)]).contains(0.5, 0.5));
    }

    #[test]
    fn test_single_blob_gives_one_loop() {
        let mut v = Array2::<f64>::zeros((5, 5));
        for j in 1..4 {
            for i in 1..4 {
                v[[j, i]] = 1.0;
            }
        }
        let (x, y) = index_coords(5, 5);
        let contours = extract_contours(v.view(), x.view(), y.view(), 0.5).unwrap();
        assert_eq!(contours.len(), 1);
        let c = &contours[0];
        assert!(c.contains(2.0, 2.0));
        assert!(c.contains(1.0, 3.0));
        assert!(!c.contains(0.0, 2.0));
        assert!(!c.contains(4.0, 4.0));
        // crossings lie half-way between nodes
        assert!(c.vertices.iter().all(|(px, py)| {
            (px.fract() - 0.5).abs() < 1e-12 || (py.fract() - 0.5).abs() < 1e-12
        }));
    }

    #[test]
    fn test_region_touching_border_is_closed() {
        let mut v = Array2::<f64>::zeros((4, 4));
        v[[0, 0]] = 1.0;
        v[[0, 1]] = 1.0;
        v[[1, 0]] = 1.0;
        let (x, y) = index_coords(4, 4);
        let contours = extract_contours(v.view(), x.view(), y.view(), 0.5).unwrap();
        assert_eq!(contours.len(), 1);
        assert!(contours[0].contains(0.0, 0.0));
        assert!(contours[0].contains(1.0, 0.0));
        assert!(!contours[0].contains(1.0, 1.0));
    }

    #[test]
    fn test_two_blobs_and_largest() {
        let mut v = Array2::<f64>::zeros((6, 8));
        v[[1, 1]] = 1.0;
        for j in 2..5 {
            for i in 4..7 {
                v[[j, i]] = 1.0;
            }
        }
        let (x, y) = index_coords(6, 8);
        let contours = extract_contours(v.view(), x.view(), y.view(), 0.5).unwrap();
        assert_eq!(contours.len(), 2);
        let big = largest(&contours).unwrap();
        assert!(big.contains(5.0, 3.0));
        assert!(!big.contains(1.0, 1.0));
    }

    #[test]
    fn test_largest_tie_keeps_first() {
        let a = Contour::new(vec![(0.0, 0.0); 4]);
        let b = Contour::new(vec![(1.0, 1.0); 4]);
        let list = vec![a.clone(), b];
        assert_eq!(largest(&list), Some(&a));
        assert_eq!(largest(&[]), None);
    }

    #[test]
    fn test_too_small_grid() {
        let v = Array2::<f64>::zeros((1, 4));
        let (x, y) = index_coords(1, 4);
        assert!(matches!(
            extract_contours(v.view(), x.view(), y.view(), 0.5),
            Err(BrkupError::InsufficientGrid { .. })
        ));
    }
}
