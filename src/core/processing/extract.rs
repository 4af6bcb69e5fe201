//! Zonal extraction: per-zone masked arrays and per-zone statistics from a tile array, its
//! cloud mask and the zone geometries in the tile's CRS.
//!
//! A pixel belongs to a zone when its centre lies inside the zone (even-odd rule over all
//! rings, so holes and multi-part zones both work). With border exclusion a pixel also has
//! to be clear of the zone outline: any boundary segment running through the cell's interior
//! drops it. A member pixel is masked when the cloud mask is set or its value is NaN.
use std::ops::Range;

use ndarray::{Array2, s};
use rayon::prelude::*;

use crate::core::processing::stats::compute_statistic;
use crate::types::{Affine, Statistic};

/// One vector zone: id attribute and polygon rings in map coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct Zone {
    pub id: String,
    pub rings: Vec<Vec<(f64, f64)>>,
}

fn ring_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

impl Zone {
    pub fn new(id: impl Into<String>, rings: Vec<Vec<(f64, f64)>>) -> Self {
        Self {
            id: id.into(),
            rings,
        }
    }

    /// (min_x, min_y, max_x, max_y), `None` for an empty geometry
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        let mut points = self.rings.iter().flatten();
        let &(x0, y0) = points.next()?;
        Some(points.fold((x0, y0, x0, y0), |(ax, ay, bx, by), &(x, y)| {
            (ax.min(x), ay.min(y), bx.max(x), by.max(y))
        }))
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.rings
            .iter()
            .fold(false, |inside, ring| inside ^ ring_contains(ring, x, y))
    }
}

/// Pixel window of a grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelWindow {
    pub row: usize,
    pub col: usize,
    pub rows: usize,
    pub cols: usize,
}

/// Grid window covering a zone's bounding box, clipped to `shape`; `None` when the zone
/// lies outside the grid
pub fn zone_window(zone: &Zone, affine: &Affine, shape: (usize, usize)) -> Option<PixelWindow> {
    let (min_x, min_y, max_x, max_y) = zone.bounds()?;
    let corners = [
        affine.to_pixel(min_x, min_y)?,
        affine.to_pixel(min_x, max_y)?,
        affine.to_pixel(max_x, min_y)?,
        affine.to_pixel(max_x, max_y)?,
    ];
    let (mut r0, mut c0, mut r1, mut c1) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for (r, c) in corners {
        r0 = r0.min(r);
        c0 = c0.min(c);
        r1 = r1.max(r);
        c1 = c1.max(c);
    }
    let (rows, cols) = (shape.0 as f64, shape.1 as f64);
    let r0 = r0.floor().max(0.0);
    let c0 = c0.floor().max(0.0);
    let r1 = r1.ceil().min(rows);
    let c1 = c1.ceil().min(cols);
    if r1 <= r0 || c1 <= c0 {
        return None;
    }
    Some(PixelWindow {
        row: r0 as usize,
        col: c0 as usize,
        rows: (r1 - r0) as usize,
        cols: (c1 - c0) as usize,
    })
}

/// Masked array of one zone; `mask` is true where a pixel is outside the zone, cloudy or NaN
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneArray {
    pub zone_id: String,
    /// Transform of the window the array was cut from
    pub transform: Affine,
    pub values: Array2<f32>,
    pub mask: Array2<bool>,
}

impl ZoneArray {
    pub fn valid_count(&self) -> usize {
        self.mask.iter().filter(|m| !**m).count()
    }
}

/// Statistic values of one zone, in the requested order
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneStatistics {
    pub zone_id: String,
    pub values: Vec<(Statistic, Option<f64>)>,
}

impl ZoneStatistics {
    pub fn get(&self, stat: Statistic) -> Option<f64> {
        self.values
            .iter()
            .find(|(s, _)| *s == stat)
            .and_then(|(_, v)| *v)
    }
}

/// Cell index range of `len` cells starting at `origin` that the span `lo..=hi` touches
fn cell_span(lo: f64, hi: f64, origin: usize, len: usize) -> Range<usize> {
    let start = (lo.floor() - origin as f64).max(0.0);
    let end = (hi.floor() - origin as f64 + 1.0).min(len as f64);
    if end <= start {
        return 0..0;
    }
    start as usize..end as usize
}

/// Whether segment `p..q` (pixel space, (row, col)) runs through the open cell at (row, col).
/// Liang-Barsky clip to the cell, then the clipped midpoint must be strictly inside.
fn segment_crosses_cell(p: (f64, f64), q: (f64, f64), row: f64, col: f64) -> bool {
    const EPS: f64 = 1e-6;
    let (dr, dc) = (q.0 - p.0, q.1 - p.1);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dr, p.0 - row),
        (dr, row + 1.0 - p.0),
        (-dc, p.1 - col),
        (dc, col + 1.0 - p.1),
    ];
    for (delta, dist) in edges {
        if delta == 0.0 {
            if dist < 0.0 {
                return false;
            }
        } else if delta < 0.0 {
            t0 = t0.max(dist / delta);
        } else {
            t1 = t1.min(dist / delta);
        }
    }
    if t1 - t0 <= EPS {
        return false;
    }
    let t = (t0 + t1) / 2.0;
    let (mr, mc) = (p.0 + t * dr, p.1 + t * dc);
    mr > row + EPS && mr < row + 1.0 - EPS && mc > col + EPS && mc < col + 1.0 - EPS
}

/// Cells of `window` crossed by the zone outline
fn border_cells(zone: &Zone, affine: &Affine, window: &PixelWindow) -> Array2<bool> {
    let mut border = Array2::from_elem((window.rows, window.cols), false);
    for ring in &zone.rings {
        let points: Vec<(f64, f64)> = ring
            .iter()
            .filter_map(|&(x, y)| affine.to_pixel(x, y))
            .collect();
        for (&p, &q) in points.iter().zip(points.iter().cycle().skip(1)) {
            let rows = cell_span(p.0.min(q.0), p.0.max(q.0), window.row, window.rows);
            let cols = cell_span(p.1.min(q.1), p.1.max(q.1), window.col, window.cols);
            for r in rows {
                for c in cols.clone() {
                    let (row, col) = ((window.row + r) as f64, (window.col + c) as f64);
                    if segment_crosses_cell(p, q, row, col) {
                        border[[r, c]] = true;
                    }
                }
            }
        }
    }
    border
}

/// Zone array plus the membership grid (pixel counted as part of the zone)
fn cut_zone(
    cloud_mask: &Array2<bool>,
    array: &Array2<f32>,
    zone: &Zone,
    affine: &Affine,
    exclude_border: bool,
) -> Option<(ZoneArray, Array2<bool>)> {
    // Bands resampled by truncation may differ by a pixel; work on the common grid
    let shape = (
        array.nrows().min(cloud_mask.nrows()),
        array.ncols().min(cloud_mask.ncols()),
    );
    let window = zone_window(zone, affine, shape)?;
    let rows = window.row..window.row + window.rows;
    let cols = window.col..window.col + window.cols;
    let values = array.slice(s![rows.clone(), cols.clone()]).to_owned();
    let clouds = cloud_mask.slice(s![rows, cols]);
    let border = exclude_border.then(|| border_cells(zone, affine, &window));
    let members = Array2::from_shape_fn((window.rows, window.cols), |(r, c)| {
        let (x, y) = affine.pixel_center(window.row + r, window.col + c);
        zone.contains(x, y) && !border.as_ref().is_some_and(|b| b[[r, c]])
    });
    let mask = Array2::from_shape_fn((window.rows, window.cols), |(r, c)| {
        !members[[r, c]] || clouds[[r, c]] || values[[r, c]].is_nan()
    });
    let cut = ZoneArray {
        zone_id: zone.id.clone(),
        transform: affine.offset(window.row, window.col),
        values,
        mask,
    };
    Some((cut, members))
}

/// Masked per-zone arrays; zones outside the grid are left out
pub fn extract_arrays(
    cloud_mask: &Array2<bool>,
    array: &Array2<f32>,
    zones: &[Zone],
    affine: &Affine,
    exclude_border: bool,
) -> Vec<ZoneArray> {
    zones
        .par_iter()
        .filter_map(|zone| cut_zone(cloud_mask, array, zone, affine, exclude_border))
        .map(|(cut, _)| cut)
        .collect()
}

/// Per-zone statistics; every zone gets a row, with `count` 0 when it has no valid pixel
pub fn extract_statistics(
    cloud_mask: &Array2<bool>,
    array: &Array2<f32>,
    zones: &[Zone],
    affine: &Affine,
    statistics: &[Statistic],
    exclude_border: bool,
) -> Vec<ZoneStatistics> {
    zones
        .par_iter()
        .map(|zone| {
            let cut = cut_zone(cloud_mask, array, zone, affine, exclude_border);
            let (mut valid, masked) = match cut {
                Some((cut, members)) => {
                    let mut valid = Vec::new();
                    let mut masked = 0;
                    for ((r, c), &value) in cut.values.indexed_iter() {
                        if !members[[r, c]] {
                            continue;
                        }
                        if cut.mask[[r, c]] {
                            masked += 1;
                        } else {
                            valid.push(value as f64);
                        }
                    }
                    (valid, masked)
                }
                None => (Vec::new(), 0),
            };
            valid.sort_by(|a, b| a.total_cmp(b));
            ZoneStatistics {
                zone_id: zone.id.clone(),
                values: statistics
                    .iter()
                    .map(|stat| (*stat, compute_statistic(*stat, &valid, masked)))
                    .collect(),
            }
        })
        .collect()
}
