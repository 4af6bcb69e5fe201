use ndarray::Array2;

use crate::core::processing::extract::{Zone, zone_window};
use crate::types::Affine;

/// Outcome of the per-tile quality checks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Validity {
    pub cloud_cover_ok: bool,
    pub data_covered: bool,
}

impl Validity {
    pub fn is_valid(&self) -> bool {
        self.cloud_cover_ok && self.data_covered
    }

    /// Human-readable summary of the checks, naming each one that failed
    pub fn reason(&self, cloud_cover: f64, max_cloud_cover: f64) -> String {
        let clouds = format!("cloud cover {:.1}% exceeds {:.1}%", cloud_cover, max_cloud_cover);
        match (self.cloud_cover_ok, self.data_covered) {
            (true, true) => "all checks passed".to_string(),
            (false, true) => clouds,
            (true, false) => "no valid data over any zone".to_string(),
            (false, false) => format!("{} and no valid data over any zone", clouds),
        }
    }
}

/// True when some zone has a pixel centre on the grid with a finite value other than `nodata`
pub fn zones_have_data(
    zones: &[Zone],
    reference: &Array2<f32>,
    affine: &Affine,
    nodata: f32,
) -> bool {
    zones.iter().any(|zone| {
        let Some(window) = zone_window(zone, affine, reference.dim()) else {
            return false;
        };
        (window.row..window.row + window.rows).any(|r| {
            (window.col..window.col + window.cols).any(|c| {
                let value = reference[[r, c]];
                if !value.is_finite() || value == nodata {
                    return false;
                }
                let (x, y) = affine.pixel_center(r, c);
                zone.contains(x, y)
            })
        })
    })
}

/// Cloud-cover and data-coverage checks of one tile
pub fn validate_coverage(
    cloud_cover: f64,
    max_cloud_cover: f64,
    zones: &[Zone],
    reference: &Array2<f32>,
    affine: &Affine,
    nodata: f32,
) -> Validity {
    Validity {
        cloud_cover_ok: cloud_cover <= max_cloud_cover,
        data_covered: zones_have_data(zones, reference, affine, nodata),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn affine() -> Affine {
        Affine::from_gdal([0.0, 10.0, 0.0, 40.0, 0.0, -10.0])
    }

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Zone {
        Zone::new("z", vec![vec![(x0, y0), (x1, y0), (x1, y1), (x0, y1)]])
    }

    #[test]
    fn cloud_cover_threshold_is_inclusive() {
        let zones = [square(0.0, 0.0, 40.0, 40.0)];
        let reference = Array2::from_elem((4, 4), 1.0f32);
        let v = validate_coverage(80.0, 80.0, &zones, &reference, &affine(), 0.0);
        assert!(v.is_valid());
        let v = validate_coverage(80.5, 80.0, &zones, &reference, &affine(), 0.0);
        assert!(!v.cloud_cover_ok);
        assert!(v.reason(80.5, 80.0).contains("80.5"));
    }

    #[test]
    fn nodata_under_zones_is_not_covered() {
        let mut reference = Array2::from_elem((4, 4), 0.0f32);
        let zones = [square(0.0, 20.0, 20.0, 40.0)];
        assert!(!zones_have_data(&zones, &reference, &affine(), 0.0));
        // data outside the zone does not count
        reference[[3, 3]] = 5.0;
        assert!(!zones_have_data(&zones, &reference, &affine(), 0.0));
        reference[[1, 0]] = 5.0;
        assert!(zones_have_data(&zones, &reference, &affine(), 0.0));
    }

    #[test]
    fn zones_off_the_grid_are_not_covered() {
        let reference = Array2::from_elem((4, 4), 1.0f32);
        let zones = [square(100.0, 100.0, 120.0, 120.0)];
        let v = validate_coverage(0.0, 100.0, &zones, &reference, &affine(), 0.0);
        assert_eq!(
            v,
            Validity {
                cloud_cover_ok: true,
                data_covered: false
            }
        );
        assert_eq!(v.reason(0.0, 100.0), "no valid data over any zone");
    }
}
