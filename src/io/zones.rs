//! Vector zones read through GDAL/OGR and reprojected to a tile's CRS.
//!
//! A tile-specific file `{base}_{tile}.{ext}` is preferred over the shared `{base}.{ext}`.
//! Reprojected zones are cached per (file, EPSG) so each combination is read once per run.
//! Reads of different keys run concurrently.
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use gdal::Dataset;
use gdal::spatial_ref::{AxisMappingStrategy, SpatialRef};
use gdal::vector::{Geometry, LayerAccess};
use once_cell::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::core::pipeline::collaborators::ZoneProvider;
use crate::core::processing::extract::Zone;
use crate::error::{Error, Result};

/// Rings of a (multi)polygon, flattened
fn collect_rings(geometry: &Geometry, rings: &mut Vec<Vec<(f64, f64)>>) {
    let parts = geometry.geometry_count();
    if parts == 0 {
        let mut points = Vec::new();
        geometry.get_points(&mut points);
        let ring: Vec<(f64, f64)> = points
            .into_iter()
            .map(|(x, y, _)| (x, y))
            .collect();
        if ring.len() >= 3 {
            rings.push(ring);
        }
        return;
    }
    for i in 0..parts {
        collect_rings(&geometry.get_geometry(i), rings);
    }
}

/// Zone file to use for a tile
pub fn zone_file_for(base: &Path, tile_id: &str) -> PathBuf {
    let ext = base
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "shp".to_string());
    let stem = base
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = base.parent().unwrap_or_else(|| Path::new(""));
    let per_tile = parent.join(format!("{}_{}.{}", stem, tile_id, ext));
    if per_tile.is_file() {
        per_tile
    } else {
        parent.join(format!("{}.{}", stem, ext))
    }
}

/// Reprojection target for a layer, `None` when the zones are used as stored.
///
/// The target keeps the traditional GIS (x = easting/longitude) axis order so geographic
/// tiles get (lon, lat) coordinates like their geotransform.
fn reprojection_target(
    path: &Path,
    layer_srs: Option<&SpatialRef>,
    epsg: Option<u32>,
) -> Result<Option<SpatialRef>> {
    let Some(code) = epsg else {
        return Ok(None);
    };
    let Some(layer_srs) = layer_srs else {
        warn!("{:?} has no CRS; zones are used as-is", path);
        return Ok(None);
    };
    if layer_srs.auth_code().ok() == i32::try_from(code).ok() {
        debug!("{:?} is already in EPSG:{}", path, code);
        return Ok(None);
    }
    let mut target = SpatialRef::from_epsg(code)?;
    target.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(Some(target))
}

/// Read every polygon feature of `layer` (the first layer when `None`), optionally
/// reprojected to `epsg`
pub fn read_zones(
    path: &Path,
    id_field: &str,
    layer: Option<&str>,
    epsg: Option<u32>,
) -> Result<Vec<Zone>> {
    let dataset = Dataset::open(path)?;
    let mut layer = match layer {
        Some(name) => dataset.layer_by_name(name)?,
        None => dataset.layer(0)?,
    };
    let target = reprojection_target(path, layer.spatial_ref().as_ref(), epsg)?;

    let mut zones = Vec::new();
    for feature in layer.features() {
        let id = feature
            .fields()
            .find(|(name, _)| name == id_field)
            .and_then(|(_, value)| value)
            .and_then(|value| value.into_string())
            .ok_or_else(|| Error::MissingArgument {
                arg: format!("{} attribute in {:?}", id_field, path),
            })?;
        let Some(geometry) = feature.geometry() else {
            debug!("Zone {} has no geometry, skipping", id);
            continue;
        };
        let mut rings = Vec::new();
        match &target {
            Some(srs) => collect_rings(&geometry.transform_to(srs)?, &mut rings),
            None => collect_rings(geometry, &mut rings),
        }
        if rings.is_empty() {
            debug!("Zone {} is not a polygon, skipping", id);
            continue;
        }
        zones.push(Zone::new(id, rings));
    }
    info!("Loaded {} zone(s) from {:?}", zones.len(), path);
    Ok(zones)
}

type ZoneCell = Arc<OnceCell<Arc<Vec<Zone>>>>;

/// [`ZoneProvider`] over vector files readable by OGR
pub struct VectorZones {
    base: PathBuf,
    id_field: String,
    layer: Option<String>,
    /// One cell per (file, EPSG); only tiles sharing a key wait on each other
    cache: Mutex<HashMap<(PathBuf, Option<u32>), ZoneCell>>,
}

impl VectorZones {
    pub fn new<P: AsRef<Path>>(base: P, id_field: impl Into<String>) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            id_field: id_field.into(),
            layer: None,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Read the named layer (e.g. of a GeoPackage) instead of the first one
    pub fn with_layer(mut self, layer: Option<String>) -> Self {
        self.layer = layer;
        self
    }

    fn cell(&self, key: (PathBuf, Option<u32>)) -> Result<ZoneCell> {
        let mut cache = self
            .cache
            .lock()
            .map_err(|_| Error::Processing("zone cache lock poisoned".into()))?;
        Ok(Arc::clone(cache.entry(key).or_default()))
    }
}

impl ZoneProvider for VectorZones {
    fn zones(&self, tile_id: &str, epsg: Option<u32>) -> Result<Arc<Vec<Zone>>> {
        let path = zone_file_for(&self.base, tile_id);
        let cell = self.cell((path.clone(), epsg))?;
        let zones = cell.get_or_try_init(|| {
            read_zones(&path, &self.id_field, self.layer.as_deref(), epsg).map(Arc::new)
        })?;
        Ok(Arc::clone(zones))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn prefers_tile_specific_zone_file() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("fields.gpkg");
        assert_eq!(zone_file_for(&base, "35VLG"), base);
        let per_tile = dir.path().join("fields_35VLG.gpkg");
        fs::write(&per_tile, b"").unwrap();
        assert_eq!(zone_file_for(&base, "35VLG"), per_tile);
        assert_eq!(zone_file_for(&base, "34VFN"), base);
    }

    /// Square in `crs` (GeoJSON `crs` member; CRS84 when `None`) with layer name `fields`
    fn write_square(path: &Path, crs: Option<&str>, (x0, y0, x1, y1): (f64, f64, f64, f64)) {
        let crs = crs
            .map(|c| format!(r#""crs": {{ "type": "name", "properties": {{ "name": "{c}" }} }},"#))
            .unwrap_or_default();
        let geojson = format!(
            r#"{{ "type": "FeatureCollection", "name": "fields", {crs}
  "features": [{{ "type": "Feature", "properties": {{ "parcel": "p1" }},
    "geometry": {{ "type": "Polygon",
      "coordinates": [[[{x0}, {y0}], [{x1}, {y0}], [{x1}, {y1}], [{x0}, {y1}], [{x0}, {y0}]]] }} }}]
}}"#
        );
        fs::write(path, geojson).unwrap();
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-7
    }

    #[test]
    fn projected_zones_reach_geographic_tiles_in_lon_lat_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.geojson");
        // ~(2.2 m, 24.5 m) .. (20.0 m, 42.3 m) east/north of (0, 0)
        write_square(
            &path,
            Some("urn:ogc:def:crs:EPSG::3857"),
            (2.2264, 24.4903, 20.0375, 42.3014),
        );
        let zones = read_zones(&path, "parcel", None, Some(4326)).unwrap();
        let (min_x, min_y, max_x, max_y) = zones[0].bounds().unwrap();
        assert!(close(min_x, 0.2e-4), "{min_x}");
        assert!(close(max_x, 1.8e-4), "{max_x}");
        assert!(close(min_y, 2.2e-4), "{min_y}");
        assert!(close(max_y, 3.8e-4), "{max_y}");
    }

    #[test]
    fn zones_already_in_tile_crs_keep_their_coordinates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.geojson");
        write_square(&path, None, (0.2e-4, 2.2e-4, 1.8e-4, 3.8e-4));
        let zones = read_zones(&path, "parcel", None, Some(4326)).unwrap();
        let (min_x, min_y, _, _) = zones[0].bounds().unwrap();
        assert!(close(min_x, 0.2e-4) && close(min_y, 2.2e-4), "{min_x} {min_y}");
    }

    #[test]
    fn named_layer_is_selected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fields.geojson");
        write_square(&path, None, (0.0, 0.0, 1.0, 1.0));
        assert_eq!(read_zones(&path, "parcel", Some("fields"), None).unwrap().len(), 1);
        assert!(read_zones(&path, "parcel", Some("roads"), None).is_err());
        assert!(matches!(
            read_zones(&path, "block", None, None),
            Err(Error::MissingArgument { .. })
        ));
    }

    #[test]
    fn zones_are_read_once_per_file_and_epsg() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("fields.geojson");
        write_square(&base, None, (0.0, 0.0, 1.0, 1.0));
        let provider = VectorZones::new(&base, "parcel").with_layer(Some("fields".into()));
        let first = provider.zones("35VLG", None).unwrap();
        fs::remove_file(&base).unwrap();
        let again = provider.zones("34VFN", None).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert!(provider.zones("35VLG", Some(3067)).is_err());
    }

    #[test]
    fn base_without_extension_defaults_to_shapefile() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("parcels");
        assert_eq!(zone_file_for(&base, "T1"), dir.path().join("parcels.shp"));
    }
}
