use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;
use tracing::warn;

use crate::core::processing::extract::ZoneArray;
use crate::error::Result;

#[derive(Serialize)]
struct ZoneArrayRecord {
    /// GDAL geotransform of the zone window
    geotransform: [f64; 6],
    /// Row-major values, `null` where masked
    values: Vec<Vec<Option<f32>>>,
}

impl From<&ZoneArray> for ZoneArrayRecord {
    fn from(zone: &ZoneArray) -> Self {
        let values = zone
            .values
            .outer_iter()
            .zip(zone.mask.outer_iter())
            .map(|(row, mask)| {
                row.iter()
                    .zip(mask.iter())
                    .map(|(v, m)| if *m { None } else { Some(*v) })
                    .collect()
            })
            .collect();
        Self {
            geotransform: zone.transform.to_gdal(),
            values,
        }
    }
}

/// JSON object mapping zone id to its masked array. A repeated id keeps every array: the
/// n-th repeat is stored as `{id}_{n}`.
pub fn write_arrays_json(output: &Path, arrays: &[ZoneArray]) -> Result<()> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let mut records: BTreeMap<String, ZoneArrayRecord> = BTreeMap::new();
    for zone in arrays {
        let repeats = seen.entry(zone.zone_id.as_str()).or_insert(0);
        let mut key = zone.zone_id.clone();
        while records.contains_key(&key) {
            *repeats += 1;
            key = format!("{}_{}", zone.zone_id, repeats);
        }
        if *repeats > 0 {
            warn!("Zone id {:?} is not unique, storing it as {:?}", zone.zone_id, key);
        }
        records.insert(key, ZoneArrayRecord::from(zone));
    }
    let writer = BufWriter::new(File::create(output)?);
    serde_json::to_writer(writer, &records)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Affine;
    use ndarray::array;

    #[test]
    fn masked_pixels_are_null() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("ndvi_array.json");
        let zone = ZoneArray {
            zone_id: "f1".into(),
            transform: Affine::from_gdal([10.0, 10.0, 0.0, 30.0, 0.0, -10.0]),
            values: array![[0.5f32, 0.25], [1.0, 0.0]],
            mask: array![[false, true], [false, false]],
        };
        write_arrays_json(&out, &[zone]).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["f1"]["values"][0][0], 0.5);
        assert!(json["f1"]["values"][0][1].is_null());
        assert_eq!(json["f1"]["geotransform"][3], 30.0);
    }

    #[test]
    fn repeated_zone_ids_keep_every_array() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("ndvi_array.json");
        let zone = |value: f32| ZoneArray {
            zone_id: "f1".into(),
            transform: Affine::from_gdal([0.0, 10.0, 0.0, 10.0, 0.0, -10.0]),
            values: array![[value]],
            mask: array![[false]],
        };
        write_arrays_json(&out, &[zone(1.0), zone(2.0), zone(3.0)]).unwrap();
        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 3);
        assert_eq!(json["f1"]["values"][0][0], 1.0);
        assert_eq!(json["f1_1"]["values"][0][0], 2.0);
        assert_eq!(json["f1_2"]["values"][0][0], 3.0);
    }
}
