use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::core::processing::stats::ensure_count;
use crate::error::{Error, Result};
use crate::types::{ExtractionMode, Platform, Statistic};

/// Where tiles come from: a directory scanned for matching entries, or one explicit tile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputSource {
    Directory(PathBuf),
    File(PathBuf),
}

/// Inclusive acquisition-date window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidArgument {
                arg: "start",
                value: format!("{} is after end {}", start, end),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Extraction parameters suitable for config files and programmatic runs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionParams {
    pub platform: Platform,
    pub input: InputSource,
    /// Zone file base path; `{base}_{tile}.{ext}` is preferred over `{base}.{ext}`
    pub vector: PathBuf,
    /// Layer of a multi-layer zone file (e.g. GeoPackage); the first layer when `None`
    #[serde(default)]
    pub vector_layer: Option<String>,
    /// Zone attribute used as the zone id
    pub id_field: String,
    pub output_dir: PathBuf,
    /// Index names or raw band names, processed in order
    pub indices: Vec<String>,
    pub statistics: Vec<Statistic>,
    pub dates: DateRange,
    /// Output formats written for every token, in this order
    pub modes: Vec<ExtractionMode>,
    /// Leave out pixels whose cell is cut by a zone boundary
    #[serde(default)]
    pub exclude_border: bool,
    /// Worker threads; None uses all available cores
    pub jobs: Option<usize>,
}

impl ExtractionParams {
    /// Statistics to compute, always including `count` exactly once
    pub fn effective_statistics(&self) -> Vec<Statistic> {
        ensure_count(&self.statistics)
    }

    /// Output formats without repeats, first occurrence wins
    pub fn effective_modes(&self) -> Vec<ExtractionMode> {
        let mut modes = Vec::with_capacity(self.modes.len());
        for mode in &self.modes {
            if !modes.contains(mode) {
                modes.push(*mode);
            }
        }
        modes
    }

    pub fn validate(&self) -> Result<()> {
        if self.indices.is_empty() {
            return Err(Error::MissingArgument {
                arg: "index".to_string(),
            });
        }
        if self.id_field.trim().is_empty() {
            return Err(Error::MissingArgument {
                arg: "id".to_string(),
            });
        }
        if self.modes.is_empty() {
            return Err(Error::MissingArgument {
                arg: "mode".to_string(),
            });
        }
        if self.jobs == Some(0) {
            return Err(Error::InvalidArgument {
                arg: "jobs",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn date_range_is_inclusive() {
        let range = DateRange::new(date(2020, 1, 1), date(2020, 12, 31)).unwrap();
        assert!(range.contains(date(2020, 1, 1)));
        assert!(range.contains(date(2020, 12, 31)));
        assert!(!range.contains(date(2019, 12, 31)));
        assert!(!range.contains(date(2021, 1, 1)));
    }

    #[test]
    fn reversed_range_is_rejected() {
        assert!(DateRange::new(date(2021, 1, 1), date(2020, 1, 1)).is_err());
        let single = DateRange::new(date(2020, 6, 15), date(2020, 6, 15)).unwrap();
        assert!(single.contains(date(2020, 6, 15)));
    }

    #[test]
    fn params_round_trip_through_json() {
        let params = ExtractionParams {
            platform: Platform::S2,
            input: InputSource::Directory(PathBuf::from("/data/s2")),
            vector: PathBuf::from("/data/fields.gpkg"),
            vector_layer: Some("parcels_2020".into()),
            id_field: "parcel".into(),
            output_dir: PathBuf::from("results"),
            indices: vec!["ndvi".into(), "B05".into()],
            statistics: vec![Statistic::Mean, Statistic::Percentile(90)],
            dates: DateRange::new(date(2020, 1, 1), date(2020, 12, 31)).unwrap(),
            modes: vec![ExtractionMode::Statistics, ExtractionMode::RawArray],
            exclude_border: true,
            jobs: Some(2),
        };
        let json = serde_json::to_string(&params).unwrap();
        assert!(json.contains("\"percentile_90\""));
        let back: ExtractionParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back.statistics, params.statistics);
        assert_eq!(back.input, params.input);
        assert_eq!(back.effective_statistics()[0], Statistic::Count);
        assert_eq!(back.vector_layer.as_deref(), Some("parcels_2020"));
        assert!(back.exclude_border);
        back.validate().unwrap();
    }

    #[test]
    fn optional_fields_default_and_modes_deduplicate() {
        let json = r#"{
            "platform": "tif",
            "input": { "file": "scene_20200615.tif" },
            "vector": "zones.geojson",
            "id_field": "id",
            "output_dir": "out",
            "indices": ["ndvi"],
            "statistics": [],
            "dates": { "start": "2020-01-01", "end": "2020-12-31" },
            "modes": ["geotiff", "statistics", "geotiff"],
            "jobs": null
        }"#;
        let params: ExtractionParams = serde_json::from_str(json).unwrap();
        assert!(!params.exclude_border);
        assert_eq!(params.vector_layer, None);
        assert_eq!(
            params.effective_modes(),
            vec![ExtractionMode::Geotiff, ExtractionMode::Statistics]
        );

        let no_modes = ExtractionParams {
            modes: Vec::new(),
            ..params
        };
        assert!(matches!(no_modes.validate(), Err(Error::MissingArgument { .. })));
    }
}
