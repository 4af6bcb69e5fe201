//! Artifact writers: statistics CSV, masked-array JSON and per-zone GeoTIFFs, plus the
//! file-system [`ArtifactWriter`] that names and places them.
pub mod array;
pub mod table;
pub mod tiff;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::core::pipeline::collaborators::{ArtifactKey, ArtifactWriter};
use crate::core::processing::extract::{ZoneArray, ZoneStatistics};
use crate::error::{Error, Result};
use crate::types::Statistic;

/// Characters that cannot appear in a file name are replaced by `_`
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect()
}

/// Writes artifacts under one output directory
#[derive(Debug, Clone)]
pub struct FileWriter {
    output_dir: PathBuf,
}

impl FileWriter {
    /// Creates `output_dir` when missing
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        fs::create_dir_all(output_dir.as_ref())?;
        Ok(Self {
            output_dir: output_dir.as_ref().to_path_buf(),
        })
    }

    pub fn statistics_path(&self, key: &ArtifactKey) -> PathBuf {
        self.output_dir.join(format!("{}_statistics.csv", key.stem()))
    }

    pub fn array_path(&self, key: &ArtifactKey) -> PathBuf {
        self.output_dir.join(format!("{}_array.json", key.stem()))
    }

    pub fn zone_tiff_path(&self, key: &ArtifactKey, zone_id: &str) -> PathBuf {
        self.output_dir
            .join(format!("{}_{}.tif", key.stem(), sanitize(zone_id)))
    }
}

impl ArtifactWriter for FileWriter {
    fn write_statistics(
        &self,
        key: &ArtifactKey,
        statistics: &[Statistic],
        rows: &[ZoneStatistics],
    ) -> Result<PathBuf> {
        let path = self.statistics_path(key);
        table::write_statistics_csv(&path, statistics, rows)?;
        debug!("Wrote {:?}", path);
        Ok(path)
    }

    fn write_arrays(&self, key: &ArtifactKey, arrays: &[ZoneArray]) -> Result<PathBuf> {
        let path = self.array_path(key);
        array::write_arrays_json(&path, arrays)?;
        debug!("Wrote {:?}", path);
        Ok(path)
    }

    fn write_geotiffs(
        &self,
        key: &ArtifactKey,
        arrays: &[ZoneArray],
        epsg: Option<u32>,
    ) -> Result<Vec<PathBuf>> {
        let mut written = Vec::with_capacity(arrays.len());
        for zone in arrays {
            let path = self.zone_tiff_path(key, &zone.zone_id);
            tiff::write_zone_tiff(&path, zone, epsg).map_err(Error::external)?;
            written.push(path);
        }
        debug!("Wrote {} zone GeoTIFF(s) for {}", written.len(), key.stem());
        Ok(written)
    }
}
