//! Seams between the orchestrator and the components it drives. Concrete implementations
//! live in `io`; tests substitute in-memory fakes.
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDate;
use ndarray::Array2;

use crate::core::processing::extract::{Zone, ZoneArray, ZoneStatistics};
use crate::error::Result;
use crate::types::{Affine, Statistic, TileIdentity};

/// Resolves tile id, date and image path from a discovered path
pub trait TileIdentifier: Send + Sync {
    fn identify(&self, path: &Path) -> Result<TileIdentity>;
}

/// Opens tiles for reading
pub trait TileReader: Send + Sync {
    fn open(&self, tile: &TileIdentity) -> Result<Box<dyn TileAccess>>;
}

/// Band, index and quality access to one opened tile. Arrays are on the target-resolution
/// grid described by `affine`.
pub trait TileAccess {
    fn epsg(&self) -> Result<Option<u32>>;

    fn affine(&self) -> Result<Affine>;

    /// Index names this tile can compute
    fn supported_indices(&self) -> Vec<String>;

    fn calculate_index(&self, name: &str) -> Result<Array2<f32>>;

    fn band(&self, name: &str) -> Result<Array2<f32>>;

    /// `true` marks a cloudy pixel
    fn cloud_mask(&self) -> Result<Array2<bool>>;

    /// Scene cloud cover in percent; `mask` serves as fallback when metadata has none
    fn cloud_cover(&self, mask: &Array2<bool>) -> Result<f64>;

    /// Reference band at the target resolution, for data-coverage checks
    fn reference_band(&self) -> Result<Array2<f32>>;

    fn nodata(&self) -> f32;
}

/// Zones of a tile reprojected to the tile's CRS
pub trait ZoneProvider: Send + Sync {
    fn zones(&self, tile_id: &str, epsg: Option<u32>) -> Result<Arc<Vec<Zone>>>;
}

/// Identity of one written artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactKey {
    pub date: NaiveDate,
    pub tile_id: String,
    /// Requested token as given (index name or raw band name)
    pub index: String,
}

impl ArtifactKey {
    pub fn new(tile: &TileIdentity, index: &str) -> Self {
        Self {
            date: tile.date,
            tile_id: tile.tile_id.clone(),
            index: index.to_string(),
        }
    }

    /// `{index}_{YYYYMMDD}_{tile}`, the common prefix of artifact file names
    pub fn stem(&self) -> String {
        format!("{}_{}_{}", self.index, self.date.format("%Y%m%d"), self.tile_id)
    }
}

/// Persists extraction results
pub trait ArtifactWriter: Send + Sync {
    fn write_statistics(
        &self,
        key: &ArtifactKey,
        statistics: &[Statistic],
        rows: &[ZoneStatistics],
    ) -> Result<PathBuf>;

    fn write_arrays(&self, key: &ArtifactKey, arrays: &[ZoneArray]) -> Result<PathBuf>;

    fn write_geotiffs(
        &self,
        key: &ArtifactKey,
        arrays: &[ZoneArray],
        epsg: Option<u32>,
    ) -> Result<Vec<PathBuf>>;
}
