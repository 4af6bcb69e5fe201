//! GDAL-backed [`TileReader`]: opens a [`RasterStore`] per tile and serves indices, raw
//! bands, cloud masks and cloud cover on the run's target-resolution grid.
use std::sync::Arc;

use ndarray::Array2;

use crate::core::config::PlatformConfig;
use crate::core::pipeline::collaborators::{TileAccess, TileReader};
use crate::core::processing::cloudmask::{build_cloud_mask, cloudy_percent};
use crate::core::processing::indices::IndexCalculator;
use crate::error::Result;
use crate::io::metadata::read_cloud_cover;
use crate::io::raster_store::{BandLayout, RasterStore, layout_for};
use crate::types::{Affine, TileIdentity};

pub struct GdalTileReader {
    config: Arc<PlatformConfig>,
    layout: Arc<dyn BandLayout>,
    resolution: f64,
}

impl GdalTileReader {
    /// The band layout is chosen here, once for the whole run
    pub fn new(config: PlatformConfig, resolution: f64) -> Self {
        let layout = layout_for(&config, resolution);
        Self {
            config: Arc::new(config),
            layout,
            resolution,
        }
    }
}

impl TileReader for GdalTileReader {
    fn open(&self, tile: &TileIdentity) -> Result<Box<dyn TileAccess>> {
        Ok(Box::new(GdalTile {
            tile: tile.clone(),
            store: RasterStore::new(&tile.image_path, Arc::clone(&self.layout)),
            config: Arc::clone(&self.config),
            resolution: self.resolution,
        }))
    }
}

pub struct GdalTile {
    tile: TileIdentity,
    store: RasterStore,
    config: Arc<PlatformConfig>,
    resolution: f64,
}

impl GdalTile {
    fn calculator(&self) -> IndexCalculator<'_> {
        IndexCalculator::new(
            &self.store,
            &self.config.bands,
            self.resolution,
            self.config.quantification_value,
        )
    }
}

impl TileAccess for GdalTile {
    fn epsg(&self) -> Result<Option<u32>> {
        Ok(self.store.reference_metadata()?.epsg)
    }

    fn affine(&self) -> Result<Affine> {
        Ok(self
            .store
            .reference_metadata()?
            .transform
            .with_resolution(self.resolution))
    }

    fn supported_indices(&self) -> Vec<String> {
        self.calculator()
            .supported_indices()
            .into_iter()
            .map(String::from)
            .collect()
    }

    fn calculate_index(&self, name: &str) -> Result<Array2<f32>> {
        self.calculator().calculate_index(name)
    }

    fn band(&self, name: &str) -> Result<Array2<f32>> {
        self.calculator().band(name)
    }

    fn cloud_mask(&self) -> Result<Array2<bool>> {
        build_cloud_mask(
            &self.store,
            &self.config.cloud_mask,
            self.resolution,
            &self.tile,
        )
    }

    fn cloud_cover(&self, mask: &Array2<bool>) -> Result<f64> {
        match read_cloud_cover(self.config.platform, &self.tile.path)? {
            Some(cover) => Ok(cover),
            None => Ok(cloudy_percent(mask)),
        }
    }

    fn reference_band(&self) -> Result<Array2<f32>> {
        self.store
            .band_at(&self.config.reference_band, self.resolution)
    }

    fn nodata(&self) -> f32 {
        self.config.nodata
    }
}
