//! Per-pixel cloud masks at the run's target resolution. `true` marks a cloudy pixel.
use std::path::{Path, PathBuf};

use gdal::raster::ResampleAlg;
use ndarray::Array2;
use tracing::debug;

use crate::core::config::CloudMaskSource;
use crate::error::{Error, Result};
use crate::io::gdal::GdalBandReader;
use crate::io::raster_store::{RasterStore, upscaled_shape};
use crate::types::TileIdentity;

/// Pixels whose class is one of `classes`
pub fn mask_from_classes(classes_raster: &Array2<f32>, classes: &[u16]) -> Array2<bool> {
    classes_raster.mapv(|v| v.is_finite() && v >= 0.0 && classes.contains(&(v as u16)))
}

/// Pixels with any of `bits` set
pub fn mask_from_bits(qa_raster: &Array2<f32>, bits: &[u8]) -> Array2<bool> {
    let flags: u32 = bits.iter().filter(|b| **b < 32).fold(0, |acc, b| acc | (1 << b));
    qa_raster.mapv(|v| v.is_finite() && v >= 0.0 && (v as u32) & flags != 0)
}

/// Share of cloudy pixels in percent
pub fn cloudy_percent(mask: &Array2<bool>) -> f64 {
    if mask.is_empty() {
        return 0.0;
    }
    let cloudy = mask.iter().filter(|m| **m).count();
    cloudy as f64 * 100.0 / mask.len() as f64
}

/// Shape of the tile's grid at `target_resolution`
pub fn target_shape(store: &RasterStore, target_resolution: f64) -> Result<(usize, usize)> {
    let reference = store.reference_metadata()?;
    let factor = reference.transform.pixel_size() / target_resolution;
    Ok(upscaled_shape(reference.height, reference.width, factor))
}

/// `{base}_{tile}_{YYYYMMDD}.tif`
pub fn external_mask_path(base: &Path, tile: &TileIdentity) -> PathBuf {
    let name = format!(
        "{}_{}_{}.tif",
        base.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default(),
        tile.tile_id,
        tile.date.format("%Y%m%d")
    );
    base.with_file_name(name)
}

fn external_mask(path: &Path, shape: (usize, usize)) -> Result<Array2<bool>> {
    if !path.is_file() {
        return Err(Error::BandNotFound {
            band: "external cloud mask".to_string(),
            location: path.to_path_buf(),
        });
    }
    let reader = GdalBandReader::open(path)?;
    let raster = reader.read_band_resampled::<f32>(1, shape, ResampleAlg::NearestNeighbour)?;
    Ok(raster.mapv(|v| v.is_finite() && v != 0.0))
}

/// Build the cloud mask of a tile; class rasters are resampled nearest-neighbour
pub fn build_cloud_mask(
    store: &RasterStore,
    source: &CloudMaskSource,
    target_resolution: f64,
    tile: &TileIdentity,
) -> Result<Array2<bool>> {
    match source {
        CloudMaskSource::SceneClassification { band, classes } => {
            let raster =
                store.band_at_with(band, target_resolution, ResampleAlg::NearestNeighbour)?;
            Ok(mask_from_classes(&raster, classes))
        }
        CloudMaskSource::QualityBits { band, bits } => {
            let raster =
                store.band_at_with(band, target_resolution, ResampleAlg::NearestNeighbour)?;
            Ok(mask_from_bits(&raster, bits))
        }
        CloudMaskSource::External { base } => {
            let path = external_mask_path(base, tile);
            debug!("Reading external cloud mask {:?}", path);
            external_mask(&path, target_shape(store, target_resolution)?)
        }
        CloudMaskSource::None => {
            let shape = target_shape(store, target_resolution)?;
            debug!("No cloud information, clear mask of {:?}", shape);
            Ok(Array2::from_elem(shape, false))
        }
    }
}
