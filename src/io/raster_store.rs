//! Platform-agnostic band access for one tile.
//!
//! A [`BandLayout`] knows where a platform keeps its band files; the [`RasterStore`] turns a
//! band name into an array at a requested resolution and exposes the tile's reference
//! metadata (CRS and transform), read once from the reference band.
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use gdal::raster::{GdalType, ResampleAlg};
use ndarray::Array2;
use once_cell::sync::OnceCell;
use tracing::{debug, info};

use crate::core::config::PlatformConfig;
use crate::error::{Error, Result};
use crate::io::gdal::GdalBandReader;
use crate::types::{Affine, Platform};

/// Physical source of one band
#[derive(Debug, Clone, PartialEq)]
pub struct BandLocation {
    pub path: PathBuf,
    /// 1-based band index inside `path`
    pub band_index: usize,
    /// Native pixel size when the layout encodes it (e.g. a resolution directory)
    pub native_resolution: Option<f64>,
}

/// CRS and transform shared by every band of a tile
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceMetadata {
    pub crs: String,
    pub epsg: Option<u32>,
    pub transform: Affine,
    pub width: usize,
    pub height: usize,
}

/// Where a platform keeps its band files
pub trait BandLayout: Send + Sync {
    /// Locate `band` under a tile's image path
    fn resolve_band_location(&self, image_path: &Path, band: &str) -> Result<BandLocation>;

    /// Band whose file provides the tile's reference metadata
    fn reference_band(&self) -> &str;

    /// Configured native pixel size of `band`, if known without opening it
    fn native_resolution(&self, band: &str) -> Option<f64>;
}

fn band_not_found(band: &str, location: &Path) -> Error {
    Error::BandNotFound {
        band: band.to_string(),
        location: location.to_path_buf(),
    }
}

/// First entry of `dir` (in name order) whose file name satisfies `matches`
fn find_file(dir: &Path, matches: impl Fn(&str) -> bool) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut found: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .map(|name| matches(&name.to_string_lossy()))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    found.into_iter().next()
}

/// Sentinel-2 L2A: one `R{res}m` directory per resolution tier, files named `*_{band}_{res}m.jp2`
#[derive(Debug, Clone)]
pub struct Sentinel2Layout {
    pub target_tier: u32,
    pub fallback_tier: u32,
    pub fine_tier: u32,
    pub fine_fallback_bands: Vec<String>,
    pub reference_band: String,
    pub native_resolutions: BTreeMap<String, f64>,
}

impl Sentinel2Layout {
    fn find_in_tier(image_path: &Path, band: &str, tier: u32) -> Option<BandLocation> {
        let dir = image_path.join(format!("R{}m", tier));
        let suffix = format!("{}_{}m.jp2", band, tier);
        find_file(&dir, |name| name.ends_with(&suffix)).map(|path| BandLocation {
            path,
            band_index: 1,
            native_resolution: Some(tier as f64),
        })
    }
}

impl BandLayout for Sentinel2Layout {
    fn resolve_band_location(&self, image_path: &Path, band: &str) -> Result<BandLocation> {
        if let Some(location) = Self::find_in_tier(image_path, band, self.target_tier) {
            return Ok(location);
        }
        let tier = if self.fine_fallback_bands.iter().any(|b| b == band) {
            self.fine_tier
        } else {
            self.fallback_tier
        };
        debug!(
            "{} not found at R{}m, falling back to R{}m",
            band, self.target_tier, tier
        );
        Self::find_in_tier(image_path, band, tier).ok_or_else(|| band_not_found(band, image_path))
    }

    fn reference_band(&self) -> &str {
        &self.reference_band
    }

    fn native_resolution(&self, band: &str) -> Option<f64> {
        self.native_resolutions.get(band).copied()
    }
}

/// Landsat-style scene directory: every band is a `*_{band}.tif` file in one directory
#[derive(Debug, Clone)]
pub struct FlatDirectoryLayout {
    pub reference_band: String,
    pub native_resolutions: BTreeMap<String, f64>,
    pub default_resolution: Option<f64>,
}

impl BandLayout for FlatDirectoryLayout {
    fn resolve_band_location(&self, image_path: &Path, band: &str) -> Result<BandLocation> {
        let suffix = format!("_{}.tif", band).to_ascii_lowercase();
        find_file(image_path, |name| name.to_ascii_lowercase().ends_with(&suffix))
            .map(|path| BandLocation {
                path,
                band_index: 1,
                native_resolution: None,
            })
            .ok_or_else(|| band_not_found(band, image_path))
    }

    fn reference_band(&self) -> &str {
        &self.reference_band
    }

    fn native_resolution(&self, band: &str) -> Option<f64> {
        self.native_resolutions
            .get(band)
            .copied()
            .or(self.default_resolution)
    }
}

/// A single GeoTIFF holding every band; the tile path is the band location
#[derive(Debug, Clone)]
pub struct SingleFileLayout {
    pub reference_band: String,
    pub band_indices: BTreeMap<String, usize>,
    pub native_resolutions: BTreeMap<String, f64>,
}

impl SingleFileLayout {
    fn band_index(&self, band: &str) -> usize {
        if let Some(index) = self.band_indices.get(band) {
            return *index;
        }
        let digits: String = band
            .chars()
            .rev()
            .take_while(|c| c.is_ascii_digit())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        digits.parse().ok().filter(|i| *i > 0).unwrap_or(1)
    }
}

impl BandLayout for SingleFileLayout {
    fn resolve_band_location(&self, image_path: &Path, band: &str) -> Result<BandLocation> {
        let is_tiff = image_path
            .extension()
            .map(|ext| {
                let ext = ext.to_string_lossy().to_ascii_lowercase();
                ext == "tif" || ext == "tiff"
            })
            .unwrap_or(false);
        if !is_tiff || !image_path.is_file() {
            return Err(band_not_found(band, image_path));
        }
        Ok(BandLocation {
            path: image_path.to_path_buf(),
            band_index: self.band_index(band),
            native_resolution: None,
        })
    }

    fn reference_band(&self) -> &str {
        &self.reference_band
    }

    fn native_resolution(&self, band: &str) -> Option<f64> {
        self.native_resolutions.get(band).copied()
    }
}

/// Select the layout for a platform convention; done once per run
pub fn layout_for(config: &PlatformConfig, target_resolution: f64) -> Arc<dyn BandLayout> {
    match config.platform {
        Platform::S2 => Arc::new(Sentinel2Layout {
            target_tier: target_resolution.round() as u32,
            fallback_tier: config.fallback_tier,
            fine_tier: config.fine_tier,
            fine_fallback_bands: config.fine_fallback_bands.clone(),
            reference_band: config.reference_band.clone(),
            native_resolutions: config.native_resolutions.clone(),
        }),
        Platform::Ls8 => Arc::new(FlatDirectoryLayout {
            reference_band: config.reference_band.clone(),
            native_resolutions: config.native_resolutions.clone(),
            default_resolution: Some(config.default_resolution),
        }),
        Platform::Tif => Arc::new(SingleFileLayout {
            reference_band: config.reference_band.clone(),
            band_indices: config.band_indices.clone(),
            native_resolutions: config.native_resolutions.clone(),
        }),
    }
}

/// Output shape of an upsampled read: dimensions are truncated, never rounded
pub fn upscaled_shape(rows: usize, cols: usize, upscale_factor: f64) -> (usize, usize) {
    (
        (rows as f64 * upscale_factor).floor() as usize,
        (cols as f64 * upscale_factor).floor() as usize,
    )
}

/// Band access for one tile
pub struct RasterStore {
    image_path: PathBuf,
    layout: Arc<dyn BandLayout>,
    reference: OnceCell<ReferenceMetadata>,
}

impl RasterStore {
    pub fn new<P: AsRef<Path>>(image_path: P, layout: Arc<dyn BandLayout>) -> Self {
        Self {
            image_path: image_path.as_ref().to_path_buf(),
            layout,
            reference: OnceCell::new(),
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    pub fn resolve_band_location(&self, band: &str) -> Result<BandLocation> {
        self.layout.resolve_band_location(&self.image_path, band)
    }

    /// CRS and transform of the reference band, read on first access only
    pub fn reference_metadata(&self) -> Result<&ReferenceMetadata> {
        self.reference.get_or_try_init(|| {
            let band = self.layout.reference_band();
            let location = self.resolve_band_location(band)?;
            info!("Reading reference metadata from {:?}", location.path);
            let reader = GdalBandReader::open(&location.path)?;
            Ok(ReferenceMetadata {
                crs: reader.metadata.projection.clone(),
                epsg: reader.metadata.epsg,
                transform: Affine::from_gdal(reader.metadata.geotransform),
                width: reader.metadata.size_x,
                height: reader.metadata.size_y,
            })
        })
    }

    /// Raw band content cast to `T`, without resampling
    pub fn band<T: GdalType + Copy>(&self, band: &str) -> Result<Array2<T>> {
        let location = self.resolve_band_location(band)?;
        let reader = GdalBandReader::open(&location.path)?;
        Ok(reader.read_band::<T>(location.band_index)?)
    }

    /// Band upsampled from `native_resolution` to `target_resolution` with bilinear
    /// interpolation, read directly at the truncated output shape. A coarser target is
    /// rejected; [`RasterStore::band_at`] handles that direction.
    pub fn resampled_band(
        &self,
        band: &str,
        native_resolution: f64,
        target_resolution: f64,
    ) -> Result<Array2<f32>> {
        self.resampled_band_with(band, native_resolution, target_resolution, ResampleAlg::Bilinear)
    }

    /// As [`RasterStore::resampled_band`] with an explicit resampling algorithm
    pub fn resampled_band_with(
        &self,
        band: &str,
        native_resolution: f64,
        target_resolution: f64,
        alg: ResampleAlg,
    ) -> Result<Array2<f32>> {
        let location = self.resolve_band_location(band)?;
        let reader = GdalBandReader::open(&location.path)?;
        read_upsampled(&reader, &location, native_resolution, target_resolution, alg)
    }

    /// Band at `target_resolution`, resampling only when its native resolution differs.
    /// Coarser bands are upsampled bilinearly; finer bands (e.g. a 10 m band on a 20 m run)
    /// are block-averaged down to the target grid.
    pub fn band_at(&self, band: &str, target_resolution: f64) -> Result<Array2<f32>> {
        self.read_at(band, target_resolution, ResampleAlg::Bilinear, ResampleAlg::Average)
    }

    /// As [`RasterStore::band_at`] with one algorithm for both directions; class rasters
    /// use nearest-neighbour
    pub fn band_at_with(
        &self,
        band: &str,
        target_resolution: f64,
        alg: ResampleAlg,
    ) -> Result<Array2<f32>> {
        self.read_at(band, target_resolution, alg, alg)
    }

    /// Native pixel size of `band`: the layout location, then the configured map, then the
    /// file's own geotransform
    fn native_resolution_of(
        &self,
        band: &str,
        location: &BandLocation,
        reader: &GdalBandReader,
    ) -> f64 {
        location
            .native_resolution
            .or_else(|| self.layout.native_resolution(band))
            .unwrap_or_else(|| Affine::from_gdal(reader.metadata.geotransform).pixel_size())
    }

    fn read_at(
        &self,
        band: &str,
        target_resolution: f64,
        upsample: ResampleAlg,
        downsample: ResampleAlg,
    ) -> Result<Array2<f32>> {
        let location = self.resolve_band_location(band)?;
        let reader = GdalBandReader::open(&location.path)?;
        let native = self.native_resolution_of(band, &location, &reader);
        if (native - target_resolution).abs() < 1e-9 {
            return Ok(reader.read_band::<f32>(location.band_index)?);
        }
        if native > target_resolution {
            read_upsampled(&reader, &location, native, target_resolution, upsample)
        } else {
            read_downsampled(&reader, &location, native, target_resolution, downsample)
        }
    }
}

fn check_resolutions(native_resolution: f64, target_resolution: f64) -> Result<()> {
    if !(target_resolution > 0.0) || !(native_resolution > 0.0) {
        return Err(Error::InvalidArgument {
            arg: "resolution",
            value: format!("{} -> {}", native_resolution, target_resolution),
        });
    }
    Ok(())
}

fn read_upsampled(
    reader: &GdalBandReader,
    location: &BandLocation,
    native_resolution: f64,
    target_resolution: f64,
    alg: ResampleAlg,
) -> Result<Array2<f32>> {
    check_resolutions(native_resolution, target_resolution)?;
    let upscale_factor = native_resolution / target_resolution;
    if upscale_factor < 1.0 {
        return Err(Error::InvalidArgument {
            arg: "target_resolution",
            value: format!(
                "{} is coarser than native {}; only upsampling is supported",
                target_resolution, native_resolution
            ),
        });
    }
    let shape = upscaled_shape(
        reader.metadata.size_y,
        reader.metadata.size_x,
        upscale_factor,
    );
    debug!(
        "Resampling {:?} by {} to {}x{}",
        location.path, upscale_factor, shape.0, shape.1
    );
    Ok(reader.read_band_resampled::<f32>(location.band_index, shape, alg)?)
}

/// Finer band onto a coarser grid; the output shape truncates like [`upscaled_shape`]
fn read_downsampled(
    reader: &GdalBandReader,
    location: &BandLocation,
    native_resolution: f64,
    target_resolution: f64,
    alg: ResampleAlg,
) -> Result<Array2<f32>> {
    check_resolutions(native_resolution, target_resolution)?;
    let factor = native_resolution / target_resolution;
    let shape = upscaled_shape(reader.metadata.size_y, reader.metadata.size_x, factor);
    if shape.0 == 0 || shape.1 == 0 {
        return Err(Error::InvalidArgument {
            arg: "target_resolution",
            value: format!(
                "{} leaves no pixel of {:?} at native {}",
                target_resolution, location.path, native_resolution
            ),
        });
    }
    debug!(
        "Downsampling {:?} by {} to {}x{}",
        location.path, factor, shape.0, shape.1
    );
    Ok(reader.read_band_resampled::<f32>(location.band_index, shape, alg)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn s2_layout(target: u32) -> Sentinel2Layout {
        Sentinel2Layout {
            target_tier: target,
            fallback_tier: 20,
            fine_tier: 10,
            fine_fallback_bands: vec!["B08".into()],
            reference_band: "B04".into(),
            native_resolutions: BTreeMap::new(),
        }
    }

    #[test]
    fn sentinel2_prefers_target_tier_then_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path();
        touch(&img.join("R10m/T35VLG_20200615T094041_B04_10m.jp2"));
        touch(&img.join("R20m/T35VLG_20200615T094041_B04_20m.jp2"));
        touch(&img.join("R20m/T35VLG_20200615T094041_B11_20m.jp2"));
        touch(&img.join("R10m/T35VLG_20200615T094041_B08_10m.jp2"));

        let layout = s2_layout(10);
        let b04 = layout.resolve_band_location(img, "B04").unwrap();
        assert!(b04.path.ends_with("R10m/T35VLG_20200615T094041_B04_10m.jp2"));
        assert_eq!(b04.native_resolution, Some(10.0));

        let b11 = layout.resolve_band_location(img, "B11").unwrap();
        assert!(b11.path.ends_with("R20m/T35VLG_20200615T094041_B11_20m.jp2"));
        assert_eq!(b11.native_resolution, Some(20.0));

        // B08 only exists at 10 m and falls back to the finer tier
        let coarse = s2_layout(20);
        let b08 = coarse.resolve_band_location(img, "B08").unwrap();
        assert_eq!(b08.native_resolution, Some(10.0));
    }

    #[test]
    fn sentinel2_missing_band_is_band_not_found() {
        let dir = tempfile::tempdir().unwrap();
        touch(&dir.path().join("R10m/T35VLG_B04_10m.jp2"));
        let err = s2_layout(10)
            .resolve_band_location(dir.path(), "B05")
            .unwrap_err();
        assert!(matches!(err, Error::BandNotFound { ref band, .. } if band == "B05"));
    }

    #[test]
    fn flat_layout_matches_band_suffix_only() {
        let dir = tempfile::tempdir().unwrap();
        let scene = dir.path();
        touch(&scene.join("LC08_L2SP_188018_20200615_20200823_02_T1_SR_B1.TIF"));
        touch(&scene.join("LC08_L2SP_188018_20200615_20200823_02_T1_ST_B10.TIF"));
        touch(&scene.join("LC08_L2SP_188018_20200615_20200823_02_T1_QA_PIXEL.TIF"));
        let layout = FlatDirectoryLayout {
            reference_band: "B4".into(),
            native_resolutions: BTreeMap::new(),
            default_resolution: Some(30.0),
        };
        let b1 = layout.resolve_band_location(scene, "B1").unwrap();
        assert!(b1.path.to_string_lossy().ends_with("SR_B1.TIF"));
        let qa = layout.resolve_band_location(scene, "QA_PIXEL").unwrap();
        assert!(qa.path.to_string_lossy().ends_with("QA_PIXEL.TIF"));
        assert!(layout.resolve_band_location(scene, "B4").is_err());
        assert_eq!(layout.native_resolution("B4"), Some(30.0));
    }

    #[test]
    fn single_file_layout_requires_tiff_path() {
        let dir = tempfile::tempdir().unwrap();
        let tif = dir.path().join("field_20200615.tif");
        let png = dir.path().join("field_20200615.png");
        touch(&tif);
        touch(&png);
        let mut indices = BTreeMap::new();
        indices.insert("nir".to_string(), 4);
        let layout = SingleFileLayout {
            reference_band: "B1".into(),
            band_indices: indices,
            native_resolutions: BTreeMap::new(),
        };
        assert_eq!(layout.resolve_band_location(&tif, "B3").unwrap().band_index, 3);
        assert_eq!(layout.resolve_band_location(&tif, "nir").unwrap().band_index, 4);
        assert_eq!(layout.resolve_band_location(&tif, "red").unwrap().band_index, 1);
        assert!(matches!(
            layout.resolve_band_location(&png, "B1"),
            Err(Error::BandNotFound { .. })
        ));
    }

    #[test]
    fn upscaled_shape_truncates() {
        assert_eq!(upscaled_shape(5490, 5490, 2.0), (10980, 10980));
        assert_eq!(upscaled_shape(3, 5, 1.5), (4, 7));
        assert_eq!(upscaled_shape(7, 7, 20.0 / 15.0), (9, 9));
    }
}
