//! Platform conventions and run configuration.
//!
//! Each platform ships a builtin [`PlatformConfig`]; a TOML file may override any of its
//! fields through a `[platform]` table and sets the run-wide `resolution` and
//! `maxcloudcover`:
//!
//! ```toml
//! resolution = 10
//! maxcloudcover = 80
//!
//! [platform]
//! reference_band = "B04"
//!
//! [platform.cloud_mask]
//! kind = "scene_classification"
//! band = "SCL"
//! classes = [3, 8, 9, 10]
//! ```
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::types::Platform;

/// Band names that play a role in index formulas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandRoles {
    pub blue: Option<String>,
    pub green: Option<String>,
    pub red: Option<String>,
    pub rededge1: Option<String>,
    pub nir: Option<String>,
    pub swir1: Option<String>,
    pub swir2: Option<String>,
}

/// How cloudy pixels are flagged for a platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloudMaskSource {
    /// A class raster (e.g. Sentinel-2 SCL) where listed classes are cloudy
    SceneClassification { band: String, classes: Vec<u16> },
    /// A bit-packed QA raster (e.g. Landsat QA_PIXEL) where any listed bit set is cloudy
    QualityBits { band: String, bits: Vec<u8> },
    /// Per-tile mask rasters `{base}_{tile}_{YYYYMMDD}.tif` on the tile's extent; any
    /// non-zero value is cloudy
    External { base: PathBuf },
    /// No cloud information; every pixel is clear
    None,
}

/// Layout and band conventions of one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformConfig {
    pub platform: Platform,
    /// Regex matched against entry names when scanning the input directory
    pub file_pattern: String,
    /// Regex identifying raw band tokens (requested without index computation)
    pub raw_band_pattern: String,
    /// Band read once per tile for CRS and transform
    pub reference_band: String,
    pub bands: BandRoles,
    /// Native pixel size per band, in map units
    pub native_resolutions: BTreeMap<String, f64>,
    /// Default target resolution when the run config gives none
    pub default_resolution: f64,
    /// Resolution directory used when a band is missing at the target tier
    pub fallback_tier: u32,
    /// Bands that fall back to `fine_tier` instead of `fallback_tier`
    pub fine_fallback_bands: Vec<String>,
    pub fine_tier: u32,
    /// 1-based band indices for single-file rasters
    pub band_indices: BTreeMap<String, usize>,
    pub cloud_mask: CloudMaskSource,
    /// Divisor turning digital numbers into reflectance for index formulas
    pub quantification_value: f32,
    /// Value marking pixels without data in the reference band
    pub nodata: f32,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self::builtin(Platform::Tif)
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn resolutions(list: &[(&str, f64)]) -> BTreeMap<String, f64> {
    list.iter().map(|(b, r)| (b.to_string(), *r)).collect()
}

impl PlatformConfig {
    /// Builtin conventions for each supported platform
    pub fn builtin(platform: Platform) -> Self {
        match platform {
            Platform::S2 => Self {
                platform,
                file_pattern: r"^S2[AB]_MSIL2A_.*\.SAFE$".into(),
                raw_band_pattern: r"^(B[0-1]\d|B8A)$".into(),
                reference_band: "B04".into(),
                bands: BandRoles {
                    blue: Some("B02".into()),
                    green: Some("B03".into()),
                    red: Some("B04".into()),
                    rededge1: Some("B05".into()),
                    nir: Some("B08".into()),
                    swir1: Some("B11".into()),
                    swir2: Some("B12".into()),
                },
                native_resolutions: resolutions(&[
                    ("B01", 60.0),
                    ("B02", 10.0),
                    ("B03", 10.0),
                    ("B04", 10.0),
                    ("B05", 20.0),
                    ("B06", 20.0),
                    ("B07", 20.0),
                    ("B08", 10.0),
                    ("B8A", 20.0),
                    ("B09", 60.0),
                    ("B11", 20.0),
                    ("B12", 20.0),
                    ("SCL", 20.0),
                ]),
                default_resolution: 10.0,
                fallback_tier: 20,
                fine_fallback_bands: names(&["B08"]),
                fine_tier: 10,
                band_indices: BTreeMap::new(),
                cloud_mask: CloudMaskSource::SceneClassification {
                    band: "SCL".into(),
                    classes: vec![3, 8, 9, 10],
                },
                quantification_value: 10000.0,
                nodata: 0.0,
            },
            Platform::Ls8 => Self {
                platform,
                file_pattern: r"^LC0[89]_L[12][A-Z]{2}_\d{6}_\d{8}_\d{8}_\d{2}_[A-Z0-9]{2}$".into(),
                raw_band_pattern: r"^B([1-9]|1[01])$".into(),
                reference_band: "B4".into(),
                bands: BandRoles {
                    blue: Some("B2".into()),
                    green: Some("B3".into()),
                    red: Some("B4".into()),
                    rededge1: None,
                    nir: Some("B5".into()),
                    swir1: Some("B6".into()),
                    swir2: Some("B7".into()),
                },
                native_resolutions: resolutions(&[("B8", 15.0)]),
                default_resolution: 30.0,
                fallback_tier: 30,
                fine_fallback_bands: Vec::new(),
                fine_tier: 30,
                band_indices: BTreeMap::new(),
                cloud_mask: CloudMaskSource::QualityBits {
                    band: "QA_PIXEL".into(),
                    bits: vec![1, 2, 3, 4],
                },
                quantification_value: 1.0,
                nodata: 0.0,
            },
            Platform::Tif => Self {
                platform,
                file_pattern: r"(?i)\.tiff?$".into(),
                raw_band_pattern: r"^B\d{1,2}$".into(),
                reference_band: "B1".into(),
                bands: BandRoles {
                    blue: Some("B1".into()),
                    green: Some("B2".into()),
                    red: Some("B3".into()),
                    rededge1: None,
                    nir: Some("B4".into()),
                    swir1: None,
                    swir2: None,
                },
                native_resolutions: BTreeMap::new(),
                default_resolution: 10.0,
                fallback_tier: 0,
                fine_fallback_bands: Vec::new(),
                fine_tier: 0,
                band_indices: BTreeMap::new(),
                cloud_mask: CloudMaskSource::None,
                quantification_value: 1.0,
                nodata: 0.0,
            },
        }
    }

    pub fn file_regex(&self) -> Result<Regex> {
        Regex::new(&self.file_pattern)
            .map_err(|e| Error::Config(format!("file_pattern {:?}: {}", self.file_pattern, e)))
    }

    pub fn raw_band_regex(&self) -> Result<Regex> {
        Regex::new(&self.raw_band_pattern).map_err(|e| {
            Error::Config(format!("raw_band_pattern {:?}: {}", self.raw_band_pattern, e))
        })
    }

    /// Reject conventions that cannot serve a run
    pub fn validate(&self) -> Result<()> {
        if self.reference_band.trim().is_empty() {
            return Err(Error::Config("reference_band is empty".into()));
        }
        if self.quantification_value <= 0.0 {
            return Err(Error::Config(format!(
                "quantification_value must be positive, got {}",
                self.quantification_value
            )));
        }
        if let Some((band, res)) = self.native_resolutions.iter().find(|(_, r)| **r <= 0.0) {
            return Err(Error::Config(format!(
                "native resolution of {} must be positive, got {}",
                band, res
            )));
        }
        self.file_regex()?;
        self.raw_band_regex()?;
        Ok(())
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawRunConfig {
    resolution: Option<f64>,
    maxcloudcover: Option<f64>,
    platform: Option<toml::Value>,
}

/// Run-wide configuration: target resolution, cloud-cover threshold and platform convention
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    pub resolution: f64,
    pub max_cloud_cover: f64,
    pub platform: PlatformConfig,
}

impl RunConfig {
    /// Builtin configuration for a platform
    pub fn builtin(platform: Platform) -> Self {
        let platform = PlatformConfig::builtin(platform);
        Self {
            resolution: platform.default_resolution,
            max_cloud_cover: 100.0,
            platform,
        }
    }

    /// Parse TOML configuration text on top of the builtin platform convention
    pub fn from_toml_str(platform: Platform, text: &str) -> Result<Self> {
        let raw: RawRunConfig = toml::from_str(text)?;
        let mut config = Self::builtin(platform);
        if let Some(overrides) = raw.platform {
            // Merge overrides onto the builtin table so partial tables keep builtin values
            let builtin = toml::Value::try_from(&config.platform)
                .map_err(|e| Error::Config(e.to_string()))?;
            let merged = merge_tables(builtin, overrides);
            config.platform = merged.try_into()?;
            config.platform.platform = platform;
        }
        if let Some(resolution) = raw.resolution {
            config.resolution = resolution;
        } else {
            config.resolution = config.platform.default_resolution;
        }
        if let Some(max) = raw.maxcloudcover {
            config.max_cloud_cover = max;
        }
        config.validate()?;
        Ok(config)
    }

    /// Load a TOML config file; a missing path yields the builtin configuration
    pub fn from_path(platform: Platform, path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                let text = std::fs::read_to_string(path)?;
                Self::from_toml_str(platform, &text)
            }
            None => {
                let config = Self::builtin(platform);
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.resolution > 0.0) {
            return Err(Error::Config(format!(
                "resolution must be positive, got {}",
                self.resolution
            )));
        }
        if !(0.0..=100.0).contains(&self.max_cloud_cover) {
            return Err(Error::Config(format!(
                "maxcloudcover must be within 0..=100, got {}",
                self.max_cloud_cover
            )));
        }
        self.platform.validate()
    }
}

fn merge_tables(base: toml::Value, overrides: toml::Value) -> toml::Value {
    match (base, overrides) {
        (toml::Value::Table(mut base), toml::Value::Table(overrides)) => {
            for (key, value) in overrides {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_tables(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            toml::Value::Table(base)
        }
        (_, overrides) => overrides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_configs_validate() {
        for platform in [Platform::S2, Platform::Ls8, Platform::Tif] {
            RunConfig::builtin(platform).validate().unwrap();
        }
    }

    #[test]
    fn toml_overrides_keep_builtin_fields() {
        let text = r#"
            resolution = 20
            maxcloudcover = 80

            [platform]
            reference_band = "B8A"
            fine_fallback_bands = []
        "#;
        let config = RunConfig::from_toml_str(Platform::S2, text).unwrap();
        assert_eq!(config.resolution, 20.0);
        assert_eq!(config.max_cloud_cover, 80.0);
        assert_eq!(config.platform.reference_band, "B8A");
        assert!(config.platform.fine_fallback_bands.is_empty());
        assert_eq!(config.platform.bands.red.as_deref(), Some("B04"));
        assert_eq!(config.platform.fallback_tier, 20);
    }

    #[test]
    fn missing_resolution_uses_platform_default() {
        let config = RunConfig::from_toml_str(Platform::Ls8, "maxcloudcover = 50").unwrap();
        assert_eq!(config.resolution, 30.0);
    }

    #[test]
    fn external_cloud_mask_from_toml() {
        let text = r#"
            [platform.cloud_mask]
            kind = "external"
            base = "/masks/cloudmask"
        "#;
        let config = RunConfig::from_toml_str(Platform::S2, text).unwrap();
        assert_eq!(
            config.platform.cloud_mask,
            CloudMaskSource::External {
                base: PathBuf::from("/masks/cloudmask")
            }
        );
    }

    #[test]
    fn rejects_invalid_configuration() {
        assert!(RunConfig::from_toml_str(Platform::S2, "resolution = 0").is_err());
        assert!(RunConfig::from_toml_str(Platform::S2, "maxcloudcover = 120").is_err());
        let bad_pattern = "[platform]\nfile_pattern = \"(\"";
        assert!(matches!(
            RunConfig::from_toml_str(Platform::S2, bad_pattern),
            Err(Error::Config(_))
        ));
    }
}
