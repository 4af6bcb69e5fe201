//! Tile identity from file-system paths: tile id, acquisition date and the directory that
//! holds the band files, for each platform's product naming.
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex::Regex;
use tracing::debug;

use crate::core::pipeline::collaborators::TileIdentifier;
use crate::error::{Error, Result};
use crate::types::{Platform, TileIdentity};

/// Parse a `YYYYMMDD` calendar date
pub fn parse_date(value: &str) -> Result<NaiveDate> {
    if value.len() != 8 || !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::InvalidDate {
            value: value.to_string(),
        });
    }
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| Error::InvalidDate {
        value: value.to_string(),
    })
}

fn file_name(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| Error::Processing(format!("Path has no file name: {:?}", path)))
}

static SENTINEL2_NAME: OnceCell<Regex> = OnceCell::new();
static LANDSAT_NAME: OnceCell<Regex> = OnceCell::new();
static GENERIC_DATE: OnceCell<Regex> = OnceCell::new();

/// Compile `pattern` on first use
fn name_regex(cell: &'static OnceCell<Regex>, pattern: &str) -> Result<&'static Regex> {
    cell.get_or_try_init(|| {
        Regex::new(pattern)
            .map_err(|e| Error::Config(format!("name pattern {:?}: {}", pattern, e)))
    })
}

/// `S2A_MSIL2A_20200615T094041_N0214_R036_T35VLG_20200615T121314.SAFE` -> ("35VLG", "20200615")
pub fn parse_sentinel2_name(name: &str) -> Result<(String, String)> {
    let re = name_regex(
        &SENTINEL2_NAME,
        r"^S2[A-D]_MSI[A-Z0-9]{3}_([^_]{8})T[^_]*_N[^_]+_R[^_]+_T([^_]+)_",
    )?;
    let caps = re.captures(name).ok_or_else(|| {
        Error::Processing(format!("Not a Sentinel-2 product name: {}", name))
    })?;
    Ok((caps[2].to_string(), caps[1].to_string()))
}

/// `LC08_L2SP_188018_20200615_20200823_02_T1` -> ("188018", "20200615")
pub fn parse_landsat_name(name: &str) -> Result<(String, String)> {
    let re = name_regex(&LANDSAT_NAME, r"^L[COTEM]\d{2}_[A-Z0-9]{4}_([^_]+)_([^_]+)")?;
    let caps = re
        .captures(name)
        .ok_or_else(|| Error::Processing(format!("Not a Landsat product name: {}", name)))?;
    Ok((caps[1].to_string(), caps[2].to_string()))
}

/// `field_block7_20200615.tif` -> ("field_block7", "20200615"); the first standalone run of
/// eight digits is the date and the text before it the tile id
pub fn parse_generic_name(name: &str) -> Result<(String, String)> {
    let stem = Path::new(name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| name.to_string());
    let re = name_regex(&GENERIC_DATE, r"(?:^|\D)(\d{8})(?:\D|$)")?;
    let date = re
        .captures(&stem)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| Error::InvalidDate {
            value: stem.clone(),
        })?;
    let tile = stem[..date.start()].trim_end_matches(['_', '-', '.']);
    let tile = if tile.is_empty() { stem.as_str() } else { tile };
    Ok((tile.to_string(), date.as_str().to_string()))
}

/// Resolves tile identity for one platform's naming convention
#[derive(Debug, Clone, Copy)]
pub struct Pathfinder {
    pub platform: Platform,
}

impl Pathfinder {
    pub fn new(platform: Platform) -> Self {
        Self { platform }
    }

    /// `GRANULE/<granule>/IMG_DATA` inside a SAFE directory
    fn sentinel2_image_path(safe: &Path) -> Result<PathBuf> {
        let granule_root = safe.join("GRANULE");
        let mut granules: Vec<PathBuf> = fs::read_dir(&granule_root)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.is_dir())
            .collect();
        granules.sort();
        let granule = granules.into_iter().next().ok_or_else(|| Error::BandNotFound {
            band: "IMG_DATA".to_string(),
            location: granule_root.clone(),
        })?;
        Ok(granule.join("IMG_DATA"))
    }
}

impl TileIdentifier for Pathfinder {
    fn identify(&self, path: &Path) -> Result<TileIdentity> {
        let name = file_name(path)?;
        let (tile_id, date, image_path) = match self.platform {
            Platform::S2 => {
                let (tile, date) = parse_sentinel2_name(&name)?;
                (tile, date, Self::sentinel2_image_path(path)?)
            }
            Platform::Ls8 => {
                let (tile, date) = parse_landsat_name(&name)?;
                (tile, date, path.to_path_buf())
            }
            Platform::Tif => {
                let (tile, date) = parse_generic_name(&name)?;
                (tile, date, path.to_path_buf())
            }
        };
        let date = parse_date(&date)?;
        debug!("Identified {:?} as tile {} on {}", path, tile_id, date);
        Ok(TileIdentity {
            path: path.to_path_buf(),
            tile_id,
            date,
            image_path,
        })
    }
}
