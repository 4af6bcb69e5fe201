//! Scene cloud cover from product metadata: Sentinel-2 `MTD_MSIL*.xml` and Landsat
//! `*_MTL.txt`.
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;
use tracing::debug;

use crate::error::Result;
use crate::types::Platform;

const S2_CLOUD_TAG: &str = "Cloud_Coverage_Assessment";
const LANDSAT_CLOUD_KEY: &str = "CLOUD_COVER";

fn parse_s2_cloud_cover<R: BufRead>(mut reader: Reader<R>) -> Result<Option<f64>> {
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut in_cloud_tag = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(ref e) => {
                in_cloud_tag = e.local_name().as_ref() == S2_CLOUD_TAG.as_bytes();
            }
            Event::End(_) => in_cloud_tag = false,
            Event::Text(e) if in_cloud_tag => {
                let txt = e.unescape()?;
                return Ok(txt.trim().parse().ok());
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(None)
}

/// `Cloud_Coverage_Assessment` from Sentinel-2 product metadata text
pub fn s2_cloud_cover_from_str(xml: &str) -> Result<Option<f64>> {
    parse_s2_cloud_cover(Reader::from_str(xml))
}

/// `CLOUD_COVER = ...` from Landsat MTL text; `CLOUD_COVER_LAND` is ignored
pub fn landsat_cloud_cover_from_str(mtl: &str) -> Option<f64> {
    mtl.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        if key.trim() != LANDSAT_CLOUD_KEY {
            return None;
        }
        value.trim().trim_matches('"').parse().ok()
    })
}

fn find_entry(dir: &Path, matches: impl Fn(&str) -> bool) -> Option<PathBuf> {
    let mut found: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .map(|n| matches(&n.to_string_lossy()))
                    .unwrap_or(false)
        })
        .collect();
    found.sort();
    found.into_iter().next()
}

/// Cloud cover in percent recorded in a tile's product metadata, if any
pub fn read_cloud_cover(platform: Platform, tile_path: &Path) -> Result<Option<f64>> {
    let cover = match platform {
        Platform::S2 => {
            let is_mtd = |n: &str| n.starts_with("MTD_MSIL") && n.ends_with(".xml");
            let Some(mtd) = find_entry(tile_path, is_mtd) else {
                return Ok(None);
            };
            debug!("Reading cloud cover from {:?}", mtd);
            parse_s2_cloud_cover(Reader::from_file(&mtd)?)?
        }
        Platform::Ls8 => {
            let Some(mtl) = find_entry(tile_path, |n| n.to_ascii_uppercase().ends_with("_MTL.TXT"))
            else {
                return Ok(None);
            };
            debug!("Reading cloud cover from {:?}", mtl);
            landsat_cloud_cover_from_str(&fs::read_to_string(&mtl)?)
        }
        Platform::Tif => None,
    };
    Ok(cover)
}
