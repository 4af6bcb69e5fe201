use std::fs;
use std::path::PathBuf;

use regex::Regex;
use tracing::debug;

use crate::core::params::InputSource;
use crate::error::{Error, Result};

/// Tiles to process, in file-name order. A directory yields its entries whose name matches
/// `pattern`; an explicit file yields itself.
pub fn discover_tiles(source: &InputSource, pattern: &Regex) -> Result<Vec<PathBuf>> {
    match source {
        InputSource::File(path) => {
            if !path.exists() {
                return Err(Error::InvalidArgument {
                    arg: "rasterfile",
                    value: path.display().to_string(),
                });
            }
            Ok(vec![path.clone()])
        }
        InputSource::Directory(dir) => {
            let mut tiles = Vec::new();
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                let matches = path
                    .file_name()
                    .map(|name| pattern.is_match(&name.to_string_lossy()))
                    .unwrap_or(false);
                if matches {
                    tiles.push(path);
                } else {
                    debug!("Ignoring {:?}", path);
                }
            }
            tiles.sort();
            Ok(tiles)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_matching_entries_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b_20200702.tif", "a_20200615.tif", "notes.txt", "c_20200801.TIFF"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let pattern = Regex::new(r"(?i)\.tiff?$").unwrap();
        let source = InputSource::Directory(dir.path().to_path_buf());
        let tiles = discover_tiles(&source, &pattern).unwrap();
        let names: Vec<_> = tiles
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a_20200615.tif", "b_20200702.tif", "c_20200801.TIFF"]);
    }

    #[test]
    fn explicit_file_is_the_only_tile() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("scene.tif");
        fs::write(&file, b"").unwrap();
        let pattern = Regex::new("^never$").unwrap();
        assert_eq!(
            discover_tiles(&InputSource::File(file.clone()), &pattern).unwrap(),
            vec![file]
        );
        let missing = InputSource::File(dir.path().join("missing.tif"));
        assert!(discover_tiles(&missing, &pattern).is_err());
    }
}
