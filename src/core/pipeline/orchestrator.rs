//! Drives tiles through identification, the date gate, the cloud/data-coverage gate and
//! per-token extraction, collecting one [`TileReport`] per tile.
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use ndarray::Array2;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use regex::Regex;
use tracing::{debug, error, info, info_span, warn};

use crate::core::params::{ExtractionParams, InputSource};
use crate::core::pipeline::cancel::CancellationToken;
use crate::core::pipeline::collaborators::{
    ArtifactKey, ArtifactWriter, TileIdentifier, TileReader, ZoneProvider,
};
use crate::core::pipeline::discovery::discover_tiles;
use crate::core::pipeline::dispatch::{TokenRoute, classify_token};
use crate::core::processing::extract::{Zone, extract_arrays, extract_statistics};
use crate::core::processing::validator::validate_coverage;
use crate::error::{Error, Result};
use crate::types::{Affine, ExtractionMode, Statistic, TileIdentity};

/// Final state of one tile
#[derive(Debug, Clone, PartialEq)]
pub enum TileOutcome {
    /// Every supported token was extracted and written
    Processed,
    /// Acquisition date outside the requested range
    SkippedDate,
    /// Cloud cover too high or no valid data under the zones
    SkippedQuality,
    Failed(String),
    Cancelled,
}

/// What happened to one tile
#[derive(Debug, Clone)]
pub struct TileReport {
    pub path: PathBuf,
    pub tile_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub outcome: TileOutcome,
    pub artifacts: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl TileReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            tile_id: None,
            date: None,
            outcome: TileOutcome::Processed,
            artifacts: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }
}

/// Run summary, tiles in discovery order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub tiles: Vec<TileReport>,
}

impl RunReport {
    fn count(&self, pred: impl Fn(&TileOutcome) -> bool) -> usize {
        self.tiles.iter().filter(|t| pred(&t.outcome)).count()
    }

    pub fn processed(&self) -> usize {
        self.count(|o| matches!(o, TileOutcome::Processed))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, TileOutcome::SkippedDate | TileOutcome::SkippedQuality))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, TileOutcome::Failed(_)))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, TileOutcome::Cancelled))
    }

    pub fn artifacts(&self) -> impl Iterator<Item = &PathBuf> {
        self.tiles.iter().flat_map(|t| t.artifacts.iter())
    }

    pub fn warnings(&self) -> usize {
        self.tiles.iter().map(|t| t.warnings.len()).sum()
    }
}

/// Components the orchestrator drives
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub identifier: &'a dyn TileIdentifier,
    pub reader: &'a dyn TileReader,
    pub zones: &'a dyn ZoneProvider,
    pub writer: &'a dyn ArtifactWriter,
}

pub struct Orchestrator<'a> {
    params: &'a ExtractionParams,
    statistics: Vec<Statistic>,
    modes: Vec<ExtractionMode>,
    max_cloud_cover: f64,
    raw_bands: Regex,
    parts: Collaborators<'a>,
    cancel: CancellationToken,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        params: &'a ExtractionParams,
        max_cloud_cover: f64,
        raw_bands: Regex,
        parts: Collaborators<'a>,
    ) -> Self {
        Self {
            params,
            statistics: params.effective_statistics(),
            modes: params.effective_modes(),
            max_cloud_cover,
            raw_bands,
            parts,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Discover tiles and process them over a pool of `params.jobs` threads
    pub fn run(&self, source: &InputSource, file_pattern: &Regex) -> Result<RunReport> {
        let paths = discover_tiles(source, file_pattern)?;
        info!("Found {} tile(s) to process", paths.len());
        self.run_paths(&paths)
    }

    /// Process the given tiles; reports keep the order of `paths`
    pub fn run_paths(&self, paths: &[PathBuf]) -> Result<RunReport> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(self.params.jobs.unwrap_or(0))
            .build()
            .map_err(Error::external)?;
        let tiles = pool.install(|| {
            paths
                .par_iter()
                .map(|path| self.process_tile(path))
                .collect::<Vec<_>>()
        });
        let report = RunReport { tiles };
        info!(
            "Run finished: processed={} skipped={} failed={} cancelled={}",
            report.processed(),
            report.skipped(),
            report.failed(),
            report.cancelled()
        );
        Ok(report)
    }

    /// Run one tile through the gates and extraction; never panics on tile errors
    pub fn process_tile(&self, path: &Path) -> TileReport {
        let mut report = TileReport::new(path);
        if self.cancel.is_cancelled() {
            report.outcome = TileOutcome::Cancelled;
            return report;
        }

        let tile = match self.parts.identifier.identify(path) {
            Ok(tile) => tile,
            Err(e) => {
                error!("Cannot identify {:?}: {}", path, e);
                report.outcome = TileOutcome::Failed(e.to_string());
                return report;
            }
        };
        report.tile_id = Some(tile.tile_id.clone());
        report.date = Some(tile.date);

        let span = info_span!("tile", id = %tile.tile_id, date = %tile.date.format("%Y%m%d"));
        let _enter = span.enter();

        if !self.params.dates.contains(tile.date) {
            debug!("Outside {} ..= {}, skipping", self.params.dates.start, self.params.dates.end);
            report.outcome = TileOutcome::SkippedDate;
            return report;
        }

        match self.extract_tile(&tile, &mut report) {
            Ok(outcome) => report.outcome = outcome,
            Err(Error::Cancelled) => {
                info!("Cancelled");
                report.outcome = TileOutcome::Cancelled;
            }
            Err(e) => {
                error!("Tile failed: {}", e);
                report.outcome = TileOutcome::Failed(e.to_string());
            }
        }
        report
    }

    fn extract_tile(&self, tile: &TileIdentity, report: &mut TileReport) -> Result<TileOutcome> {
        let access = self.parts.reader.open(tile)?;
        let mask = access.cloud_mask()?;
        let epsg = access.epsg()?;
        let zones = self.parts.zones.zones(&tile.tile_id, epsg)?;
        let affine = access.affine()?;

        let cloud_cover = access.cloud_cover(&mask)?;
        let reference = access.reference_band()?;
        let validity = validate_coverage(
            cloud_cover,
            self.max_cloud_cover,
            &zones,
            &reference,
            &affine,
            access.nodata(),
        );
        if !validity.is_valid() {
            let reason = validity.reason(cloud_cover, self.max_cloud_cover);
            report.warn(format!("Skipping tile {}: {}", tile.tile_id, reason));
            return Ok(TileOutcome::SkippedQuality);
        }
        debug!("Cloud cover {:.1}%, {} zone(s)", cloud_cover, zones.len());

        let supported = access.supported_indices();
        for token in &self.params.indices {
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            let array = match classify_token(token, &supported, &self.raw_bands) {
                TokenRoute::Index => access.calculate_index(token)?,
                TokenRoute::RawBand => access.band(token)?,
                TokenRoute::Unsupported => {
                    report.warn(format!(
                        "{} is neither a supported index nor a raw band, skipping",
                        token
                    ));
                    continue;
                }
            };
            let key = ArtifactKey::new(tile, token);
            for mode in &self.modes {
                let written = self.write(*mode, &key, &mask, &array, &zones, &affine, epsg)?;
                info!("{} ({}): {} artifact(s)", token, mode, written.len());
                report.artifacts.extend(written);
            }
        }
        Ok(TileOutcome::Processed)
    }

    #[allow(clippy::too_many_arguments)]
    fn write(
        &self,
        mode: ExtractionMode,
        key: &ArtifactKey,
        mask: &Array2<bool>,
        array: &Array2<f32>,
        zones: &[Zone],
        affine: &Affine,
        epsg: Option<u32>,
    ) -> Result<Vec<PathBuf>> {
        let writer = self.parts.writer;
        let border = self.params.exclude_border;
        match mode {
            ExtractionMode::Statistics => {
                let stats = &self.statistics;
                let rows = extract_statistics(mask, array, zones, affine, stats, border);
                Ok(vec![writer.write_statistics(key, stats, &rows)?])
            }
            ExtractionMode::RawArray => {
                let arrays = extract_arrays(mask, array, zones, affine, border);
                Ok(vec![writer.write_arrays(key, &arrays)?])
            }
            ExtractionMode::Geotiff => {
                let arrays = extract_arrays(mask, array, zones, affine, border);
                writer.write_geotiffs(key, &arrays, epsg)
            }
        }
    }
}
