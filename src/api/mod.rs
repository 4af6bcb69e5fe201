//! High-level library API: run a full extraction from parameters and a run configuration,
//! with the GDAL-backed tile reader, OGR zones and file writers wired in. Prefer these
//! entrypoints over assembling the pipeline by hand.
use std::path::Path;

use tracing::info;

use crate::core::config::RunConfig;
use crate::core::params::ExtractionParams;
use crate::core::pipeline::{CancellationToken, Collaborators, Orchestrator, RunReport};
use crate::error::{Error, Result};
use crate::io::{FileWriter, GdalTileReader, Pathfinder, VectorZones};

/// Run an extraction to completion
pub fn run_extraction(params: &ExtractionParams, config: &RunConfig) -> Result<RunReport> {
    run_extraction_with_cancel(params, config, CancellationToken::new())
}

/// Run an extraction that stops picking up tiles and indices once `cancel` is set
pub fn run_extraction_with_cancel(
    params: &ExtractionParams,
    config: &RunConfig,
    cancel: CancellationToken,
) -> Result<RunReport> {
    params.validate()?;
    config.validate()?;
    if config.platform.platform != params.platform {
        return Err(Error::Config(format!(
            "configuration is for {} but the run is for {}",
            config.platform.platform, params.platform
        )));
    }
    info!(
        "Extracting {:?} for platform {} at {} m, max cloud cover {}%",
        params.indices, params.platform, config.resolution, config.max_cloud_cover
    );
    if params.exclude_border {
        info!("Pixels on zone borders are excluded");
    }

    let identifier = Pathfinder::new(params.platform);
    let reader = GdalTileReader::new(config.platform.clone(), config.resolution);
    let zones = VectorZones::new(&params.vector, params.id_field.clone())
        .with_layer(params.vector_layer.clone());
    let writer = FileWriter::new(&params.output_dir)?;

    let orchestrator = Orchestrator::new(
        params,
        config.max_cloud_cover,
        config.platform.raw_band_regex()?,
        Collaborators {
            identifier: &identifier,
            reader: &reader,
            zones: &zones,
            writer: &writer,
        },
    )
    .with_cancellation(cancel);
    orchestrator.run(&params.input, &config.platform.file_regex()?)
}

/// Load the run configuration for `params.platform` (builtin when `path` is None) and run
pub fn run_extraction_from_config_file(
    params: &ExtractionParams,
    path: Option<&Path>,
) -> Result<RunReport> {
    let config = RunConfig::from_path(params.platform, path)?;
    run_extraction(params, &config)
}
