use std::fs::File;
use std::sync::Mutex;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use eozonal::api::run_extraction_with_cancel;
use eozonal::core::config::{CloudMaskSource, RunConfig};
use eozonal::core::params::{DateRange, ExtractionParams, InputSource};
use eozonal::core::pipeline::{CancellationToken, TileOutcome};
use eozonal::io::pathfinder::parse_date;
use eozonal::types::Statistic;

use super::args::CliArgs;
use super::errors::AppError;

fn init_logging(args: &CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    let default_level = if args.log { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    match &args.log_file {
        Some(path) => {
            let file = File::create(path)?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stderr.and(Mutex::new(file)))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

fn build_params(args: &CliArgs) -> Result<ExtractionParams, AppError> {
    let input = match (&args.rasterdir, &args.rasterfile) {
        (Some(dir), _) => InputSource::Directory(dir.clone()),
        (None, Some(file)) => InputSource::File(file.clone()),
        (None, None) => {
            return Err(AppError::MissingArgument {
                arg: "--rasterdir or --rasterfile".to_string(),
            });
        }
    };
    let statistics = args
        .statistics
        .iter()
        .map(|s| s.parse::<Statistic>())
        .collect::<Result<Vec<_>, _>>()?;
    let start = parse_date(&args.start)?;
    let end = match &args.end {
        Some(end) => parse_date(end)?,
        None => chrono::Local::now().date_naive(),
    };
    Ok(ExtractionParams {
        platform: args.platform,
        input,
        vector: args.vector.clone(),
        vector_layer: args.vector_layer.clone(),
        id_field: args.id.clone(),
        output_dir: args.out.clone(),
        indices: args.index.clone(),
        statistics,
        dates: DateRange::new(start, end)?,
        modes: args.mode.clone(),
        exclude_border: args.exclude_border,
        jobs: args.jobs,
    })
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    init_logging(&args)?;

    let params = build_params(&args)?;
    let mut config = RunConfig::from_path(args.platform, args.config.as_deref())?;
    if let Some(base) = &args.external_cloudmask {
        info!("Using external cloud masks {:?}_<tile>_<date>.tif", base);
        config.platform.cloud_mask = CloudMaskSource::External { base: base.clone() };
    }

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        warn!("Interrupt received, finishing running tiles");
        handler_token.cancel();
    })?;

    info!("Output directory: {:?}", params.output_dir);
    let report = run_extraction_with_cancel(&params, &config, cancel.clone())?;

    for tile in &report.tiles {
        if let TileOutcome::Failed(reason) = &tile.outcome {
            warn!("Failed: {:?}: {}", tile.path, reason);
        }
    }
    info!("Extraction complete!");
    info!("Processed: {}", report.processed());
    info!("Skipped: {}", report.skipped());
    info!("Failed: {}", report.failed());
    info!("Warnings: {}", report.warnings());
    info!("Artifacts: {}", report.artifacts().count());

    if cancel.is_cancelled() {
        return Err(AppError::Cancelled.into());
    }
    Ok(())
}
