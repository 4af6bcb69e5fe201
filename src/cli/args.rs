use clap::Parser;
use std::path::PathBuf;

use eozonal::types::{ExtractionMode, Platform};

#[derive(Parser)]
#[command(
    name = "eozonal",
    version,
    about = "Per-zone index and band extraction from satellite tiles"
)]
pub struct CliArgs {
    /// Platform of the input tiles
    #[arg(long, value_enum)]
    pub platform: Platform,

    /// Directory scanned for tiles (batch mode)
    #[arg(long, conflicts_with = "rasterfile")]
    pub rasterdir: Option<PathBuf>,

    /// A single tile (SAFE directory, scene directory or GeoTIFF)
    #[arg(long)]
    pub rasterfile: Option<PathBuf>,

    /// Zone file; `{base}_{tile}.{ext}` is used when present
    #[arg(long)]
    pub vector: PathBuf,

    /// Layer of a multi-layer zone file (GeoPackage); defaults to the first layer
    #[arg(long)]
    pub vector_layer: Option<String>,

    /// Zone attribute holding the zone id
    #[arg(long)]
    pub id: String,

    /// Output directory
    #[arg(long, default_value = "./results")]
    pub out: PathBuf,

    /// Indices (ndvi, evi, ...) or raw band names (B05, B4, ...), processed in order
    #[arg(long, num_args = 1.., default_value = "ndvi")]
    pub index: Vec<String>,

    /// Statistics for statistics mode (count, mean, std, median, percentile_90, ...)
    #[arg(long, num_args = 1.., default_value = "count")]
    pub statistics: Vec<String>,

    /// First acquisition date to include (YYYYMMDD)
    #[arg(long, default_value = "20160101")]
    pub start: String,

    /// Last acquisition date to include (YYYYMMDD); defaults to today
    #[arg(long)]
    pub end: Option<String>,

    /// Output modes; several can be written in one run
    #[arg(long, value_enum, num_args = 1.., default_value = "statistics")]
    pub mode: Vec<ExtractionMode>,

    /// Leave out pixels whose cell is cut by a zone boundary
    #[arg(long, default_value_t = false)]
    pub exclude_border: bool,

    /// External cloud masks as `{base}_{tile}_{YYYYMMDD}.tif` (base given without tile,
    /// date and extension); replaces the platform's own mask
    #[arg(long)]
    pub external_cloudmask: Option<PathBuf>,

    /// TOML configuration (resolution, maxcloudcover, [platform] overrides)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Worker threads; defaults to the number of cores
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Enable debug logging
    #[arg(long, default_value_t = false)]
    pub log: bool,

    /// Also write the log to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
