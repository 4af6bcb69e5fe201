#![doc = r#"
eozonal — per-zone time-series extraction from satellite raster tiles.

This crate turns Sentinel-2 L2A products, Landsat 8 Collection 2 scenes or plain GeoTIFFs
into per-zone vegetation index and band values for a set of vector zones (e.g. field
parcels). Tiles are filtered by acquisition date, cloud cover and data coverage, and
results are written as statistics CSVs, masked-array JSON or per-zone GeoTIFFs. It powers
the eozonal CLI and can be embedded in your own Rust applications.

Requirements
------------
- GDAL development headers and runtime available on your system.
- Rust 2024 edition toolchain.

Add dependency
--------------
```toml
[dependencies]
eozonal = "0.1"
```

Quick start: statistics for a directory of tiles
------------------------------------------------
```rust,no_run
use std::path::PathBuf;
use chrono::NaiveDate;
use eozonal::{
    run_extraction, DateRange, ExtractionMode, ExtractionParams, InputSource, Platform,
    RunConfig, Statistic,
};

fn main() -> eozonal::Result<()> {
    let params = ExtractionParams {
        platform: Platform::S2,
        input: InputSource::Directory(PathBuf::from("/data/s2")),
        vector: PathBuf::from("/data/parcels.gpkg"),
        vector_layer: None,
        id_field: "parcel_id".to_string(),
        output_dir: PathBuf::from("/out"),
        indices: vec!["ndvi".to_string(), "B05".to_string()],
        statistics: vec![Statistic::Mean, Statistic::Std, Statistic::Percentile(90)],
        dates: DateRange::new(
            NaiveDate::from_ymd_opt(2020, 5, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 9, 30).unwrap(),
        )?,
        modes: vec![ExtractionMode::Statistics, ExtractionMode::RawArray],
        exclude_border: false,
        jobs: Some(4),
    };
    let config = RunConfig::builtin(Platform::S2);

    let report = run_extraction(&params, &config)?;
    println!(
        "processed={} skipped={} failed={}",
        report.processed(),
        report.skipped(),
        report.failed()
    );
    Ok(())
}
```

Band access for one tile
------------------------
```rust,no_run
use eozonal::core::config::PlatformConfig;
use eozonal::io::raster_store::{layout_for, RasterStore};
use eozonal::Platform;

fn main() -> eozonal::Result<()> {
    let config = PlatformConfig::builtin(Platform::S2);
    let layout = layout_for(&config, 10.0);
    let img = "/data/S2A_MSIL2A_..._T35VLG_....SAFE/GRANULE/L2A_T35VLG/IMG_DATA";
    let store = RasterStore::new(img, layout);

    let reference = store.reference_metadata()?;
    println!("{} {}x{}", reference.crs, reference.width, reference.height);

    // B05 is stored at 20 m; read it bilinearly upsampled onto the 10 m grid
    let red_edge = store.resampled_band("B05", 20.0, 10.0)?;
    println!("{:?}", red_edge.dim());
    Ok(())
}
```

Error handling
--------------
All public functions return `eozonal::Result<T>`; match on `eozonal::Error` to handle
specific cases, e.g. missing bands or malformed dates.

```rust,no_run
use eozonal::io::pathfinder::parse_date;
use eozonal::Error;

fn main() {
    match parse_date("2020O615") {
        Ok(date) => println!("{date}"),
        Err(Error::InvalidDate { value }) => eprintln!("bad date: {value}"),
        Err(other) => eprintln!("Other error: {other}"),
    }
}
```

Useful modules
--------------
- [`api`] — high-level entry points.
- [`core`] — configuration, parameters, processing primitives and the pipeline.
- [`io`] — GDAL band reading, platform layouts, zones and writers.
- [`types`] — enums and core types (e.g. `Platform`, `Statistic`, `Affine`).
- [`error`] — crate-level `Error` and `Result`.
"#]

// Core modules (public)
pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Curated public API surface
// Types
pub use crate::core::config::{PlatformConfig, RunConfig};
pub use crate::core::params::{DateRange, ExtractionParams, InputSource};
pub use error::{Error, Result};
pub use types::{Affine, ExtractionMode, Platform, Statistic, TileIdentity};

// Pipeline
pub use crate::core::pipeline::{CancellationToken, RunReport, TileOutcome, TileReport};

// Readers
pub use io::gdal::{GdalBandReader, GdalError, GdalMetadata};
pub use io::raster_store::{BandLayout, RasterStore, ReferenceMetadata};

// High-level API re-exports
pub use api::{run_extraction, run_extraction_from_config_file, run_extraction_with_cancel};
