//! Per-tile extraction pipeline: discovery, date and quality gates, index-vs-band dispatch
//! and the statistics/array/GeoTIFF output branch, run over a bounded worker pool.
pub mod cancel;
pub mod collaborators;
pub mod discovery;
pub mod dispatch;
pub mod orchestrator;

pub use cancel::CancellationToken;
pub use collaborators::{
    ArtifactKey, ArtifactWriter, TileAccess, TileIdentifier, TileReader, ZoneProvider,
};
pub use discovery::discover_tiles;
pub use dispatch::{TokenRoute, classify_token};
pub use orchestrator::{Collaborators, Orchestrator, RunReport, TileOutcome, TileReport};
