//! Core building blocks: run configuration and parameters, raster processing primitives
//! and the per-tile extraction pipeline. These are consumed by the high-level `api` module.
pub mod config;
pub mod params;
pub mod pipeline;
pub mod processing;
