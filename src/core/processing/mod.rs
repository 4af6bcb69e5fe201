//! Raster computations: vegetation indices, cloud masks, quality checks and zonal
//! extraction.
pub mod cloudmask;
pub mod extract;
pub mod indices;
pub mod stats;
pub mod validator;

pub use extract::{Zone, ZoneArray, ZoneStatistics, extract_arrays, extract_statistics};
pub use indices::{IndexCalculator, VegetationIndex};
pub use validator::{Validity, validate_coverage};
