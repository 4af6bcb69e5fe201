//! I/O layer: GDAL band reading, platform band layouts, tile identification, product
//! metadata, vector zones and artifact writers.
pub mod gdal;
pub use self::gdal::{GdalBandReader, GdalError, GdalMetadata};

pub mod metadata;
pub mod pathfinder;
pub mod raster_store;
pub mod tile;
pub mod writers;
pub mod zones;

pub use pathfinder::Pathfinder;
pub use raster_store::{BandLayout, BandLocation, RasterStore, ReferenceMetadata};
pub use tile::GdalTileReader;
pub use writers::FileWriter;
pub use zones::VectorZones;
