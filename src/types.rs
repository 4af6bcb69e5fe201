//! Shared types and enums used across the crate.
//! Includes `Platform`, `ExtractionMode`, `Statistic`, the `Affine` pixel-to-world
//! transform and `TileIdentity`.
use std::path::PathBuf;
use std::str::FromStr;

use chrono::NaiveDate;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::Error;

#[derive(
    Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, ValueEnum, Debug, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Sentinel-2 Level-2A SAFE products
    S2,
    /// Landsat 8 Collection 2 scene directories
    Ls8,
    /// Generic single-file GeoTIFF
    Tif,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::S2 => write!(f, "s2"),
            Platform::Ls8 => write!(f, "ls8"),
            Platform::Tif => write!(f, "tif"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Per-zone statistics written as CSV
    Statistics,
    /// Per-zone masked arrays written as JSON
    #[value(name = "array")]
    #[serde(rename = "array")]
    RawArray,
    /// Per-zone clipped GeoTIFFs
    Geotiff,
}

impl std::fmt::Display for ExtractionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionMode::Statistics => write!(f, "statistics"),
            ExtractionMode::RawArray => write!(f, "array"),
            ExtractionMode::Geotiff => write!(f, "geotiff"),
        }
    }
}

/// Zonal statistic requested by the user
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Statistic {
    Count,
    Min,
    Max,
    Mean,
    Sum,
    Std,
    Median,
    Range,
    /// Number of masked pixels inside the zone
    Nodata,
    Percentile(u8),
}

impl FromStr for Statistic {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim().to_ascii_lowercase();
        let stat = match token.as_str() {
            "count" => Statistic::Count,
            "min" => Statistic::Min,
            "max" => Statistic::Max,
            "mean" => Statistic::Mean,
            "sum" => Statistic::Sum,
            "std" => Statistic::Std,
            "median" => Statistic::Median,
            "range" => Statistic::Range,
            "nodata" => Statistic::Nodata,
            other => match other.strip_prefix("percentile_") {
                Some(q) => match q.parse::<u8>() {
                    Ok(q) if q <= 100 => Statistic::Percentile(q),
                    _ => return Err(Error::UnsupportedStatistic(s.to_string())),
                },
                None => return Err(Error::UnsupportedStatistic(s.to_string())),
            },
        };
        Ok(stat)
    }
}

impl TryFrom<String> for Statistic {
    type Error = Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Statistic> for String {
    fn from(value: Statistic) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Statistic::Count => write!(f, "count"),
            Statistic::Min => write!(f, "min"),
            Statistic::Max => write!(f, "max"),
            Statistic::Mean => write!(f, "mean"),
            Statistic::Sum => write!(f, "sum"),
            Statistic::Std => write!(f, "std"),
            Statistic::Median => write!(f, "median"),
            Statistic::Range => write!(f, "range"),
            Statistic::Nodata => write!(f, "nodata"),
            Statistic::Percentile(q) => write!(f, "percentile_{}", q),
        }
    }
}

/// Pixel-to-world affine transform.
///
/// `x = a * col + b * row + c`, `y = d * col + e * row + f`, evaluated at pixel corners.
#[derive(Copy, Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    /// Build from GDAL geotransform coefficients
    /// ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub fn from_gdal(gt: [f64; 6]) -> Self {
        Self {
            a: gt[1],
            b: gt[2],
            c: gt[0],
            d: gt[4],
            e: gt[5],
            f: gt[3],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [self.c, self.a, self.b, self.f, self.d, self.e]
    }

    /// Pixel width in map units
    pub fn pixel_size(&self) -> f64 {
        self.a.hypot(self.d)
    }

    /// World coordinates of the centre of pixel (row, col)
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let (x, y) = (col as f64 + 0.5, row as f64 + 0.5);
        (
            self.a * x + self.b * y + self.c,
            self.d * x + self.e * y + self.f,
        )
    }

    /// Fractional (row, col) of a world coordinate; `None` for singular transforms
    pub fn to_pixel(&self, x: f64, y: f64) -> Option<(f64, f64)> {
        let det = self.a * self.e - self.b * self.d;
        if det.abs() < f64::EPSILON {
            return None;
        }
        let dx = x - self.c;
        let dy = y - self.f;
        let col = (self.e * dx - self.b * dy) / det;
        let row = (-self.d * dx + self.a * dy) / det;
        Some((row, col))
    }

    /// Same origin, pixels rescaled so one pixel spans `resolution` map units
    pub fn with_resolution(&self, resolution: f64) -> Self {
        let current = self.pixel_size();
        if current <= 0.0 || (current - resolution).abs() < 1e-9 {
            return *self;
        }
        let k = resolution / current;
        Self {
            a: self.a * k,
            b: self.b * k,
            c: self.c,
            d: self.d * k,
            e: self.e * k,
            f: self.f,
        }
    }

    /// Transform of a window starting at (row, col)
    pub fn offset(&self, row: usize, col: usize) -> Self {
        let (r, c) = (row as f64, col as f64);
        Self {
            c: self.a * c + self.b * r + self.c,
            f: self.d * c + self.e * r + self.f,
            ..*self
        }
    }
}

/// Identity of one tile as resolved from its path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileIdentity {
    /// Path that was discovered (SAFE directory, scene directory or GeoTIFF)
    pub path: PathBuf,
    pub tile_id: String,
    pub date: NaiveDate,
    /// Location of the band files inside the tile
    pub image_path: PathBuf,
}
