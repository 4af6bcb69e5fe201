use gdal::Dataset;
use gdal::errors::GdalError as GdalCrateError;
use gdal::raster::{GdalType, ResampleAlg};
use ndarray::Array2;
use std::path::Path;
use thiserror::Error;

/// Errors encountered when using the GDAL band reader
#[derive(Debug, Error)]
pub enum GdalError {
    #[error("GDAL error: {0}")]
    Gdal(#[from] GdalCrateError),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Dimension mismatch: expected {rows}x{cols} values, got {got}")]
    DimensionMismatch { rows: usize, cols: usize, got: usize },
}

/// Metadata extracted from a GDAL-supported dataset
#[derive(Debug, Clone)]
pub struct GdalMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients
    /// ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection as `EPSG:XXXX` when an authority code is known, WKT otherwise
    pub projection: String,
    /// EPSG code of the projection, if any
    pub epsg: Option<u32>,
}

/// Reader for single-band access to GDAL-supported rasters (JP2, GeoTIFF, ...)
pub struct GdalBandReader {
    pub dataset: Dataset,
    pub metadata: GdalMetadata,
}

// Helper to extract EPSG code from WKT authority tag
pub(crate) fn parse_epsg(wkt: &str) -> Option<u32> {
    if let Some(code) = wkt.strip_prefix("EPSG:") {
        return code.trim().parse().ok();
    }
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    let idx = wkt.rfind(KEY)?;
    let start = idx + KEY.len();
    let end = wkt[start..].find('"')?;
    wkt[start..start + end].parse().ok()
}

impl GdalBandReader {
    /// Open a GDAL-supported dataset
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, GdalError> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::UnsupportedFormat("No raster bands found".into()));
        }
        let geotransform = match dataset.geo_transform() {
            Ok(gt) => gt,
            Err(_) => [0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        };
        let wkt = dataset.projection();
        let epsg = parse_epsg(&wkt).or_else(|| {
            dataset
                .spatial_ref()
                .ok()
                .and_then(|srs| srs.auth_code().ok())
                .and_then(|code| u32::try_from(code).ok())
        });
        let projection = match epsg {
            Some(code) => format!("EPSG:{}", code),
            None => wkt,
        };
        Ok(GdalBandReader {
            dataset,
            metadata: GdalMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
                epsg,
            },
        })
    }

    fn check_index(&self, index: usize) -> Result<(), GdalError> {
        if index == 0 || index > self.metadata.bands {
            return Err(GdalError::UnsupportedFormat(format!(
                "Band index {} out of range",
                index
            )));
        }
        Ok(())
    }

    /// Read a single band (1-based index) at native size as an ndarray of shape (height, width)
    pub fn read_band<T: GdalType + Copy>(&self, index: usize) -> Result<Array2<T>, GdalError> {
        let window = (self.metadata.size_x, self.metadata.size_y);
        self.read_band_into_shape(index, window, None)
    }

    /// Read a single band (1-based index) directly into `(rows, cols)` using GDAL's
    /// resampling on read
    pub fn read_band_resampled<T: GdalType + Copy>(
        &self,
        index: usize,
        shape: (usize, usize),
        e_resample_alg: ResampleAlg,
    ) -> Result<Array2<T>, GdalError> {
        let (rows, cols) = shape;
        self.read_band_into_shape(index, (cols, rows), Some(e_resample_alg))
    }

    fn read_band_into_shape<T: GdalType + Copy>(
        &self,
        index: usize,
        out_size: (usize, usize),
        e_resample_alg: Option<ResampleAlg>,
    ) -> Result<Array2<T>, GdalError> {
        self.check_index(index)?;
        let band = self.dataset.rasterband(index)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<T>((0, 0), window, out_size, e_resample_alg)?;
        let (cols, rows) = out_size;
        let data_vec = buf.data().to_vec();
        let got = data_vec.len();
        Array2::from_shape_vec((rows, cols), data_vec)
            .map_err(|_| GdalError::DimensionMismatch { rows, cols, got })
    }
}

#[cfg(test)]
mod tests {
    use super::parse_epsg;

    #[test]
    fn parses_epsg_from_wkt_and_code() {
        let wkt = concat!(
            r#"PROJCS["WGS 84 / UTM zone 35N","#,
            r#"GEOGCS["WGS 84",AUTHORITY["EPSG","4326"]],AUTHORITY["EPSG","32635"]]"#
        );
        assert_eq!(parse_epsg(wkt), Some(32635));
        assert_eq!(parse_epsg("EPSG:3067"), Some(3067));
        assert_eq!(parse_epsg(""), None);
    }
}
