use std::path::Path;

use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;

use crate::core::processing::extract::ZoneArray;
use crate::types::Affine;

/// Single-band f32 GeoTIFF with geotransform, optional EPSG CRS and NaN nodata
pub fn write_tiff_f32(
    output: &Path,
    data: &Array2<f32>,
    transform: &Affine,
    epsg: Option<u32>,
) -> Result<Dataset, Box<dyn std::error::Error>> {
    let (rows, cols) = data.dim();
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut ds = driver.create_with_band_type::<f32, _>(output, cols, rows, 1)?;
    ds.set_geo_transform(&transform.to_gdal())?;
    if let Some(code) = epsg {
        ds.set_spatial_ref(&SpatialRef::from_epsg(code)?)?;
    }
    let mut band = ds.rasterband(1)?;
    band.set_no_data_value(Some(f64::NAN))?;
    let mut buf = Buffer::new((cols, rows), data.iter().copied().collect::<Vec<f32>>());
    band.write((0, 0), (cols, rows), &mut buf)?;
    Ok(ds)
}

/// Zone window as a GeoTIFF; masked pixels become NaN
pub fn write_zone_tiff(
    output: &Path,
    zone: &ZoneArray,
    epsg: Option<u32>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut values = zone.values.clone();
    values.zip_mut_with(&zone.mask, |v, masked| {
        if *masked {
            *v = f32::NAN;
        }
    });
    write_tiff_f32(output, &values, &zone.transform, epsg)?;
    Ok(())
}
