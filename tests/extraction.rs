use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};

use eozonal::core::config::CloudMaskSource;
use eozonal::{
    DateRange, ExtractionMode, ExtractionParams, InputSource, Platform, RunConfig, Statistic,
    TileOutcome, run_extraction,
};

/// f32 GeoTIFF of `rows`x`cols` with one band per entry of `bands`
fn write_tif(
    path: &Path,
    (rows, cols): (usize, usize),
    gt: [f64; 6],
    epsg: u32,
    bands: &[Vec<f32>],
) {
    let driver = DriverManager::get_driver_by_name("GTiff").unwrap();
    let mut ds = driver
        .create_with_band_type::<f32, _>(path, cols, rows, bands.len())
        .unwrap();
    ds.set_geo_transform(&gt).unwrap();
    ds.set_spatial_ref(&SpatialRef::from_epsg(epsg).unwrap())
        .unwrap();
    for (i, values) in bands.iter().enumerate() {
        let mut band = ds.rasterband(i + 1).unwrap();
        let mut buf = Buffer::new((cols, rows), values.clone());
        band.write((0, 0), (cols, rows), &mut buf).unwrap();
    }
}

const UTM_GRID: [f64; 6] = [500000.0, 10.0, 0.0, 6800000.0, 0.0, -10.0];

/// 4x4 GeoTIFF at 10 m with constant bands blue=100, green=200, red=1000, nir=3000
fn write_scene(path: &Path) {
    let bands: Vec<Vec<f32>> = [100.0f32, 200.0, 1000.0, 3000.0]
        .into_iter()
        .map(|value| vec![value; 16])
        .collect();
    write_tif(path, (4, 4), UTM_GRID, 32635, &bands);
}

/// GeoJSON with one square parcel `p1`
fn write_square_zone(path: &Path, crs: &str, (x0, y0, x1, y1): (f64, f64, f64, f64)) {
    let geojson = format!(
        r#"{{ "type": "FeatureCollection",
  "crs": {{ "type": "name", "properties": {{ "name": "{crs}" }} }},
  "features": [{{ "type": "Feature", "properties": {{ "parcel": "p1" }},
    "geometry": {{ "type": "Polygon",
      "coordinates": [[[{x0}, {y0}], [{x1}, {y0}], [{x1}, {y1}], [{x0}, {y1}], [{x0}, {y0}]]] }} }}]
}}"#
    );
    fs::write(path, geojson).unwrap();
}

/// One parcel over the top-left 2x2 pixels of the scene
fn write_parcels(path: &Path) {
    write_square_zone(
        path,
        "urn:ogc:def:crs:EPSG::32635",
        (500000.0, 6799980.0, 500020.0, 6800000.0),
    );
}

fn params(dir: &Path, mode: ExtractionMode) -> ExtractionParams {
    ExtractionParams {
        platform: Platform::Tif,
        input: InputSource::File(dir.join("field_20200615.tif")),
        vector: dir.join("parcels.geojson"),
        vector_layer: None,
        id_field: "parcel".into(),
        output_dir: dir.join("results"),
        indices: vec!["ndvi".into(), "B3".into(), "XYZ".into()],
        statistics: vec![Statistic::Mean],
        dates: DateRange::new(
            NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 12, 31).unwrap(),
        )
        .unwrap(),
        modes: vec![mode],
        exclude_border: false,
        jobs: Some(1),
    }
}

fn setup() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_scene(&dir.path().join("field_20200615.tif"));
    write_parcels(&dir.path().join("parcels.geojson"));
    dir
}

#[test]
fn statistics_run_writes_one_csv_per_token() {
    let dir = setup();
    let params = params(dir.path(), ExtractionMode::Statistics);
    let report = run_extraction(&params, &RunConfig::builtin(Platform::Tif)).unwrap();

    assert_eq!(report.tiles.len(), 1);
    let tile = &report.tiles[0];
    assert_eq!(tile.outcome, TileOutcome::Processed);
    assert_eq!(tile.tile_id.as_deref(), Some("field"));
    assert_eq!(tile.warnings.len(), 1);

    let results = dir.path().join("results");
    let ndvi = fs::read_to_string(results.join("ndvi_20200615_field_statistics.csv")).unwrap();
    assert_eq!(ndvi, "id,count,mean\np1,4,0.5\n");
    let red = fs::read_to_string(results.join("B3_20200615_field_statistics.csv")).unwrap();
    assert_eq!(red, "id,count,mean\np1,4,1000\n");
    assert_eq!(report.artifacts().count(), 2);
}

#[test]
fn array_run_writes_masked_json() {
    let dir = setup();
    let mut params = params(dir.path(), ExtractionMode::RawArray);
    params.indices = vec!["ndvi".into()];
    run_extraction(&params, &RunConfig::builtin(Platform::Tif)).unwrap();

    let path = dir.path().join("results/ndvi_20200615_field_array.json");
    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    let values = json["p1"]["values"].as_array().unwrap();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0][0], 0.5);
    assert_eq!(json["p1"]["geotransform"][0], 500000.0);
}

#[test]
fn geotiff_run_writes_zone_rasters() {
    let dir = setup();
    let mut params = params(dir.path(), ExtractionMode::Geotiff);
    params.indices = vec!["ndvi".into()];
    let report = run_extraction(&params, &RunConfig::builtin(Platform::Tif)).unwrap();

    let written: Vec<&PathBuf> = report.artifacts().collect();
    assert_eq!(written.len(), 1);
    let ds = Dataset::open(written[0]).unwrap();
    assert_eq!(ds.raster_size(), (2, 2));
    assert_eq!(ds.geo_transform().unwrap()[3], 6800000.0);
    let band = ds.rasterband(1).unwrap();
    let buf = band.read_as::<f32>((0, 0), (2, 2), (2, 2), None).unwrap();
    assert!(buf.data().iter().all(|v| (*v - 0.5).abs() < 1e-6));
}

#[test]
fn statistics_and_arrays_in_one_run() {
    let dir = setup();
    let mut params = params(dir.path(), ExtractionMode::Statistics);
    params.indices = vec!["ndvi".into()];
    params.modes.push(ExtractionMode::RawArray);
    let report = run_extraction(&params, &RunConfig::builtin(Platform::Tif)).unwrap();

    let results = dir.path().join("results");
    assert_eq!(report.artifacts().count(), 2);
    assert!(results.join("ndvi_20200615_field_statistics.csv").is_file());
    assert!(results.join("ndvi_20200615_field_array.json").is_file());
}

#[test]
fn clear_tile_passes_a_zero_threshold_and_date_gate_still_applies() {
    let dir = setup();
    let params = params(dir.path(), ExtractionMode::Statistics);
    let config = RunConfig::from_toml_str(Platform::Tif, "maxcloudcover = 0").unwrap();
    // No metadata and a clear mask give 0 %, which passes an inclusive 0 % threshold
    let report = run_extraction(&params, &config).unwrap();
    assert_eq!(report.processed(), 1);

    let out_of_range = ExtractionParams {
        dates: DateRange::new(
            NaiveDate::from_ymd_opt(2021, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2021, 12, 31).unwrap(),
        )
        .unwrap(),
        output_dir: dir.path().join("later"),
        ..params
    };
    let report = run_extraction(&out_of_range, &config).unwrap();
    assert_eq!(report.tiles[0].outcome, TileOutcome::SkippedDate);
    assert_eq!(report.artifacts().count(), 0);
}

#[test]
fn mismatched_platform_configuration_is_rejected() {
    let dir = setup();
    let params = params(dir.path(), ExtractionMode::Statistics);
    assert!(run_extraction(&params, &RunConfig::builtin(Platform::S2)).is_err());
}

const LANDSAT_SCENE: &str = "LC08_L2SP_188018_20200615_20200823_02_T1";

/// Landsat 8 scene directory on a 2x2 grid at 30 m: red=1000, nir=3000, clear QA, and an MTL
/// file reporting `cloud_cover`
fn write_landsat_scene(root: &Path, cloud_cover: f64) -> PathBuf {
    let scene = root.join("scenes").join(LANDSAT_SCENE);
    fs::create_dir_all(&scene).unwrap();
    let gt = [500000.0, 30.0, 0.0, 6800000.0, 0.0, -30.0];
    for (band, value) in [("SR_B4", 1000.0f32), ("SR_B5", 3000.0), ("QA_PIXEL", 21824.0)] {
        let path = scene.join(format!("{LANDSAT_SCENE}_{band}.TIF"));
        write_tif(&path, (2, 2), gt, 32635, &[vec![value; 4]]);
    }
    fs::write(
        scene.join(format!("{LANDSAT_SCENE}_MTL.txt")),
        format!("GROUP = IMAGE_ATTRIBUTES\n    CLOUD_COVER = {cloud_cover:.2}\nEND_GROUP\n"),
    )
    .unwrap();
    write_square_zone(
        &root.join("parcels.geojson"),
        "urn:ogc:def:crs:EPSG::32635",
        (500000.0, 6799940.0, 500060.0, 6800000.0),
    );
    root.join("scenes")
}

fn landsat_params(root: &Path, scenes: PathBuf) -> ExtractionParams {
    ExtractionParams {
        platform: Platform::Ls8,
        input: InputSource::Directory(scenes),
        indices: vec!["ndvi".into()],
        ..params(root, ExtractionMode::Statistics)
    }
}

#[test]
fn landsat_scene_over_the_cloud_threshold_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let scenes = write_landsat_scene(dir.path(), 55.0);
    let params = landsat_params(dir.path(), scenes);

    let strict = RunConfig::from_toml_str(Platform::Ls8, "maxcloudcover = 50").unwrap();
    let report = run_extraction(&params, &strict).unwrap();
    assert_eq!(report.tiles.len(), 1);
    assert_eq!(report.tiles[0].outcome, TileOutcome::SkippedQuality);
    assert_eq!(report.tiles[0].warnings.len(), 1);
    assert!(report.tiles[0].warnings[0].contains("55.0"));
    assert_eq!(report.artifacts().count(), 0);

    let lenient = RunConfig::from_toml_str(Platform::Ls8, "maxcloudcover = 60").unwrap();
    let report = run_extraction(&params, &lenient).unwrap();
    assert_eq!(report.tiles[0].outcome, TileOutcome::Processed);
    assert_eq!(report.tiles[0].tile_id.as_deref(), Some("188018"));
    let csv = dir.path().join("results/ndvi_20200615_188018_statistics.csv");
    assert_eq!(fs::read_to_string(csv).unwrap(), "id,count,mean\np1,4,0.5\n");
}

/// 4x4 EPSG:4326 GeoTIFF of 1e-4 degree pixels at (0, 4e-4); pixel (r, c) holds `r * 4 + c + 1`
fn write_geographic_scene(path: &Path) {
    let values: Vec<f32> = (0..16).map(|i| i as f32 + 1.0).collect();
    write_tif(path, (4, 4), [0.0, 1e-4, 0.0, 4e-4, 0.0, -1e-4], 4326, &[values]);
}

fn geographic_mean(crs: &str, square: (f64, f64, f64, f64)) -> String {
    let dir = tempfile::tempdir().unwrap();
    write_geographic_scene(&dir.path().join("field_20200615.tif"));
    write_square_zone(&dir.path().join("parcels.geojson"), crs, square);
    let mut params = params(dir.path(), ExtractionMode::Statistics);
    params.indices = vec!["B1".into()];
    let config = RunConfig::from_toml_str(Platform::Tif, "resolution = 0.0001").unwrap();
    let report = run_extraction(&params, &config).unwrap();
    assert_eq!(report.processed(), 1);
    fs::read_to_string(dir.path().join("results/B1_20200615_field_statistics.csv")).unwrap()
}

#[test]
fn projected_zones_land_on_geographic_tiles_without_axis_swap() {
    // covers lon 0.2e-4..1.8e-4, lat 2.2e-4..3.8e-4: pixels 1, 2, 5 and 6
    let csv = geographic_mean(
        "urn:ogc:def:crs:EPSG::3857",
        (2.2264, 24.4903, 20.0375, 42.3014),
    );
    assert_eq!(csv, "id,count,mean\np1,4,3.5\n");
}

#[test]
fn lon_lat_zones_on_geographic_tiles_keep_their_order() {
    let csv = geographic_mean(
        "urn:ogc:def:crs:OGC:1.3:CRS84",
        (0.2e-4, 2.2e-4, 1.8e-4, 3.8e-4),
    );
    assert_eq!(csv, "id,count,mean\np1,4,3.5\n");
}

#[test]
fn external_cloud_mask_hides_flagged_pixels() {
    let dir = setup();
    let mut mask = vec![0.0f32; 16];
    mask[0] = 1.0;
    write_tif(&dir.path().join("clouds_field_20200615.tif"), (4, 4), UTM_GRID, 32635, &[mask]);

    let mut params = params(dir.path(), ExtractionMode::Statistics);
    params.indices = vec!["ndvi".into()];
    params.statistics = vec![Statistic::Mean, Statistic::Nodata];
    let mut config = RunConfig::builtin(Platform::Tif);
    config.platform.cloud_mask = CloudMaskSource::External {
        base: dir.path().join("clouds"),
    };
    let report = run_extraction(&params, &config).unwrap();
    assert_eq!(report.processed(), 1);
    let csv =
        fs::read_to_string(dir.path().join("results/ndvi_20200615_field_statistics.csv")).unwrap();
    assert_eq!(csv, "id,count,mean,nodata\np1,3,0.5,1\n");

    // a tile without its mask file fails on its own
    config.platform.cloud_mask = CloudMaskSource::External {
        base: dir.path().join("missing"),
    };
    let report = run_extraction(&params, &config).unwrap();
    assert_eq!(report.failed(), 1);
}
