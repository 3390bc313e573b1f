//! Filtering a downloaded event directory on disk.

use ada_raster::{GeoTiffStore, GeoTransform, Raster, RasterStore, Samples};
use ada_runner::{collect_tiles, filter_event, FilterConfig, TileStatus};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const MASK: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {},
     "geometry": {"type": "Polygon", "coordinates": [[[103.0,43.0],[108.0,43.0],[108.0,48.0],[103.0,48.0],[103.0,43.0]]]}}
  ]
}"#;

const BOUNDARIES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "properties": {"NAME": "Atlantis"},
     "geometry": {"type": "Polygon", "coordinates": [[[95.0,35.0],[115.0,35.0],[115.0,55.0],[95.0,55.0],[95.0,35.0]]]}}
  ]
}"#;

/// 20x20 tile, 1-unit pixels from (`origin_x`, 50); valid block at rows/cols 2..=17.
fn tile(origin_x: f64) -> Raster {
    let mut samples = vec![0u8; 400];
    for row in 2..=17 {
        for col in 2..=17 {
            samples[row * 20 + col] = 9;
        }
    }
    Raster::new(
        20,
        20,
        1,
        Samples::U8(samples),
        GeoTransform::new(origin_x, 50.0, 1.0, -1.0),
    )
    .unwrap()
    .with_nodata(Some(0.0))
}

struct Event {
    dir: TempDir,
    pre: PathBuf,
    post: PathBuf,
}

fn event() -> Event {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = GeoTiffStore::new();
    let pre = dir.path().join("pre-event/1040-120.tif");
    let post = dir.path().join("post-event/1050-120.tif");
    for (path, origin_x) in [(&pre, 100.0), (&post, 0.0)] {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        store.write(&tile(origin_x), path).unwrap();
    }
    Event { dir, pre, post }
}

fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[test]
fn test_collect_tiles_skips_artifacts() {
    let event = event();
    fs::write(event.dir.path().join("pre-event/1040-120-ntl.tif"), b"stale").unwrap();
    fs::write(event.dir.path().join("pre-event/notes.txt"), b"x").unwrap();

    let tiles = collect_tiles(event.dir.path()).unwrap();
    assert_eq!(tiles, vec![event.pre.clone(), event.post.clone()]);
}

#[test]
fn test_bbox_run_keeps_overlapping_tiles() {
    let event = event();
    let config = FilterConfig::from_yaml("bbox: [100.0, 40.0, 110.0, 50.0]").unwrap();

    let summary = filter_event(event.dir.path(), &config).unwrap();
    assert_eq!(summary.stages, vec!["bbox", "trim"]);
    assert_eq!(summary.totals.saved, 1);
    assert_eq!(summary.totals.discarded, 1);
    assert_eq!(summary.totals.failed, 0);

    assert_eq!(summary.tiles[0].status, TileStatus::Saved);
    assert_eq!(summary.tiles[1].status, TileStatus::Discarded);
    assert_eq!(summary.tiles[1].reason.as_deref(), Some("no overlap"));

    let saved = GeoTiffStore::new().read(&event.pre).unwrap();
    assert_eq!(saved.dimensions(), (8, 8));
    assert!(!event.post.exists());
    assert_eq!(file_names(&event.dir.path().join("post-event")), Vec::<String>::new());
}

#[test]
fn test_country_mask_run() {
    let event = event();
    let data = event.dir.path().join("data");
    fs::create_dir_all(&data).unwrap();
    fs::write(data.join("ntl.geojson"), MASK).unwrap();
    fs::write(data.join("countries.geojson"), BOUNDARIES).unwrap();

    let config_path = event.dir.path().join("filter.yaml");
    fs::write(
        &config_path,
        format!(
            "mask_path: {}\nboundaries_path: {}\ncountry: Atlantis\ncache_dir: {}\n",
            data.join("ntl.geojson").display(),
            data.join("countries.geojson").display(),
            data.join("cache").display(),
        ),
    )
    .unwrap();
    let config = FilterConfig::load(&config_path).unwrap();

    let summary = filter_event(event.dir.path(), &config).unwrap();
    assert_eq!(summary.stages, vec!["mask", "trim"]);
    assert_eq!(summary.totals.saved, 1);
    assert_eq!(
        summary.tiles[1].reason.as_deref(),
        Some("no populated area present")
    );
    assert!(data.join("cache/ntl-atlantis.geojson").exists());

    let saved = GeoTiffStore::new().read(&event.pre).unwrap();
    assert_eq!(saved.dimensions(), (5, 5));
    assert_eq!(saved.geotransform().origin_x, 103.0);
    assert_eq!(file_names(&event.dir.path().join("pre-event")), vec!["1040-120.tif"]);
}

#[test]
fn test_summary_written_as_json() {
    let event = event();
    let summary = filter_event(event.dir.path(), &FilterConfig::default()).unwrap();
    let out = event.dir.path().join("reports/summary.json");
    summary.write(&out).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
    assert_eq!(json["stages"], serde_json::json!(["trim"]));
    assert_eq!(json["totals"]["saved"], 2);
}

#[test]
fn test_missing_mask_is_a_setup_error() {
    let event = event();
    let config = FilterConfig {
        mask_path: Some(event.dir.path().join("absent.geojson")),
        ..FilterConfig::default()
    };
    assert!(filter_event(event.dir.path(), &config).is_err());
    // Nothing was touched
    assert!(event.pre.exists());
    assert!(event.post.exists());
}
