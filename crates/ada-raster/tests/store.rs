//! Integration tests for GeoTIFF storage on the local filesystem.

use ada_raster::{Crs, GeoTiffStore, GeoTransform, Raster, RasterError, RasterStore, Samples, Window};
use approx::assert_relative_eq;
use tempfile::TempDir;

fn sample_tile() -> Raster {
    let width = 40;
    let height = 30;
    let samples: Vec<u16> = (0..width * height).map(|v| (v % 4000) as u16).collect();
    Raster::new(
        width,
        height,
        1,
        Samples::U16(samples),
        GeoTransform::new(307_200.0, 1_627_200.0, 0.5, -0.5),
    )
    .unwrap()
    .with_crs(Some(Crs::Projected(32651)))
    .with_nodata(Some(0.0))
}

#[test]
fn test_write_then_read() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("tile.tif");
    let store = GeoTiffStore::new();
    let raster = sample_tile();

    store.write(&raster, &path).expect("Failed to write tile");
    assert!(store.exists(&path));
    assert!(
        !dir.path().join("tile.tif.tmp").exists(),
        "staging file should be renamed away"
    );

    let loaded = store.read(&path).expect("Failed to read tile");
    assert_eq!(loaded, raster);
}

#[test]
fn test_window_survives_storage() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("window.tif");
    let store = GeoTiffStore::new();

    let window = sample_tile()
        .read_window(&Window::new(10, 5, 8, 4))
        .expect("Failed to read window");
    store.write(&window, &path).expect("Failed to write window");
    let loaded = store.read(&path).expect("Failed to read window");

    assert_eq!(loaded.dimensions(), (8, 4));
    let bounds = loaded.bounds();
    assert_relative_eq!(bounds.min().x, 307_205.0);
    assert_relative_eq!(bounds.max().x, 307_209.0);
    assert_relative_eq!(bounds.max().y, 1_627_197.5);
    assert_relative_eq!(bounds.min().y, 1_627_195.5);
}

#[test]
fn test_rename_and_remove() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let first = dir.path().join("a.tif");
    let second = dir.path().join("b.tif");
    let store = GeoTiffStore::new();

    store.write(&sample_tile(), &first).unwrap();
    store.rename(&first, &second).unwrap();
    assert!(!store.exists(&first));
    assert!(store.exists(&second));

    store.remove(&second).unwrap();
    assert!(!store.exists(&second));
}

#[test]
fn test_read_missing_file_is_io_error() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = GeoTiffStore::new();
    let err = store.read(&dir.path().join("missing.tif")).unwrap_err();
    assert!(matches!(err, ada_raster::RasterError::Io(_)));
}

#[test]
fn test_five_band_tile_is_refused_and_leaves_nothing() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("multiband.tif");
    let store = GeoTiffStore::new();
    let raster = Raster::new(
        2,
        2,
        5,
        Samples::U8((0..20).collect()),
        GeoTransform::new(0.0, 2.0, 1.0, -1.0),
    )
    .unwrap();

    assert!(matches!(
        store.write(&raster, &path),
        Err(RasterError::UnsupportedLayout(_))
    ));
    assert!(!path.exists());
    assert!(!dir.path().join("multiband.tif.tmp").exists());
}

#[test]
fn test_rgba_tile_roundtrip() {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = dir.path().join("rgba.tif");
    let store = GeoTiffStore::new();
    let raster = Raster::new(
        3,
        2,
        4,
        Samples::U8((0..24).collect()),
        GeoTransform::new(121.0, 17.0, 0.5, -0.5),
    )
    .unwrap()
    .with_crs(Some(Crs::Geographic(4326)));

    store.write(&raster, &path).expect("Failed to write tile");
    assert_eq!(store.read(&path).expect("Failed to read tile"), raster);
}
