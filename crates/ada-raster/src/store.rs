//! Persistent raster storage.

use crate::{geotiff, Raster, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads and writes raster tiles.
///
/// Writes must be durable before they return: a reader never observes a
/// partially written file at the target path.
pub trait RasterStore {
    /// Load the raster stored at `path`.
    fn read(&self, path: &Path) -> Result<Raster>;

    /// Persist `raster` at `path`, replacing any existing file.
    fn write(&self, raster: &Raster, path: &Path) -> Result<()>;

    /// Delete the raster stored at `path`.
    fn remove(&self, path: &Path) -> Result<()>;

    /// Move the raster at `from` to `to`, replacing `to`.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// True if a raster exists at `path`.
    fn exists(&self, path: &Path) -> bool;
}

/// GeoTIFF files on the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct GeoTiffStore;

impl GeoTiffStore {
    /// Create a new store.
    pub fn new() -> Self {
        Self
    }
}

/// Sibling path used while a write is in progress.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

impl RasterStore for GeoTiffStore {
    fn read(&self, path: &Path) -> Result<Raster> {
        let raster = geotiff::read_geotiff(path)?;
        debug!(
            path = %path.display(),
            width = raster.width(),
            height = raster.height(),
            bands = raster.bands(),
            "read raster"
        );
        Ok(raster)
    }

    fn write(&self, raster: &Raster, path: &Path) -> Result<()> {
        let staging = staging_path(path);
        if let Err(e) = geotiff::write_geotiff(raster, &staging) {
            let _ = fs::remove_file(&staging);
            return Err(e);
        }
        fs::rename(&staging, path)?;
        debug!(
            path = %path.display(),
            width = raster.width(),
            height = raster.height(),
            "wrote raster"
        );
        Ok(())
    }

    fn remove(&self, path: &Path) -> Result<()> {
        fs::remove_file(path)?;
        debug!(path = %path.display(), "removed raster");
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}
