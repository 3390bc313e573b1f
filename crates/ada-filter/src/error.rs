//! Error types for the filter crate.

use ada_raster::{Crs, RasterError};
use thiserror::Error;

/// Errors that abort filtering of a single tile, or loading of a mask source.
#[derive(Debug, Error)]
pub enum FilterError {
    /// Reading, windowing or writing a raster failed.
    #[error("Raster error: {0}")]
    Raster(#[from] RasterError),

    /// I/O error on a mask or cache file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Mask or boundaries file is not valid GeoJSON.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// No boundary feature carries the requested country name.
    #[error("Country '{country}' not found in {property} of the boundaries file")]
    CountryNotFound {
        /// Requested country.
        country: String,
        /// Property searched.
        property: String,
    },

    /// A country subset was requested but no boundaries file is configured.
    #[error("Country '{0}' requested but no boundaries file is configured")]
    MissingBoundaries(String),

    /// Geometry cannot be used as an area mask.
    #[error("Invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Bounding box corners are not ordered.
    #[error("Invalid bounding box: {0}")]
    InvalidBoundingBox(String),

    /// Raster and mask are in different reference systems.
    #[error("Raster is in {raster} but the mask is in {mask}; reproject before filtering")]
    CrsMismatch {
        /// Raster reference system.
        raster: Crs,
        /// Mask reference system.
        mask: Crs,
    },

    /// A thread panicked while holding the derivation tracker.
    #[error("Country mask cache lock poisoned")]
    CacheLockPoisoned,
}
