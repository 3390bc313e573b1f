//! Error types for the raster crate.

use thiserror::Error;

/// Errors that can occur when reading, writing or windowing rasters.
#[derive(Debug, Error)]
pub enum RasterError {
    /// I/O error reading or writing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TIFF decoding or encoding error.
    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// Invalid GeoTIFF - missing or malformed georeferencing tags.
    #[error("Invalid GeoTIFF: {0}")]
    InvalidGeoTiff(String),

    /// Pixel layout this crate cannot represent (planar data, rotated grids, ...).
    #[error("Unsupported raster layout: {0}")]
    UnsupportedLayout(String),

    /// Sample buffer length does not match the declared dimensions.
    #[error("Sample buffer holds {actual} values, expected {expected} ({width}x{height}x{bands})")]
    DimensionMismatch {
        /// Width in pixels.
        width: usize,
        /// Height in pixels.
        height: usize,
        /// Number of bands.
        bands: usize,
        /// Expected number of samples.
        expected: usize,
        /// Actual number of samples.
        actual: usize,
    },

    /// Requested window reaches outside the raster.
    #[error("Window {col_off},{row_off} {width}x{height} lies outside a {raster_width}x{raster_height} raster")]
    WindowOutOfBounds {
        /// Window column offset.
        col_off: usize,
        /// Window row offset.
        row_off: usize,
        /// Window width.
        width: usize,
        /// Window height.
        height: usize,
        /// Raster width.
        raster_width: usize,
        /// Raster height.
        raster_height: usize,
    },

    /// Raster has no pixels to write.
    #[error("Raster is empty ({width}x{height})")]
    EmptyRaster {
        /// Width in pixels.
        width: usize,
        /// Height in pixels.
        height: usize,
    },
}
