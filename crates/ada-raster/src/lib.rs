//! # ada-raster
//!
//! Raster tiles for the disaster imagery pipeline: an in-memory pixel grid with
//! its geotransform, coordinate reference system and nodata sentinel, plus a
//! GeoTIFF codec and a [`RasterStore`] abstraction over where tiles live.
//!
//! ## Overview
//!
//! A [`Raster`] owns band-interleaved [`Samples`] and a north-up
//! [`GeoTransform`]. Its ground [`Raster::bounds`] are derived from the
//! geotransform and the pixel dimensions on every call, so cropping can never
//! leave the two out of sync.
//!
//! Windows ([`Window`]) are the unit of every crop: [`Raster::window_for_bounds`]
//! maps a ground rectangle to the smallest covering pixel window,
//! [`Raster::data_window`] finds the window holding all valid pixels, and
//! [`Raster::read_window`] extracts one with a re-derived geotransform.
//!
//! ## Example
//!
//! ```no_run
//! use ada_raster::{GeoTiffStore, RasterStore};
//! use std::path::Path;
//!
//! let store = GeoTiffStore::new();
//! let raster = store.read(Path::new("input/pre-event/1030010083417A00-031331232121.tif"))?;
//! println!("{}x{} pixels, bounds {:?}", raster.width(), raster.height(), raster.bounds());
//!
//! if let Some(window) = raster.data_window(0) {
//!     let trimmed = raster.read_window(&window)?;
//!     store.write(&trimmed, Path::new("trimmed.tif"))?;
//! }
//! # Ok::<(), ada_raster::RasterError>(())
//! ```

mod error;
pub mod geotiff;
mod raster;
mod store;

pub use error::RasterError;
pub use raster::{Crs, GeoTransform, Raster, SampleType, Samples, Window};
pub use store::{GeoTiffStore, RasterStore};

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
