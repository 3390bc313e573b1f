//! # ada-filter
//!
//! Geospatial filters that reduce a disaster imagery tile to the footprint
//! worth analysing, and the pipeline that chains them.
//!
//! ## Stages
//!
//! 1. [`crop_to_bbox`]: clip to a user-supplied ground rectangle.
//! 2. [`apply_mask`]: clip to the night-lights polygons near the tile and blank
//!    the pixels outside them. [`MaskSource`] supplies either the whole mask or
//!    a memoized per-country subset.
//! 3. [`trim_nodata`]: shrink to the window holding valid pixels.
//!
//! Every stage returns a [`FilterResult`]: the tile either survives as a new
//! [`Raster`](ada_raster::Raster) or is discarded with a [`DiscardReason`].
//! Empty results are decided by explicit checks, never by catching failures.
//!
//! ## Example
//!
//! ```no_run
//! use ada_filter::{BoundingBox, FilterPipeline, MaskSource};
//! use ada_raster::GeoTiffStore;
//! use std::path::Path;
//!
//! let source = MaskSource::open(Path::new("data/ntl.geojson"))?
//!     .with_boundaries("data/countries.geojson");
//! let pipeline = FilterPipeline::new(GeoTiffStore::new())
//!     .with_bbox("39.0,-20.5,39.5,-19.5".parse::<BoundingBox>()?)
//!     .with_mask(source.mask_for(Some("Mozambique"))?);
//!
//! let outcome = pipeline.process(Path::new("dest/post-event/105001001244DB00-300022010.tif"));
//! println!("{:?}", outcome.state);
//! # Ok::<(), ada_filter::FilterError>(())
//! ```

mod bbox;
mod country;
mod error;
mod mask;
mod outcome;
mod pipeline;
mod rasterize;
mod trim;

pub use bbox::{crop_to_bbox, BoundingBox, BoundingBoxCropper};
pub use country::{
    country_cache_path, country_slug, default_cache_dir, derive_country_mask, find_country,
    load_mask, read_geometries, write_mask,
    DerivationStats, MaskSource, BOUNDARY_SCALE, DEFAULT_COUNTRY_PROPERTY,
};
pub use error::FilterError;
pub use mask::{apply_mask, AreaMaskFilter, MaskSet, DEFAULT_MASK_NODATA, GEOJSON_CRS};
pub use outcome::{DiscardReason, FilterResult};
pub use pipeline::{artifact_path, FilterPipeline, FilterStage, TileOutcome, TileState};
pub use rasterize::rasterize;
pub use trim::{trim_nodata, NodataTrimmer};

/// Result type for filter operations.
pub type Result<T> = std::result::Result<T, FilterError>;
