//! # ada-catalog
//!
//! Discovery and acquisition of Maxar Open Data tiles for a disaster event.
//!
//! ## Overview
//!
//! - [`TileLocator`] parses a listing entry once into its cell identifier,
//!   [`Phase`] and category.
//! - [`select`] keeps only the ground cells imaged both before and after the
//!   event; [`partition`] splits a mixed listing by phase first.
//! - [`CatalogClient`] lists an event's tiles; [`HttpCatalog`] reads the Maxar
//!   index pages.
//! - [`Downloader`] fetches a tile; [`HttpDownloader`] retries once after a
//!   pause and reports [`DownloadProgress`] to a per-call callback.
//!
//! ## Example
//!
//! ```no_run
//! use ada_catalog::{partition, select, CatalogClient, HttpCatalog};
//!
//! let catalog = HttpCatalog::new()?;
//! let (pre, post) = partition(catalog.list_tiles("hurricane-michael")?);
//! let paired = select(&pre, &post).limit(10, 10);
//! for tile in paired.pre.iter().chain(&paired.post) {
//!     println!("{} -> {}/{}", tile.url(), tile.phase(), tile.local_name());
//! }
//! # Ok::<(), ada_catalog::CatalogError>(())
//! ```

mod client;
mod download;
mod error;
mod locator;
mod selector;

pub use client::{disaster_slug, CatalogClient, HttpCatalog, ListingParser, DEFAULT_CATALOG_URL};
pub use download::{
    copy_with_progress, partial_path, with_retry, DownloadProgress, Downloader, HttpDownloader,
    DEFAULT_RETRY_DELAY, MAX_ATTEMPTS,
};
pub use error::CatalogError;
pub use locator::{Phase, TileLocator, TILE_SUFFIX};
pub use selector::{partition, select, Selection};

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
