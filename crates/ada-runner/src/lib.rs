//! # ada-runner
//!
//! Drives a disaster imagery run end to end: list an event's tiles, keep the
//! cells covered before and after the event, download them into
//! `pre-event/` and `post-event/`, then filter every tile in place and
//! report what was kept.
//!
//! The `ada` binary is a thin [`clap`] front end over [`download_event`] and
//! [`filter_event`].

pub mod cli;
mod config;
mod download;
mod error;
mod filter;
mod summary;

pub use config::{FilterConfig, FilterOverrides};
pub use download::{
    download_event, tile_path, DownloadOptions, DownloadReport, DEFAULT_DISASTER,
    DEFAULT_MAX_TILES,
};
pub use error::RunnerError;
pub use filter::{build_pipeline, collect_tiles, filter_event, mask_source};
pub use summary::{RunSummary, TileRecord, TileStatus, Totals};

/// Result type for runner operations.
pub type Result<T> = std::result::Result<T, RunnerError>;
