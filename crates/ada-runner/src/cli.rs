//! Command-line interface of the `ada` binary.

use crate::config::{FilterConfig, FilterOverrides};
use crate::download::{DownloadOptions, DEFAULT_DISASTER, DEFAULT_MAX_TILES};
use crate::{download_event, filter_event, Result, RunSummary};
use ada_catalog::{HttpCatalog, HttpDownloader, DEFAULT_CATALOG_URL};
use ada_filter::BoundingBox;
use clap::{Args, Parser, Subcommand};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Parse a bounding box in format "min_x,min_y,max_x,max_y"
fn parse_bbox(s: &str) -> std::result::Result<BoundingBox, String> {
    s.parse().map_err(|e: ada_filter::FilterError| e.to_string())
}

/// Download and filter satellite imagery of a disaster event
#[derive(Parser, Debug)]
#[command(name = "ada")]
#[command(about = "Download paired pre/post-event imagery and filter it to populated areas")]
#[command(version)]
pub struct Cli {
    /// Log filter (e.g. "info", "ada_filter=debug"); overrides RUST_LOG
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List, pair and download the tiles of an event
    Download(DownloadArgs),

    /// Filter downloaded tiles in place
    Filter {
        /// Event directory holding pre-event/ and post-event/
        #[arg(long)]
        dir: PathBuf,

        #[command(flatten)]
        filter: FilterArgs,
    },

    /// Download, then filter the downloaded tiles
    Run {
        #[command(flatten)]
        download: DownloadArgs,

        #[command(flatten)]
        filter: FilterArgs,
    },
}

/// Options of the download step
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Name of the disaster
    #[arg(long, default_value = DEFAULT_DISASTER)]
    pub disaster: String,

    /// Destination directory
    #[arg(long, default_value = "input")]
    pub dest: PathBuf,

    /// Max number of pre-disaster images
    #[arg(long, default_value_t = DEFAULT_MAX_TILES)]
    pub maxpre: usize,

    /// Max number of post-disaster images
    #[arg(long, default_value_t = DEFAULT_MAX_TILES)]
    pub maxpost: usize,

    /// Pause before retrying a failed download
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub retry_delay_secs: u64,

    /// Base URL of the event pages
    #[arg(long, default_value = DEFAULT_CATALOG_URL)]
    pub catalog_url: String,
}

/// Options of the filter step
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// YAML config file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Crop to this ground rectangle (format: "min_x,min_y,max_x,max_y")
    #[arg(long, value_parser = parse_bbox, allow_hyphen_values = true)]
    pub bbox: Option<BoundingBox>,

    /// Night-lights mask GeoJSON
    #[arg(long)]
    pub mask: Option<PathBuf>,

    /// Restrict the mask to this country
    #[arg(long)]
    pub country: Option<String>,

    /// National boundaries GeoJSON
    #[arg(long)]
    pub boundaries: Option<PathBuf>,

    /// Boundary property holding the country name
    #[arg(long)]
    pub country_property: Option<String>,

    /// Directory for derived country masks
    #[arg(long)]
    pub cache_dir: Option<PathBuf>,

    /// Skip the bounding-box stage
    #[arg(long)]
    pub no_bbox: bool,

    /// Skip the mask stage
    #[arg(long)]
    pub no_mask: bool,

    /// Write a JSON run summary here
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

impl DownloadArgs {
    pub fn options(&self) -> DownloadOptions {
        DownloadOptions {
            max_pre: self.maxpre,
            max_post: self.maxpost,
            show_progress: std::io::stderr().is_terminal(),
            ..DownloadOptions::new(self.disaster.as_str(), self.dest.as_path())
        }
    }

    /// Fetch the event over HTTP.
    pub fn execute(&self) -> Result<()> {
        let catalog = HttpCatalog::with_base_url(self.catalog_url.as_str())?;
        let downloader =
            HttpDownloader::new()?.with_retry_delay(Duration::from_secs(self.retry_delay_secs));
        download_event(&catalog, &downloader, &self.options())?;
        Ok(())
    }
}

impl FilterArgs {
    pub fn overrides(&self) -> FilterOverrides {
        FilterOverrides {
            bbox: self.bbox,
            mask_path: self.mask.clone(),
            boundaries_path: self.boundaries.clone(),
            country: self.country.clone(),
            country_property: self.country_property.clone(),
            cache_dir: self.cache_dir.clone(),
            no_bbox: self.no_bbox,
            no_mask: self.no_mask,
        }
    }

    /// Config file plus flags.
    pub fn resolve(&self) -> Result<FilterConfig> {
        FilterConfig::resolve(self.config.as_deref(), self.overrides())
    }

    /// Filter `dir` and write the summary if asked to.
    pub fn execute(&self, dir: &Path) -> Result<RunSummary> {
        let config = self.resolve()?;
        let summary = filter_event(dir, &config)?;
        if let Some(path) = &self.summary {
            summary.write(path)?;
            info!(path = %path.display(), "Wrote run summary");
        }
        Ok(summary)
    }
}

impl Command {
    pub fn execute(&self) -> Result<()> {
        match self {
            Command::Download(download) => download.execute(),
            Command::Filter { dir, filter } => filter.execute(dir).map(|_| ()),
            Command::Run { download, filter } => {
                // Fail on a bad config before spending time downloading
                filter.resolve()?;
                download.execute()?;
                filter.execute(&download.dest).map(|_| ())
            }
        }
    }
}
