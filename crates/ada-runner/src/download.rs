//! Download driver: list, pair, limit, fetch.

use crate::Result;
use ada_catalog::{
    partition, select, CatalogClient, DownloadProgress, Downloader, Phase, Selection, TileLocator,
};
use ada_metrics::{metric_defs, metrics};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Default event name.
pub const DEFAULT_DISASTER: &str = "typhoon-mangkhut";

/// Default per-phase tile cap: effectively unlimited.
pub const DEFAULT_MAX_TILES: usize = 1_000_000;

/// What to download and where.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadOptions {
    /// Event name as used in the catalog.
    pub disaster: String,
    /// Root directory; tiles land in `{dest}/pre-event` and `{dest}/post-event`.
    pub dest: PathBuf,
    /// Pre-event tiles to keep after pairing.
    pub max_pre: usize,
    /// Post-event tiles to keep after pairing.
    pub max_post: usize,
    /// Draw progress bars on the terminal.
    pub show_progress: bool,
}

impl DownloadOptions {
    pub fn new(disaster: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            disaster: disaster.into(),
            dest: dest.into(),
            max_pre: DEFAULT_MAX_TILES,
            max_post: DEFAULT_MAX_TILES,
            show_progress: false,
        }
    }
}

/// What a download run did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadReport {
    /// Tiles selected for download.
    pub selection: Selection,
    /// Local paths written.
    pub downloaded: Vec<PathBuf>,
    /// URLs that stayed unavailable.
    pub failed: Vec<String>,
    /// Total bytes written.
    pub bytes: u64,
}

/// Local path of a tile under `dest`.
pub fn tile_path(dest: &Path, tile: &TileLocator) -> PathBuf {
    dest.join(tile.phase().dir_name()).join(tile.local_name())
}

fn progress_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:>10} [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

fn phase_labels(phase: Phase) -> [(&'static str, String); 1] {
    [("phase", phase.dir_name().to_string())]
}

/// Download every paired tile of an event.
///
/// Only tiles whose cell is covered by both phases are fetched. A tile that
/// stays unavailable after its retry is logged and skipped.
pub fn download_event<C, D>(
    catalog: &C,
    downloader: &D,
    options: &DownloadOptions,
) -> Result<DownloadReport>
where
    C: CatalogClient + ?Sized,
    D: Downloader + ?Sized,
{
    let (pre, post) = partition(catalog.list_tiles(&options.disaster)?);
    metrics::counter!(metric_defs::TILES_LISTED.name, &phase_labels(Phase::Pre))
        .increment(pre.len() as u64);
    metrics::counter!(metric_defs::TILES_LISTED.name, &phase_labels(Phase::Post))
        .increment(post.len() as u64);

    let selection = select(&pre, &post).limit(options.max_pre, options.max_post);
    info!(
        disaster = %options.disaster,
        listed_pre = pre.len(),
        listed_post = post.len(),
        selected_pre = selection.pre.len(),
        selected_post = selection.post.len(),
        "Paired tiles by cell"
    );
    if selection.is_empty() {
        warn!(disaster = %options.disaster, "No cell has both pre- and post-event imagery");
    }

    for phase in [Phase::Pre, Phase::Post] {
        fs::create_dir_all(options.dest.join(phase.dir_name()))?;
    }

    let multi = MultiProgress::new();
    let mut report = DownloadReport::default();
    for (phase, tiles) in [(Phase::Pre, &selection.pre), (Phase::Post, &selection.post)] {
        metrics::counter!(metric_defs::TILES_SELECTED.name, &phase_labels(phase))
            .increment(tiles.len() as u64);

        let bar = if options.show_progress {
            multi.add(ProgressBar::new(tiles.len() as u64))
        } else {
            ProgressBar::hidden()
        };
        bar.set_style(progress_style());
        bar.set_prefix(phase.dir_name());

        for tile in tiles.iter() {
            let dest = tile_path(&options.dest, tile);
            let on_progress: &dyn Fn(&DownloadProgress) = &|progress| {
                let percent = progress
                    .percent()
                    .map(|p| format!("{p:.0}%"))
                    .unwrap_or_else(|| format!("{} KiB", progress.bytes / 1024));
                bar.set_message(format!(
                    "{} {percent} {:.0} KiB/s",
                    tile.local_name(),
                    progress.kib_per_sec()
                ));
            };

            match downloader.fetch(tile.url(), &dest, Some(on_progress)) {
                Ok(bytes) => {
                    metrics::counter!(metric_defs::TILES_DOWNLOADED.name, &phase_labels(phase))
                        .increment(1);
                    metrics::counter!(metric_defs::BYTES_DOWNLOADED.name, &phase_labels(phase))
                        .increment(bytes);
                    report.bytes += bytes;
                    report.downloaded.push(dest);
                }
                Err(e) => {
                    metrics::counter!(metric_defs::DOWNLOAD_FAILURES.name, &phase_labels(phase))
                        .increment(1);
                    warn!(url = tile.url(), error = %e, "Tile unavailable, skipping");
                    report.failed.push(tile.url().to_string());
                }
            }
            bar.inc(1);
        }
        bar.finish_with_message("done");
    }

    info!(
        downloaded = report.downloaded.len(),
        failed = report.failed.len(),
        bytes = report.bytes,
        "Download finished"
    );
    report.selection = selection;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ada_catalog::CatalogError;
    use std::cell::RefCell;
    use tempfile::TempDir;

    const BASE: &str = "https://example.org/events/flood";

    struct FakeCatalog(Vec<&'static str>);

    impl CatalogClient for FakeCatalog {
        fn list_tiles(&self, _disaster: &str) -> ada_catalog::Result<Vec<TileLocator>> {
            self.0
                .iter()
                .map(|path| TileLocator::parse(&format!("{BASE}/{path}")))
                .collect()
        }
    }

    /// Writes the URL as the file body; URLs containing "broken" fail.
    #[derive(Default)]
    struct FakeDownloader {
        requested: RefCell<Vec<String>>,
    }

    impl Downloader for FakeDownloader {
        fn fetch(
            &self,
            url: &str,
            dest: &Path,
            progress: Option<&dyn Fn(&DownloadProgress)>,
        ) -> ada_catalog::Result<u64> {
            self.requested.borrow_mut().push(url.to_string());
            if url.contains("broken") {
                return Err(CatalogError::DownloadFailed {
                    url: url.to_string(),
                    attempts: 2,
                    reason: "HTTP 404".to_string(),
                });
            }
            fs::write(dest, url)?;
            if let Some(report) = progress {
                report(&DownloadProgress {
                    bytes: url.len() as u64,
                    total: Some(url.len() as u64),
                    elapsed: std::time::Duration::from_millis(5),
                });
            }
            Ok(url.len() as u64)
        }
    }

    #[test]
    fn test_downloads_paired_tiles_only() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let catalog = FakeCatalog(vec![
            "pre-event/2018-01-01/1040/120.tif",
            "pre-event/2018-01-01/1040/121.tif",
            "post-event/2018-09-20/1050/120.tif",
        ]);
        let downloader = FakeDownloader::default();
        let options = DownloadOptions::new("flood", dir.path());

        let report = download_event(&catalog, &downloader, &options).unwrap();
        assert_eq!(report.downloaded.len(), 2);
        assert!(report.failed.is_empty());
        assert!(dir.path().join("pre-event/1040-120.tif").exists());
        assert!(dir.path().join("post-event/1050-120.tif").exists());
        assert!(!dir.path().join("pre-event/1040-121.tif").exists());
        assert_eq!(downloader.requested.borrow().len(), 2);
    }

    #[test]
    fn test_unavailable_tile_is_skipped() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let catalog = FakeCatalog(vec![
            "pre-event/d/broken/7.tif",
            "pre-event/d/ok/8.tif",
            "post-event/d/ok/7.tif",
            "post-event/d/ok/8.tif",
        ]);
        let downloader = FakeDownloader::default();
        let report =
            download_event(&catalog, &downloader, &DownloadOptions::new("flood", dir.path()))
                .unwrap();

        assert_eq!(report.failed, vec![format!("{BASE}/pre-event/d/broken/7.tif")]);
        assert_eq!(report.downloaded.len(), 3);
        assert_eq!(report.selection.pre.len(), 2);
    }

    #[test]
    fn test_limits_per_phase() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let catalog = FakeCatalog(vec![
            "pre-event/d/a/1.tif",
            "pre-event/d/a/2.tif",
            "post-event/d/b/1.tif",
            "post-event/d/b/2.tif",
        ]);
        let options = DownloadOptions {
            max_pre: 1,
            max_post: 0,
            ..DownloadOptions::new("flood", dir.path())
        };
        let report = download_event(&catalog, &FakeDownloader::default(), &options).unwrap();
        assert_eq!(report.downloaded, vec![dir.path().join("pre-event/a-1.tif")]);
        assert!(dir.path().join("post-event").is_dir());
    }

    #[test]
    fn test_tile_path() {
        let tile = TileLocator::parse(&format!("{BASE}/post-event/2018-09-20/1050/120.tif")).unwrap();
        assert_eq!(
            tile_path(Path::new("input"), &tile),
            PathBuf::from("input/post-event/1050-120.tif")
        );
    }
}
