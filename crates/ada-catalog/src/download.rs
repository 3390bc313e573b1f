//! Tile downloads with a single retry.
//!
//! A download streams into `{dest}.part` and is renamed onto `dest` only once
//! the body has been fully written, so an interrupted transfer never leaves a
//! truncated tile where the filter stages would pick it up.

use crate::{CatalogError, Result};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Pause before the second attempt.
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Attempts per tile: the first try plus one retry.
pub const MAX_ATTEMPTS: u32 = 2;

/// Read buffer size for streaming a response body.
const CHUNK_SIZE: usize = 64 * 1024;

/// Progress of one download call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DownloadProgress {
    /// Bytes written so far.
    pub bytes: u64,
    /// Content length, when the server sent one.
    pub total: Option<u64>,
    /// Time since the request was sent.
    pub elapsed: Duration,
}

impl DownloadProgress {
    /// Completion in percent, when the total size is known.
    pub fn percent(&self) -> Option<f64> {
        self.total
            .filter(|&total| total > 0)
            .map(|total| (self.bytes as f64 / total as f64 * 100.0).min(100.0))
    }

    /// Average transfer rate in KiB/s. Elapsed time under a second counts as one.
    pub fn kib_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64().max(1.0);
        self.bytes as f64 / 1024.0 / secs
    }
}

/// Fetches one remote tile to a local path.
pub trait Downloader {
    /// Download `url` to `dest`, returning the number of bytes written.
    ///
    /// `progress` is invoked as the body arrives; it lives only for this call.
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&dyn Fn(&DownloadProgress)>,
    ) -> Result<u64>;
}

/// Run `attempt` up to `attempts` times, sleeping `delay` between failures.
///
/// The closure receives the 1-based attempt number. The last error is wrapped
/// in [`CatalogError::DownloadFailed`].
pub fn with_retry<T, F>(url: &str, attempts: u32, delay: Duration, mut attempt: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let attempts = attempts.max(1);
    let mut last_error = None;

    for n in 1..=attempts {
        match attempt(n) {
            Ok(value) => return Ok(value),
            Err(e) => {
                warn!(url, attempt = n, error = %e, "Download attempt failed");
                last_error = Some(e);
                if n < attempts && !delay.is_zero() {
                    thread::sleep(delay);
                }
            }
        }
    }

    Err(CatalogError::DownloadFailed {
        url: url.to_string(),
        attempts,
        reason: last_error.map(|e| e.to_string()).unwrap_or_default(),
    })
}

/// Path of the partial file written while `dest` downloads.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Copy `body` into `out`, reporting progress after every chunk.
pub fn copy_with_progress<R: Read, W: Write>(
    mut body: R,
    mut out: W,
    total: Option<u64>,
    progress: Option<&dyn Fn(&DownloadProgress)>,
) -> io::Result<u64> {
    let started = Instant::now();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    let mut bytes = 0u64;

    loop {
        let read = match body.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        out.write_all(&buffer[..read])?;
        bytes += read as u64;

        if let Some(report) = progress {
            report(&DownloadProgress {
                bytes,
                total,
                elapsed: started.elapsed(),
            });
        }
    }

    out.flush()?;
    Ok(bytes)
}

/// HTTP downloader with one retry after a fixed pause.
pub struct HttpDownloader {
    client: reqwest::blocking::Client,
    retry_delay: Duration,
}

impl std::fmt::Debug for HttpDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpDownloader")
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl HttpDownloader {
    /// Downloader using [`DEFAULT_RETRY_DELAY`].
    pub fn new() -> Result<Self> {
        // Tiles run to hundreds of megabytes; only the connect phase is bounded.
        let client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(60))
            .timeout(None)
            .build()?;

        Ok(Self {
            client,
            retry_delay: DEFAULT_RETRY_DELAY,
        })
    }

    /// Change the pause before the retry.
    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    /// Pause before the retry.
    pub fn retry_delay(&self) -> Duration {
        self.retry_delay
    }

    fn fetch_once(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&dyn Fn(&DownloadProgress)>,
    ) -> Result<u64> {
        let response = self.client.get(url).send()?;
        if !response.status().is_success() {
            return Err(CatalogError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let total = response.content_length();
        let part = partial_path(dest);
        let file = fs::File::create(&part)?;

        match copy_with_progress(response, io::BufWriter::new(file), total, progress) {
            Ok(bytes) => {
                fs::rename(&part, dest)?;
                Ok(bytes)
            }
            Err(e) => {
                let _ = fs::remove_file(&part);
                Err(e.into())
            }
        }
    }
}

impl Downloader for HttpDownloader {
    fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: Option<&dyn Fn(&DownloadProgress)>,
    ) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }

        debug!(url, dest = %dest.display(), "Downloading tile");
        let bytes = with_retry(url, MAX_ATTEMPTS, self.retry_delay, |_| {
            self.fetch_once(url, dest, progress)
        })?;
        info!(url, bytes, "Downloaded tile");
        Ok(bytes)
    }
}
