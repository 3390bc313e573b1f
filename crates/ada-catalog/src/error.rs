//! Error types for the catalog crate.

use thiserror::Error;

/// Errors that can occur when listing or downloading tiles.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// HTTP request error.
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    /// Server answered with a non-success status.
    #[error("HTTP {status} for {url}")]
    HttpStatus {
        /// Requested URL.
        url: String,
        /// Response status code.
        status: u16,
    },

    /// Listing pattern failed to compile.
    #[error("Invalid listing pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A listing entry does not follow the catalog's path layout.
    #[error("Invalid tile locator '{locator}': {reason}")]
    InvalidLocator {
        /// The offending entry.
        locator: String,
        /// Why it was rejected.
        reason: String,
    },

    /// I/O error writing a downloaded tile.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Download still failing after every retry.
    #[error("Failed to download {url} after {attempts} attempts: {reason}")]
    DownloadFailed {
        /// Tile URL.
        url: String,
        /// Number of attempts made.
        attempts: u32,
        /// Last failure.
        reason: String,
    },
}
