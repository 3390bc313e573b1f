//! Error types for the runner.

use thiserror::Error;

/// Errors that can stop a download or filter run.
#[derive(Debug, Error)]
pub enum RunnerError {
    /// Configuration is inconsistent or incomplete.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file is not valid YAML for [`FilterConfig`](crate::FilterConfig).
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Run summary could not be serialized.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Listing or downloading failed.
    #[error("Catalog error: {0}")]
    Catalog(#[from] ada_catalog::CatalogError),

    /// Loading the mask or deriving a country subset failed.
    #[error("Filter error: {0}")]
    Filter(#[from] ada_filter::FilterError),

    /// File system error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
