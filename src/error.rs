//! Error type for the I/O and pipeline layers.
//!
//! Statistical routines return `Option` and never produce this type; it is
//! reserved for loading inputs, validating configuration and writing outputs.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading inputs, running the pipeline or writing outputs.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to fetch {url}: {source}")]
    Fetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{input} CSV error: {source}")]
    Csv {
        input: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("{input} header invalid: {message}")]
    InvalidHeader {
        input: &'static str,
        message: String,
    },

    #[error("{input} data row {row_index} invalid: {message}")]
    DataRow {
        input: &'static str,
        row_index: usize,
        message: String,
    },

    #[error("{input} did not contain any usable rows")]
    EmptyData { input: &'static str },

    #[error("no wind records for year {year}")]
    EmptyYear { year: i32 },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse config {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("{step} failed: {reason}")]
    Fit { step: &'static str, reason: String },

    #[error("failed to render plot: {0}")]
    Plot(String),

    #[error("failed to serialize summary: {0}")]
    Json(#[from] serde_json::Error),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error in {path}: {message}")]
    NetCdf { path: PathBuf, message: String },
}

/// Result alias for the I/O and pipeline layers.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn fit(step: &'static str, reason: impl Into<String>) -> Self {
        Error::Fit {
            step,
            reason: reason.into(),
        }
    }
}
