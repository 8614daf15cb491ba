//! Error types for postsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or validating configuration.
///
/// All of these are fatal at startup: a sync run never starts with a
/// configuration that failed validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No store URI in the environment or the config file.
    #[error("no database URI configured; set DBURI or db.uri")]
    MissingUri,

    /// The store URI could not be parsed into a connection descriptor.
    #[error("invalid database URI: {reason}")]
    InvalidUri { reason: String },

    /// `output.page_size` must be at least 1.
    #[error("page size must be greater than zero")]
    InvalidPageSize,

    /// Unknown value for the map mode.
    #[error("invalid map mode: {0}")]
    InvalidMode(String),

    /// Config file exists but is not valid YAML for [`crate::AppConfig`].
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// Underlying I/O failure reading the config file.
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
