//! Error types for postsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use postsync_core::ConfigError;
use postsync_renderer::RenderError;
use postsync_store::StoreError;

/// Everything that can end a sync run. Every variant is fatal to the run
/// that raised it.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("render error: {0}")]
    Render(#[from] RenderError),

    /// The sink rejected a write, flush or close.
    #[error("write failed for {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Write attempted on a writer that already failed.
    #[error("writer for {path} is closed after an earlier failure")]
    Closed { path: PathBuf },

    #[error("sync cancelled")]
    Cancelled,

    /// `run` called while another run on the same synchronizer is in flight.
    #[error("a sync run is already in progress")]
    AlreadyRunning,

    /// An I/O error outside the writers, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}
