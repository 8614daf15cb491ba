//! # postsync-sync
//!
//! Turns a [`postsync_core::SyncSnapshot`] plus a relay store into the
//! Postfix configuration files.
//!
//! - [`SequentialWriter`]: ordered async writer with a high-water mark
//! - [`emit`]: one emitter per generated file
//! - [`Synchronizer`]: runs the emitters concurrently; `Idle → Running →
//!   Completed | Failed`
//! - [`diff_outputs`]: unified diff of a dry run against the files on disk

pub mod cancel;
pub mod diff;
pub mod emit;
pub mod error;
pub mod synchronizer;
pub mod writer;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use diff::{diff_outputs, FileDiff};
pub use emit::FileKind;
pub use error::SyncError;
pub use synchronizer::{FileReport, RenderedFile, SyncReport, SyncState, Synchronizer};
pub use writer::{MemorySink, SequentialWriter, WriteSummary, DEFAULT_HIGH_WATER_MARK};
