//! Sequential writer with backpressure.
//!
//! ## Contract
//!
//! 1. `write` appends to an in-memory buffer and resolves once the chunk is
//!    accepted.
//! 2. When the buffer reaches the high-water mark, the same `write` future
//!    also drains the whole buffer into the sink before resolving. A sink
//!    that keeps returning `Pending` keeps the write pending.
//! 3. `&mut self` on every write: chunks are never reordered or interleaved.
//! 4. `end` consumes the writer, drains, flushes and shuts the sink down.
//! 5. The first sink error is returned as [`SyncError::Write`]; after that
//!    the writer refuses further writes with [`SyncError::Closed`]. There is
//!    no retry.

use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};

use serde::Serialize;
use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{io_err, SyncError};

/// Default high-water mark (64 KiB).
pub const DEFAULT_HIGH_WATER_MARK: usize = 64 * 1024;

/// Totals reported by [`SequentialWriter::end`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteSummary {
    pub label: PathBuf,
    pub bytes: u64,
    pub lines: u64,
}

/// Ordered, buffered writer over an async sink.
pub struct SequentialWriter<W> {
    inner: W,
    label: PathBuf,
    buf: Vec<u8>,
    high_water_mark: usize,
    bytes: u64,
    lines: u64,
    failed: bool,
}

impl SequentialWriter<File> {
    /// Open `path` for writing, truncating any previous content.
    pub async fn create(path: impl AsRef<Path>, high_water_mark: usize) -> Result<Self, SyncError> {
        let path = path.as_ref();
        let file = File::create(path).await.map_err(|e| io_err(path, e))?;
        tracing::debug!(path = %path.display(), high_water_mark, "writer opened");
        Ok(Self::new(file, path, high_water_mark))
    }
}

impl<W: AsyncWrite + Unpin> SequentialWriter<W> {
    /// Wrap an arbitrary sink. `label` names the sink in errors and summaries.
    pub fn new(inner: W, label: impl Into<PathBuf>, high_water_mark: usize) -> Self {
        let high_water_mark = high_water_mark.max(1);
        Self {
            inner,
            label: label.into(),
            buf: Vec::with_capacity(high_water_mark.min(DEFAULT_HIGH_WATER_MARK)),
            high_water_mark,
            bytes: 0,
            lines: 0,
            failed: false,
        }
    }

    pub fn label(&self) -> &Path {
        &self.label
    }

    /// Bytes accepted but not yet handed to the sink.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Queue `chunk`; drains to the sink first if the buffer is saturated.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<(), SyncError> {
        self.accept(chunk)?;
        self.drain_if_saturated().await
    }

    /// `line` followed by `\n`, counted as one line.
    pub async fn write_line(&mut self, line: &str) -> Result<(), SyncError> {
        self.accept(line.as_bytes())?;
        self.accept(b"\n")?;
        self.lines += 1;
        self.drain_if_saturated().await
    }

    /// Drain, flush and close the sink.
    ///
    /// A writer that already failed is still shut down, but the result is
    /// [`SyncError::Closed`] since the earlier error is the one that counts.
    pub async fn end(mut self) -> Result<WriteSummary, SyncError> {
        if self.failed {
            let _ = self.inner.shutdown().await;
            return Err(SyncError::Closed { path: self.label });
        }

        self.drain().await?;
        if let Err(source) = self.inner.shutdown().await {
            return Err(SyncError::Write {
                path: self.label,
                source,
            });
        }

        tracing::debug!(
            path = %self.label.display(),
            bytes = self.bytes,
            lines = self.lines,
            "writer closed"
        );
        Ok(WriteSummary {
            label: self.label,
            bytes: self.bytes,
            lines: self.lines,
        })
    }

    fn accept(&mut self, chunk: &[u8]) -> Result<(), SyncError> {
        if self.failed {
            return Err(SyncError::Closed {
                path: self.label.clone(),
            });
        }
        self.buf.extend_from_slice(chunk);
        self.bytes += chunk.len() as u64;
        Ok(())
    }

    async fn drain_if_saturated(&mut self) -> Result<(), SyncError> {
        if self.buf.len() >= self.high_water_mark {
            self.drain().await?;
        }
        Ok(())
    }

    async fn drain(&mut self) -> Result<(), SyncError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        if let Err(source) = self.inner.write_all(&self.buf).await {
            self.failed = true;
            tracing::warn!(path = %self.label.display(), error = %source, "sink write failed");
            return Err(SyncError::Write {
                path: self.label.clone(),
                source,
            });
        }
        self.buf.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemorySink
// ---------------------------------------------------------------------------

/// Shared in-memory sink. Clones see the same bytes, so the contents stay
/// readable after the writer that owned one clone has been ended.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    data: Arc<Mutex<Vec<u8>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn contents(&self) -> Vec<u8> {
        self.lock().clone()
    }

    pub fn contents_lossy(&self) -> String {
        String::from_utf8_lossy(&self.lock()).into_owned()
    }
}

impl AsyncWrite for MemorySink {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.lock().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}
