//! Synchronizer: runs the three emitters and defines the outcome of a run.
//!
//! ```text
//!            run()                  all emitters Ok
//!   Idle ──────────────▶ Running ─────────────────▶ Completed
//!    ▲                      │
//!    │                      │ first failure (completion order)
//!    │                      ▼
//!    └── (re-run allowed) Failed
//! ```
//!
//! The emitters are polled concurrently on the calling task. A failing
//! emitter does not stop the others; files they wrote stay on disk.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use futures::FutureExt;
use serde::Serialize;

use postsync_core::{MapMode, SyncSnapshot};
use postsync_renderer::TemplateEngine;
use postsync_store::Repository;

use crate::cancel::CancelSignal;
use crate::emit::{emit, EmitContext, FileKind};
use crate::error::{io_err, SyncError};
use crate::writer::{MemorySink, SequentialWriter};

/// Lifecycle of a [`Synchronizer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Idle,
    Running,
    Completed,
    Failed,
}

/// One written file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileReport {
    pub kind: FileKind,
    pub path: PathBuf,
    pub bytes: u64,
    pub lines: u64,
}

/// Outcome of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub mode: MapMode,
    /// Ordered by [`FileKind`].
    pub files: Vec<FileReport>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// A file rendered in memory by [`Synchronizer::preview`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedFile {
    pub kind: FileKind,
    /// Where `run` would write it.
    pub path: PathBuf,
    pub contents: String,
}

pub struct Synchronizer {
    snapshot: SyncSnapshot,
    repository: Arc<dyn Repository>,
    template_dir: Option<PathBuf>,
    state: Mutex<SyncState>,
}

impl Synchronizer {
    pub fn new(snapshot: SyncSnapshot, repository: Arc<dyn Repository>) -> Self {
        Self {
            snapshot,
            repository,
            template_dir: None,
            state: Mutex::new(SyncState::Idle),
        }
    }

    /// Use `.tera` overrides from `dir` for `main.cf`.
    pub fn with_templates(mut self, dir: impl Into<PathBuf>) -> Self {
        self.template_dir = Some(dir.into());
        self
    }

    pub fn snapshot(&self) -> &SyncSnapshot {
        &self.snapshot
    }

    pub fn state(&self) -> SyncState {
        *self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_state(&self, next: SyncState) {
        *self.state.lock().unwrap_or_else(|p| p.into_inner()) = next;
    }

    /// Move to `Running` unless a run is already in flight.
    fn begin(&self) -> Result<(), SyncError> {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        if *state == SyncState::Running {
            return Err(SyncError::AlreadyRunning);
        }
        *state = SyncState::Running;
        Ok(())
    }

    /// Path `kind` is written to.
    pub fn output_path(&self, kind: FileKind) -> PathBuf {
        self.snapshot
            .output_dir
            .join(kind.file_name(self.snapshot.map_mode))
    }

    /// Run once with no way to cancel.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        self.run_with_cancel(CancelSignal::never()).await
    }

    /// Write all three files.
    pub async fn run_with_cancel(&self, cancel: CancelSignal) -> Result<SyncReport, SyncError> {
        self.begin()?;
        let started = Instant::now();
        tracing::info!(
            mode = %self.snapshot.map_mode,
            dir = %self.snapshot.output_dir.display(),
            "sync started"
        );

        let outcome = self.write_all(&cancel).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(files) => {
                self.set_state(SyncState::Completed);
                tracing::info!(files = files.len(), duration_ms, "sync completed");
                Ok(SyncReport {
                    mode: self.snapshot.map_mode,
                    files,
                    duration_ms,
                    finished_at: Utc::now(),
                })
            }
            Err(err) => {
                self.set_state(SyncState::Failed);
                tracing::error!(error = %err, duration_ms, "sync failed");
                Err(err)
            }
        }
    }

    async fn write_all(&self, cancel: &CancelSignal) -> Result<Vec<FileReport>, SyncError> {
        let engine = TemplateEngine::new(self.template_dir.as_deref())?;
        let dir = &self.snapshot.output_dir;
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| io_err(dir, e))?;

        let ctx = EmitContext {
            snapshot: &self.snapshot,
            repository: self.repository.as_ref(),
            engine: &engine,
            cancel,
        };
        let ctx = &ctx;
        let high_water_mark = self.snapshot.write_buffer;

        let pending: FuturesUnordered<_> = FileKind::ALL
            .into_iter()
            .map(|kind| {
                let path = self.output_path(kind);
                async move {
                    let writer = SequentialWriter::create(&path, high_water_mark).await?;
                    let summary = emit(kind, ctx, writer).await?;
                    Ok::<_, SyncError>(FileReport {
                        kind,
                        path,
                        bytes: summary.bytes,
                        lines: summary.lines,
                    })
                }
                .map(move |result| (kind, result))
            })
            .collect();

        let (mut files, first_error) = collect_outcomes(pending).await;
        if let Some(err) = first_error {
            return Err(err);
        }
        files.sort_by_key(|f| f.kind);
        Ok(files)
    }

    /// Render all three files in memory without touching the output
    /// directory or the synchronizer state.
    pub async fn preview(&self) -> Result<Vec<RenderedFile>, SyncError> {
        let engine = TemplateEngine::new(self.template_dir.as_deref())?;
        let cancel = CancelSignal::never();
        let ctx = EmitContext {
            snapshot: &self.snapshot,
            repository: self.repository.as_ref(),
            engine: &engine,
            cancel: &cancel,
        };
        let ctx = &ctx;
        let high_water_mark = self.snapshot.write_buffer;

        let pending: FuturesUnordered<_> = FileKind::ALL
            .into_iter()
            .map(|kind| {
                let path = self.output_path(kind);
                async move {
                    let sink = MemorySink::new();
                    let writer = SequentialWriter::new(sink.clone(), &path, high_water_mark);
                    emit(kind, ctx, writer).await?;
                    Ok::<_, SyncError>(RenderedFile {
                        kind,
                        path,
                        contents: sink.contents_lossy(),
                    })
                }
                .map(move |result| (kind, result))
            })
            .collect();

        let (mut files, first_error) = collect_outcomes(pending).await;
        if let Some(err) = first_error {
            return Err(err);
        }
        files.sort_by_key(|f| f.kind);
        Ok(files)
    }
}

/// Drain every emitter; keep successes and the first error to arrive.
async fn collect_outcomes<S, T>(mut pending: S) -> (Vec<T>, Option<SyncError>)
where
    S: futures::Stream<Item = (FileKind, Result<T, SyncError>)> + Unpin,
{
    let mut done = Vec::new();
    let mut first_error = None;
    while let Some((kind, result)) = pending.next().await {
        match result {
            Ok(item) => done.push(item),
            Err(err) => {
                tracing::warn!(file = %kind, error = %err, "emitter failed");
                if first_error.is_none() {
                    first_error = Some(err);
                }
            }
        }
    }
    (done, first_error)
}

