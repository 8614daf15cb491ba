//! `postsync watch`: periodic re-sync until SIGINT or SIGTERM.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;

use postsync_sync::{cancel_pair, SyncError};

use super::{prepare, sync::print_report, Globals, OutputArgs};

/// Arguments for `postsync watch`.
#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Seconds between runs.
    #[arg(long, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub interval: u64,

    #[command(flatten)]
    pub output: OutputArgs,
}

impl WatchArgs {
    pub async fn run(self, globals: &Globals) -> Result<()> {
        let (synchronizer, store) = prepare(globals, &self.output).await?;
        let (handle, signal) = cancel_pair();

        // Installed before the first run so an early signal is never missed.
        let mut shutdown = Shutdown::install().context("failed to install signal handlers")?;
        tokio::spawn(async move {
            let name = shutdown.recv().await;
            tracing::info!(signal = name, "received shutdown signal, stopping");
            handle.cancel();
        });

        let interval = Duration::from_secs(self.interval);
        let mut stop = signal.clone();
        tracing::info!(interval_secs = self.interval, "watch started");

        loop {
            match synchronizer.run_with_cancel(signal.clone()).await {
                Ok(report) => print_report(&report),
                Err(SyncError::Cancelled) => break,
                // A failed run is retried on the next tick.
                Err(err) => tracing::error!(error = %err, "sync run failed"),
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = stop.cancelled() => break,
            }
        }

        store.close().await;
        tracing::info!("watch stopped, store closed");
        Ok(())
    }
}

/// Process stop signals: SIGINT and SIGTERM on unix, ctrl-c elsewhere.
struct Shutdown {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Shutdown {
    #[cfg(unix)]
    fn install() -> std::io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    fn install() -> std::io::Result<Self> {
        Ok(Self {})
    }

    /// Resolves with the name of the first signal received.
    #[cfg(unix)]
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
        }
    }

    #[cfg(not(unix))]
    async fn recv(&mut self) -> &'static str {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "ctrl-c handler failed");
            std::future::pending::<()>().await;
        }
        "ctrl-c"
    }
}
