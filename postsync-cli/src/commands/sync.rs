//! `postsync sync`: write main.cf and the lookup maps once.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use postsync_sync::SyncReport;

use super::{prepare, Globals, OutputArgs};

/// Arguments for `postsync sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    #[command(flatten)]
    pub output: OutputArgs,

    /// Print the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub async fn run(self, globals: &Globals) -> Result<()> {
        let (synchronizer, store) = prepare(globals, &self.output).await?;
        let outcome = synchronizer.run().await;
        store.close().await;
        let report = outcome.context("sync failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report")?
            );
        } else {
            print_report(&report);
        }
        Ok(())
    }
}

pub fn print_report(report: &SyncReport) {
    println!(
        "{} synced {} files ({} maps) in {} ms",
        "✓".green(),
        report.files.len(),
        report.mode,
        report.duration_ms
    );
    for file in &report.files {
        println!(
            "  ✎  {} ({} lines, {} bytes)",
            file.path.display(),
            file.lines,
            file.bytes
        );
    }
}
