//! `postsync diff`: show unified diffs for what sync would write.

use anyhow::{Context, Result};
use clap::Args;

use postsync_sync::diff_outputs;

use super::{prepare, Globals, OutputArgs};

/// Arguments for `postsync diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub output: OutputArgs,
}

impl DiffArgs {
    pub async fn run(self, globals: &Globals) -> Result<()> {
        let (synchronizer, store) = prepare(globals, &self.output).await?;
        let outcome = diff_outputs(&synchronizer).await;
        store.close().await;
        let diffs = outcome.context("diff failed")?;

        if diffs.is_empty() {
            println!(
                "No differences in {}.",
                synchronizer.snapshot().output_dir.display()
            );
            return Ok(());
        }

        for diff in diffs {
            print!("{}", diff.unified_diff);
            if !diff.unified_diff.ends_with('\n') {
                println!();
            }
        }

        Ok(())
    }
}
