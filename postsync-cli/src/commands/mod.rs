pub mod diff;
pub mod domain;
pub mod relay;
pub mod sync;
pub mod user;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;

use postsync_core::{config, AppConfig, MapMode, SyncSnapshot};
use postsync_store::{Repository, SqlRepository};
use postsync_sync::Synchronizer;

/// Options shared by every command.
#[derive(Debug, Clone)]
pub struct Globals {
    pub config: Option<PathBuf>,
}

/// Output overrides shared by `sync`, `watch` and `diff`.
#[derive(Args, Debug, Clone, Default)]
pub struct OutputArgs {
    /// Directory to write into (overrides output.dir / POSTFIXCONFPATH).
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Materialize the lookup maps as static tables.
    #[arg(long)]
    pub pre_rendered: bool,

    /// Also emit disabled and deleted relays.
    #[arg(long)]
    pub include_disabled: bool,

    /// Directory of `.tera` overrides for main.cf.
    #[arg(long, value_name = "DIR")]
    pub templates: Option<PathBuf>,
}

impl OutputArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(dir) = &self.output {
            config.output.dir = dir.clone();
        }
        if self.pre_rendered {
            config.output.mode = MapMode::PreRendered;
        }
        if self.include_disabled {
            config.output.include_disabled = true;
        }
    }
}

pub fn load_config(globals: &Globals) -> Result<AppConfig> {
    let env = |key: &str| std::env::var(key).ok();
    let loaded = match &globals.config {
        Some(path) => config::load_at_with_env(path, env),
        None => config::load_with_env(env),
    };
    loaded.context("failed to load configuration")
}

pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn Repository>> {
    let uri = config.db_uri().context("store is not configured")?;
    let repo = SqlRepository::connect(uri)
        .await
        .context("failed to open relay store")?;
    Ok(Arc::new(repo))
}

/// Config, snapshot, store and synchronizer for the output commands.
pub async fn prepare(
    globals: &Globals,
    output: &OutputArgs,
) -> Result<(Synchronizer, Arc<dyn Repository>)> {
    let mut config = load_config(globals)?;
    output.apply(&mut config);
    let snapshot: SyncSnapshot = config.snapshot().context("invalid configuration")?;
    let store = open_store(&config).await?;

    let mut synchronizer = Synchronizer::new(snapshot, store.clone());
    if let Some(dir) = &output.templates {
        synchronizer = synchronizer.with_templates(dir);
    }
    Ok((synchronizer, store))
}
