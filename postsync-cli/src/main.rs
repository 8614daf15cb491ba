//! postsync: keeps Postfix relay configuration in step with the relay store.
//!
//! # Usage
//!
//! ```text
//! postsync [--config PATH] [--log-json] sync [--output DIR] [--pre-rendered] [--include-disabled] [--json]
//! postsync watch [--interval SECS]
//! postsync diff
//! postsync relay list [--all] | add <alias> <destination> | enable|disable|remove <alias>
//! postsync domain list [--user ID] | add <name> [--user ID] | remove <name>
//! postsync user login <external-id> <name> | admin <id> --grant|--revoke | list
//! ```

mod commands;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use commands::{
    diff::DiffArgs, domain::DomainCommand, relay::RelayCommand, sync::SyncArgs,
    user::UserCommand, watch::WatchArgs, Globals,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "postsync",
    version,
    about = "Generate Postfix relay configuration from the relay store",
    long_about = None,
)]
struct Cli {
    /// YAML config file (default: $CONFIG or config/config.yaml). JSON5
    /// files from older deployments must be converted.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write main.cf and the lookup maps once.
    Sync(SyncArgs),

    /// Re-sync on an interval until interrupted.
    Watch(WatchArgs),

    /// Show unified diff of what sync would write.
    Diff(DiffArgs),

    /// Manage relays.
    Relay {
        #[command(subcommand)]
        command: RelayCommand,
    },

    /// Manage virtual domains.
    Domain {
        #[command(subcommand)]
        command: DomainCommand,
    },

    /// Manage users.
    User {
        #[command(subcommand)]
        command: UserCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let globals = Globals { config: cli.config };
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async move {
        match cli.command {
            Commands::Sync(args) => args.run(&globals).await,
            Commands::Watch(args) => args.run(&globals).await,
            Commands::Diff(args) => args.run(&globals).await,
            Commands::Relay { command } => commands::relay::run(command, &globals).await,
            Commands::Domain { command } => commands::domain::run(command, &globals).await,
            Commands::User { command } => commands::user::run(command, &globals).await,
        }
    })
}
