//! `postsync relay`: manage relay aliases.

use anyhow::{bail, ensure, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use postsync_core::{NewRelay, RelayRecord, RelayUpdate, UserId};
use postsync_store::Repository;

use super::{load_config, open_store, Globals};

#[derive(Subcommand, Debug)]
pub enum RelayCommand {
    /// List relays.
    List {
        /// Include disabled and deleted relays.
        #[arg(long)]
        all: bool,

        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create a relay from ALIAS to DESTINATION.
    Add {
        alias: String,
        destination: String,

        /// Owning user id.
        #[arg(long, value_name = "ID")]
        user: Option<i64>,

        #[arg(long, default_value = "")]
        description: String,

        /// Comma-separated sender whitelist.
        #[arg(long, value_delimiter = ',')]
        whitelist: Vec<String>,
    },

    /// Enable a relay.
    Enable { alias: String },

    /// Disable a relay without deleting it.
    Disable { alias: String },

    /// Soft-delete a relay.
    Remove { alias: String },
}

#[derive(Tabled)]
struct RelayRow {
    #[tabled(rename = "id")]
    id: i64,
    #[tabled(rename = "alias")]
    alias: String,
    #[tabled(rename = "destination")]
    destination: String,
    #[tabled(rename = "user")]
    user: String,
    #[tabled(rename = "state")]
    state: String,
    #[tabled(rename = "description")]
    description: String,
}

impl From<&RelayRecord> for RelayRow {
    fn from(relay: &RelayRecord) -> Self {
        Self {
            id: relay.id.0,
            alias: relay.alias.clone(),
            destination: relay.destination.clone(),
            user: relay.user.map(|u| u.to_string()).unwrap_or_else(|| "-".into()),
            state: state_label(relay).to_string(),
            description: relay.description.clone(),
        }
    }
}

fn state_label(relay: &RelayRecord) -> &'static str {
    if relay.deleted {
        "deleted"
    } else if relay.enabled {
        "enabled"
    } else {
        "disabled"
    }
}

/// Address fields end up in whitespace-separated map lines.
fn check_address(field: &str, value: &str) -> Result<()> {
    ensure!(!value.is_empty(), "{field} must not be empty");
    ensure!(
        !value.chars().any(char::is_whitespace),
        "{field} '{value}' must not contain whitespace"
    );
    Ok(())
}

pub async fn run(command: RelayCommand, globals: &Globals) -> Result<()> {
    let config = load_config(globals)?;
    let store = open_store(&config).await?;
    let outcome = dispatch(command, store.as_ref()).await;
    store.close().await;
    outcome
}

async fn dispatch(command: RelayCommand, store: &dyn Repository) -> Result<()> {
    match command {
        RelayCommand::List { all, json } => {
            let relays = store.get_all_relays(all).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&relays)?);
            } else if relays.is_empty() {
                println!("No relays.");
            } else {
                let rows: Vec<RelayRow> = relays.iter().map(RelayRow::from).collect();
                let mut table = Table::new(rows);
                table.with(Style::rounded());
                println!("{table}");
            }
        }
        RelayCommand::Add {
            alias,
            destination,
            user,
            description,
            whitelist,
        } => {
            check_address("alias", &alias)?;
            check_address("destination", &destination)?;
            let mut relay = NewRelay::new(alias, destination);
            relay.user = user.map(UserId);
            relay.description = description;
            relay.whitelist = whitelist
                .into_iter()
                .map(|w| w.trim().to_string())
                .filter(|w| !w.is_empty())
                .collect();
            let created = store
                .create_relay(relay)
                .await
                .context("failed to create relay")?;
            println!(
                "{} relay {} → {} (id {})",
                "✓".green(),
                created.alias,
                created.destination,
                created.id
            );
        }
        RelayCommand::Enable { alias } => set_enabled(store, &alias, true).await?,
        RelayCommand::Disable { alias } => set_enabled(store, &alias, false).await?,
        RelayCommand::Remove { alias } => {
            let relay = find(store, &alias).await?;
            store.delete_relay(relay.id).await?;
            println!("{} removed relay {}", "✓".green(), relay.alias);
        }
    }
    Ok(())
}

async fn find(store: &dyn Repository, alias: &str) -> Result<RelayRecord> {
    match store.get_relay_by_alias(alias).await? {
        Some(relay) => Ok(relay),
        None => bail!("no relay with alias '{alias}'"),
    }
}

async fn set_enabled(store: &dyn Repository, alias: &str, enabled: bool) -> Result<()> {
    let relay = find(store, alias).await?;
    let mut update = RelayUpdate::new(relay.id);
    update.enabled = Some(enabled);
    store.update_relay(update).await?;
    let verb = if enabled { "enabled" } else { "disabled" };
    println!("{} {verb} relay {}", "✓".green(), relay.alias);
    Ok(())
}
