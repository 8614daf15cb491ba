//! `postsync domain`: manage virtual domains.

use anyhow::{bail, ensure, Context, Result};
use clap::Subcommand;
use colored::Colorize;

use postsync_core::{DomainOwner, UserId};
use postsync_store::Repository;

use super::{load_config, open_store, Globals};

#[derive(Subcommand, Debug)]
pub enum DomainCommand {
    /// List domains, optionally as seen by one user.
    List {
        #[arg(long, value_name = "ID")]
        user: Option<i64>,
    },

    /// Add a domain. Without --user it is shared with everyone.
    Add {
        name: String,

        #[arg(long, value_name = "ID")]
        user: Option<i64>,
    },

    /// Remove a domain.
    Remove { name: String },
}

pub async fn run(command: DomainCommand, globals: &Globals) -> Result<()> {
    let config = load_config(globals)?;
    let store = open_store(&config).await?;
    let outcome = dispatch(command, store.as_ref()).await;
    store.close().await;
    outcome
}

async fn dispatch(command: DomainCommand, store: &dyn Repository) -> Result<()> {
    match command {
        DomainCommand::List { user } => {
            let domains = match user {
                Some(id) => store.get_my_domains(UserId(id)).await?,
                None => store.get_all_domains().await?,
            };
            if domains.is_empty() {
                println!("No domains.");
            }
            for domain in domains {
                println!("{:<40} {}", domain.name, domain.owner.to_string().dimmed());
            }
        }
        DomainCommand::Add { name, user } => {
            ensure!(
                !name.is_empty() && !name.chars().any(char::is_whitespace),
                "domain name '{name}' must be non-empty and contain no whitespace"
            );
            let owner = user.map_or(DomainOwner::Shared, |id| DomainOwner::User(UserId(id)));
            let domain = store
                .create_domain(&name, owner)
                .await
                .context("failed to create domain")?;
            println!("{} added {} ({})", "✓".green(), domain.name, domain.owner);
        }
        DomainCommand::Remove { name } => {
            if store.delete_domain(&name).await? == 0 {
                bail!("no domain named '{name}'");
            }
            println!("{} removed {name}", "✓".green());
        }
    }
    Ok(())
}
