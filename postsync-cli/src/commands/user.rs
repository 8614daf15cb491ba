//! `postsync user`: sign-in bookkeeping and admin rights.

use anyhow::{bail, Result};
use clap::{ArgGroup, Subcommand};
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use postsync_core::UserId;
use postsync_store::Repository;

use super::{load_config, open_store, Globals};

#[derive(Subcommand, Debug)]
pub enum UserCommand {
    /// Record a sign-in; creates the user on first sight.
    Login {
        external_id: String,
        display_name: String,
    },

    /// Grant or revoke admin rights.
    #[command(group(ArgGroup::new("change").required(true).args(["grant", "revoke"])))]
    Admin {
        id: i64,

        #[arg(long)]
        grant: bool,

        #[arg(long)]
        revoke: bool,
    },

    /// List users.
    List,
}

#[derive(Tabled)]
struct UserRow {
    #[tabled(rename = "id")]
    id: i64,
    #[tabled(rename = "external id")]
    external_id: String,
    #[tabled(rename = "name")]
    display_name: String,
    #[tabled(rename = "admin")]
    admin: String,
}

pub async fn run(command: UserCommand, globals: &Globals) -> Result<()> {
    let config = load_config(globals)?;
    let store = open_store(&config).await?;
    let outcome = dispatch(command, store.as_ref()).await;
    store.close().await;
    outcome
}

async fn dispatch(command: UserCommand, store: &dyn Repository) -> Result<()> {
    match command {
        UserCommand::Login {
            external_id,
            display_name,
        } => {
            let user = store
                .get_user_by_external_id(&external_id, &display_name)
                .await?;
            let role = if user.admin { " (admin)" } else { "" };
            println!(
                "{} {} is user {}{role}",
                "✓".green(),
                user.display_name,
                user.id
            );
        }
        UserCommand::Admin { id, grant, .. } => {
            if store.set_admin(UserId(id), grant).await? == 0 {
                bail!("no user with id {id}");
            }
            let verb = if grant { "granted" } else { "revoked" };
            println!("{} admin {verb} for user {id}", "✓".green());
        }
        UserCommand::List => {
            let rows: Vec<UserRow> = store
                .get_all_users()
                .await?
                .into_iter()
                .map(|u| UserRow {
                    id: u.id.0,
                    external_id: u.external_id,
                    display_name: u.display_name,
                    admin: if u.admin { "yes".into() } else { "no".into() },
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
    }
    Ok(())
}
