use crate::output::{print_json, Table};
use anyhow::Context;
use clap::Subcommand;
use std::path::Path;
use traintrack_core::accounts::{AccountBackend, LocalAccounts, Registration};
use traintrack_core::config::Config;
use traintrack_core::types::Role;

// ---------------------------------------------------------------------------
// Subcommand definition
// ---------------------------------------------------------------------------

#[derive(Subcommand, Debug)]
pub enum UserSubcommand {
    /// Create an account
    Add {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, env = "TRAINTRACK_PASSWORD", hide_env_values = true)]
        password: String,
        /// regular, premium or admin
        #[arg(long, default_value = "regular")]
        role: Role,
    },
    /// List accounts, admins first
    List,
    /// Change an account's role
    SetRole {
        username: String,
        /// regular, premium or admin
        role: Role,
    },
    /// Delete an account
    Delete { username: String },
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

pub fn run(root: &Path, subcommand: UserSubcommand, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let accounts = LocalAccounts::open(&config.database_path(root))
        .context("failed to open account database")?;

    match subcommand {
        UserSubcommand::Add {
            username,
            email,
            password,
            role,
        } => {
            let user = accounts.add_user(
                &Registration {
                    username,
                    email,
                    password,
                },
                role,
            )?;
            if json {
                print_json(&user)?;
            } else {
                println!("Created {} ({})", user.username, user.role);
            }
        }
        UserSubcommand::List => {
            let users = accounts.list()?;
            if json {
                print_json(&users)?;
            } else if users.is_empty() {
                println!("No accounts.");
            } else {
                let mut table = Table::new(&["USERNAME", "EMAIL", "ROLE"]);
                for user in &users {
                    table.row([user.username.clone(), user.email.clone(), user.role.to_string()]);
                }
                table.print();
            }
        }
        UserSubcommand::SetRole { username, role } => {
            accounts.change_role(&username, role)?;
            println!("{username} is now {role}");
        }
        UserSubcommand::Delete { username } => {
            accounts.delete(&username)?;
            println!("Deleted {username}");
        }
    }
    Ok(())
}
