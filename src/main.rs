//! CardVault CLI - Sync cardholder records with Google Drive app data.
//!
//! Records live in a local JSON store and in a single file in the Drive
//! appDataFolder. Sync is a last-write-wins merge keyed by record key.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Auth {
            access_token,
            refresh_token,
        } => {
            cli::commands::auth(access_token, refresh_token)?;
        }
        Commands::Init => {
            cli::commands::init()?;
        }
        Commands::Add { data } => {
            cli::commands::add(data)?;
        }
        Commands::List => {
            cli::commands::list()?;
        }
        Commands::Remove { key } => {
            cli::commands::remove(key)?;
        }
        Commands::Sync => {
            cli::commands::sync_records()?;
        }
        Commands::Status => {
            cli::commands::status()?;
        }
    }

    Ok(())
}
