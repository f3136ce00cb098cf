//! CLI definitions and command implementations for CardVault.

pub mod commands;

use clap::{Parser, Subcommand};

/// CardVault - Sync cardholder records with Google Drive app data
#[derive(Parser)]
#[command(name = "cv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store OAuth tokens for the Drive API
    Auth {
        /// OAuth2 access token
        #[arg(long)]
        access_token: String,

        /// OAuth2 refresh token (needed once the access token expires)
        #[arg(long)]
        refresh_token: Option<String>,
    },

    /// Create the remote data file if it does not exist yet
    Init,

    /// Add a record to the local store
    Add {
        /// Application fields as a JSON object, e.g. '{"name":"Alice"}'
        #[arg(short, long)]
        data: String,
    },

    /// List local records (soft-deleted ones are hidden)
    List,

    /// Soft-delete a local record by key
    Remove {
        /// Record key
        key: String,
    },

    /// Merge local records into the remote file and pull the result back
    Sync,

    /// Show config, credential and store status
    Status,
}
