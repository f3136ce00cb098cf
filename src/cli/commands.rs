//! Command implementations for the CardVault CLI.
//!
//! Main commands:
//! - auth: store OAuth tokens
//! - add/list/remove: edit the local record store
//! - sync: merge local records into the remote file (all-in-one)

use anyhow::{bail, Context, Result};
use cardvault::config::{default_config_path, default_credentials_path, Config};
use cardvault::record::Timestamp;
use cardvault::store::LocalStore;
use cardvault::sync::{
    self, load_credentials_from_file, save_credentials_to_file, Credentials, DriveClient,
    SyncError,
};
use colored::Colorize;
use serde_json::{Map, Value};

/// Store OAuth tokens in the credentials file.
pub fn auth(access_token: String, refresh_token: Option<String>) -> Result<()> {
    if access_token.is_empty() {
        bail!("Access token cannot be empty");
    }

    let credentials = Credentials {
        access_token,
        refresh_token,
        expires_at: None,
    };

    let path = default_credentials_path();
    save_credentials_to_file(&credentials, &path)?;

    println!("  {} Credentials saved to {}", "✓".green(), path.display());
    if credentials.refresh_token.is_none() {
        println!(
            "  {} No refresh token stored; sync will fail once the access token expires",
            "!".yellow()
        );
    }

    Ok(())
}

/// Create the remote data file if it does not exist.
pub fn init() -> Result<()> {
    let config = Config::load_default()?;
    let credentials = load_credentials()?;
    let client = DriveClient::new(&config, &credentials.access_token);

    if client.file_exists(&config.data_file_name)? {
        println!(
            "  {} Remote file '{}' already exists",
            "✓".green(),
            config.data_file_name
        );
        return Ok(());
    }

    let file_id = client.create_file(&config.data_file_name, &[])?;
    println!(
        "  {} Created remote file '{}' ({})",
        "✓".green(),
        config.data_file_name,
        file_id.dimmed()
    );

    Ok(())
}

/// Add a record to the local store.
pub fn add(data: String) -> Result<()> {
    let value: Value =
        serde_json::from_str(&data).context("--data must be a valid JSON object")?;
    let fields: Map<String, Value> = match value {
        Value::Object(map) => map,
        _ => bail!("--data must be a JSON object, e.g. '{{\"name\":\"Alice\"}}'"),
    };

    let config = Config::load_default()?;
    let store = LocalStore::open(&config.store_path);
    let key = store.add(fields)?;

    println!("  {} Added record {}", "✓".green(), key.cyan());
    Ok(())
}

/// List active local records.
pub fn list() -> Result<()> {
    let config = Config::load_default()?;
    let store = LocalStore::open(&config.store_path);
    let records = store.active()?;

    if records.is_empty() {
        println!("{}", "No records in the local store.".yellow());
        return Ok(());
    }

    println!(
        "\n{} {} record(s):\n",
        "Found".green(),
        records.len().to_string().green().bold()
    );

    for (idx, record) in records.iter().enumerate() {
        let synced = if record.is_synced {
            "synced".green()
        } else {
            "not synced".yellow()
        };
        println!(
            "  {}. {} [{}]",
            (idx + 1).to_string().cyan(),
            record.key.white().bold(),
            synced
        );
        println!("     modified: {}", format_timestamp(record).dimmed());
        for (name, value) in &record.fields {
            println!("     {}: {}", name.dimmed(), value);
        }
    }

    println!();
    Ok(())
}

fn format_timestamp(record: &cardvault::record::Record) -> String {
    match &record.last_modified_time {
        Some(Timestamp::Number(millis)) => chrono::DateTime::from_timestamp_millis(*millis as i64)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| millis.to_string()),
        Some(Timestamp::Text(text)) => text.clone(),
        None => "unknown".to_string(),
    }
}

/// Soft-delete a local record.
pub fn remove(key: String) -> Result<()> {
    let config = Config::load_default()?;
    let store = LocalStore::open(&config.store_path);
    store.remove(&key)?;

    println!(
        "  {} Record {} marked deleted (removed on next sync)",
        "✓".green(),
        key.cyan()
    );
    Ok(())
}

/// Merge local records into the remote file and write the result back to
/// the local store.
pub fn sync_records() -> Result<()> {
    println!("{}", "Syncing records to Google Drive...".cyan().bold());

    let config = Config::load_default()?;
    let store = LocalStore::open(&config.store_path);
    let local = store.load()?;

    let mut credentials = load_credentials()?;
    let result = sync::run(&config, &mut credentials, &local);

    // Tokens may have been refreshed mid-sync, even when the sync itself
    // failed afterwards; keep them either way
    save_credentials_to_file(&credentials, &default_credentials_path())?;

    let merged = match result {
        Ok(merged) => merged,
        Err(SyncError::TokenRejected(_)) | Err(SyncError::RefreshFailed(_)) => {
            bail!("Authentication failed. Run 'cv auth' with fresh tokens.")
        }
        Err(e) => return Err(e).context("Sync failed"),
    };

    store.replace_all(&merged)?;

    println!(
        "  {} Synced {} record(s)",
        "✓".green(),
        merged.len().to_string().green().bold()
    );
    Ok(())
}

/// Show config, credential and store status.
pub fn status() -> Result<()> {
    let config_path = default_config_path();
    let config = Config::load_default()?;

    println!("{}", "CardVault status".cyan().bold());
    println!(
        "  config:      {} {}",
        config_path.display(),
        if config_path.exists() {
            "".normal()
        } else {
            "(defaults)".dimmed()
        }
    );
    println!("  remote file: {}", config.data_file_name);

    let creds_path = default_credentials_path();
    if creds_path.exists() {
        let credentials = load_credentials_from_file(&creds_path)?;
        let state = if credentials.is_expired() {
            "expired".yellow()
        } else {
            "present".green()
        };
        println!("  credentials: {}", state);
    } else {
        println!("  credentials: {}", "missing (run 'cv auth')".yellow());
    }

    let store = LocalStore::open(&config.store_path);
    let all = store.load()?;
    let active = all.iter().filter(|r| !r.is_deleted).count();
    let pending = all.iter().filter(|r| !r.is_synced).count();
    println!(
        "  store:       {} ({} active, {} pending sync)",
        store.path().display(),
        active,
        pending
    );

    Ok(())
}

fn load_credentials() -> Result<Credentials> {
    let path = default_credentials_path();
    if !path.exists() {
        bail!("No credentials found. Run 'cv auth' first.");
    }
    load_credentials_from_file(&path)
}
