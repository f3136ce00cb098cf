//! Sync module - merge local records into the remote appDataFolder file.
//!
//! This module contains:
//! - The sync error taxonomy
//! - OAuth credentials and token refresh
//! - The Google Drive client for appDataFolder file operations
//! - The orchestration that wires fetch -> reconcile -> write back

pub mod drive;
pub mod oauth;

pub use drive::{DriveClient, DriveFile};
pub use oauth::{
    load_credentials_from_file, save_credentials_to_file, ClientAccess, Credentials,
};

use crate::config::Config;
use crate::reconcile::reconcile;
use crate::record::Record;
use thiserror::Error;

/// Failure kinds of the sync layer, distinguishable by the caller.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The remote service rejected the access token (HTTP 401).
    #[error("access token rejected: {0}")]
    TokenRejected(String),

    /// Exchanging the refresh token for a new access token failed.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// The remote data file does not exist.
    #[error("remote file not found: {0}")]
    FileMissing(String),

    /// The Drive API returned a non-success status.
    #[error("Drive API error {status}: {body}")]
    Api { status: u16, body: String },

    /// Network-level failure.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote file content is not a valid record array.
    #[error("malformed remote content: {0}")]
    Malformed(#[from] serde_json::Error),

    /// Missing or unusable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Run a full sync: merge `incoming` into the remote file and return the
/// merged record set.
///
/// The remote file is created with an empty array when absent. Records
/// soft-deleted on the remote are dropped when the file is read, before the
/// merge. Every record in the merged result is marked `is_synced` before it
/// is written back.
///
/// Credentials are refreshed up front when the access token is known to be
/// expired, and once more if a Drive call is rejected mid-run; the refreshed
/// credentials are written through `credentials` so the caller can persist
/// them.
pub fn run(
    config: &Config,
    credentials: &mut Credentials,
    incoming: &[Record],
) -> Result<Vec<Record>, SyncError> {
    let client = match oauth::establish(config, credentials)? {
        ClientAccess::Ready(client) => client,
        ClientAccess::NeedsRefresh { reason: _ } => {
            *credentials = oauth::refresh_access_token(config, credentials)?;
            DriveClient::new(config, &credentials.access_token)
        }
    };

    match sync_once(config, &client, incoming) {
        Err(SyncError::TokenRejected(_)) => {
            // Single refresh-and-retry when the token is rejected mid-run
            *credentials = oauth::refresh_access_token(config, credentials)?;
            let client = DriveClient::new(config, &credentials.access_token);
            sync_once(config, &client, incoming)
        }
        other => other,
    }
}

fn sync_once(
    config: &Config,
    client: &DriveClient,
    incoming: &[Record],
) -> Result<Vec<Record>, SyncError> {
    let file_id = client.ensure_file(&config.data_file_name)?;
    let remote = client.fetch_records(&file_id)?;

    let mut merged = reconcile(&remote, incoming);
    mark_synced(&mut merged);

    client.update_file(&file_id, &merged)?;
    Ok(merged)
}

/// Mark every record as synced. Applied after the merge, never inside it.
pub fn mark_synced(records: &mut [Record]) {
    for record in records {
        record.is_synced = true;
    }
}
