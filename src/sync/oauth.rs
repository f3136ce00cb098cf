//! OAuth2 credentials and refresh-token exchange.
//!
//! Initial token acquisition (browser consent, redirect handling) is outside
//! this tool; tokens are supplied once and kept fresh here by exchanging the
//! refresh token at the token endpoint when the access token expires or is
//! rejected.

use super::drive::DriveClient;
use super::SyncError;
use crate::config::Config;
use serde::{Deserialize, Serialize};

/// Stored OAuth credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    /// Needed to mint new access tokens; without it an expired token is fatal.
    pub refresh_token: Option<String>,
    /// Expiry of the access token, epoch seconds. Unknown when absent.
    pub expires_at: Option<u64>,
}

impl Credentials {
    /// Whether the access token is known to be expired.
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => now_epoch_secs() >= expires_at,
            None => false,
        }
    }
}

fn now_epoch_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Outcome of preparing a Drive client from stored credentials.
///
/// A fatal problem (unusable config, no refresh token when one is required)
/// is the `Err` arm of the surrounding `Result`; this enum only carries the
/// two non-fatal outcomes so callers branch on a tag instead of inspecting
/// error shapes.
pub enum ClientAccess {
    /// The access token looks usable.
    Ready(DriveClient),
    /// The access token is expired; exchange the refresh token first.
    NeedsRefresh { reason: String },
}

/// Build a Drive client from credentials, or report that a refresh is needed.
pub fn establish(config: &Config, credentials: &Credentials) -> Result<ClientAccess, SyncError> {
    if credentials.is_expired() {
        return Ok(ClientAccess::NeedsRefresh {
            reason: "access token expired".to_string(),
        });
    }

    Ok(ClientAccess::Ready(DriveClient::new(
        config,
        &credentials.access_token,
    )))
}

/// Response from the token endpoint for a refresh-token grant.
#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Exchange the refresh token for a new access token.
///
/// The refresh token itself is retained; Google does not rotate it on this
/// grant.
pub fn refresh_access_token(
    config: &Config,
    credentials: &Credentials,
) -> Result<Credentials, SyncError> {
    let refresh_token = credentials
        .refresh_token
        .as_deref()
        .ok_or_else(|| SyncError::RefreshFailed("no refresh token stored".to_string()))?;

    let client_id = config
        .oauth
        .client_id()
        .map_err(|e| SyncError::Config(e.to_string()))?;
    let client_secret = config
        .oauth
        .client_secret()
        .map_err(|e| SyncError::Config(e.to_string()))?;

    let client = reqwest::blocking::Client::new();
    let response = client
        .post(&config.oauth.token_url)
        .form(&[
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .send()?;

    let token_response: RefreshResponse = response.json()?;

    if let Some(access_token) = token_response.access_token {
        let expires_at = token_response.expires_in.map(|e| now_epoch_secs() + e);
        return Ok(Credentials {
            access_token,
            refresh_token: credentials.refresh_token.clone(),
            expires_at,
        });
    }

    let error = token_response.error.unwrap_or_else(|| "unknown".to_string());
    let description = token_response
        .error_description
        .unwrap_or_else(|| "no description".to_string());
    Err(SyncError::RefreshFailed(format!(
        "{} - {}",
        error, description
    )))
}

/// Save credentials to a JSON file with restricted permissions.
pub fn save_credentials_to_file(
    credentials: &Credentials,
    path: &std::path::Path,
) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(credentials)?;
    std::fs::write(path, json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(())
}

/// Load credentials from a JSON file.
pub fn load_credentials_from_file(path: &std::path::Path) -> anyhow::Result<Credentials> {
    let json = std::fs::read_to_string(path)?;
    let credentials: Credentials = serde_json::from_str(&json)?;
    Ok(credentials)
}
