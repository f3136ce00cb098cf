//! Config module - Manages CardVault configuration (cardvault.toml).
//!
//! Configuration file contains:
//! - OAuth client settings (id/secret overridable via environment)
//! - Drive API endpoints (overridable for testing)
//! - Remote data file name and local store path
//!
//! The config is an explicit value passed into whatever needs it; there is
//! no module-level client or global state.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// OAuth client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth client id. Empty means "take from GOOGLE_CLIENT_ID".
    #[serde(default)]
    pub client_id: String,
    /// OAuth client secret. Empty means "take from GOOGLE_CLIENT_SECRET".
    #[serde(default)]
    pub client_secret: String,
    /// Token endpoint for refresh-token exchange.
    #[serde(default = "default_token_url")]
    pub token_url: String,
}

fn default_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

impl Default for OAuthConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: default_token_url(),
        }
    }
}

impl OAuthConfig {
    /// Resolved client id (config value, else environment).
    pub fn client_id(&self) -> Result<String> {
        if !self.client_id.is_empty() {
            return Ok(self.client_id.clone());
        }
        std::env::var("GOOGLE_CLIENT_ID")
            .context("OAuth client id not configured and GOOGLE_CLIENT_ID not set")
    }

    /// Resolved client secret (config value, else environment).
    pub fn client_secret(&self) -> Result<String> {
        if !self.client_secret.is_empty() {
            return Ok(self.client_secret.clone());
        }
        std::env::var("GOOGLE_CLIENT_SECRET")
            .context("OAuth client secret not configured and GOOGLE_CLIENT_SECRET not set")
    }
}

/// Google Drive API endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveConfig {
    /// Base URL for files metadata operations.
    #[serde(default = "default_files_url")]
    pub files_url: String,
    /// Base URL for media uploads.
    #[serde(default = "default_upload_url")]
    pub upload_url: String,
}

fn default_files_url() -> String {
    "https://www.googleapis.com/drive/v3/files".to_string()
}

fn default_upload_url() -> String {
    "https://www.googleapis.com/upload/drive/v3/files".to_string()
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self {
            files_url: default_files_url(),
            upload_url: default_upload_url(),
        }
    }
}

/// Main CardVault configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Config version (for future migrations)
    #[serde(default = "default_version")]
    pub version: u32,

    /// OAuth client settings
    #[serde(default)]
    pub oauth: OAuthConfig,

    /// Drive API endpoints
    #[serde(default)]
    pub drive: DriveConfig,

    /// Name of the data file in the appDataFolder
    #[serde(default = "default_data_file_name")]
    pub data_file_name: String,

    /// Path to the local record store
    pub store_path: PathBuf,
}

fn default_version() -> u32 {
    1
}

fn default_data_file_name() -> String {
    "cardholder.json".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            oauth: OAuthConfig::default(),
            drive: DriveConfig::default(),
            data_file_name: default_data_file_name(),
            store_path: default_store_path(),
        }
    }
}

/// Get default local store path.
pub fn default_store_path() -> PathBuf {
    dirs::data_dir()
        .map(|d| d.join("cardvault").join("cardholder.json"))
        .unwrap_or_else(|| PathBuf::from("./cardholder.json"))
}

/// Get default config directory (~/.config/cardvault/).
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("cardvault"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get default config file path.
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("cardvault.toml")
}

/// Get default credentials file path.
pub fn default_credentials_path() -> PathBuf {
    default_config_dir().join("credentials.json")
}

impl Config {
    /// Create new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load config from file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Cannot parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load config from default path, falling back to defaults.
    pub fn load_default() -> Result<Self> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file.
    pub fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content =
            toml::to_string_pretty(self).with_context(|| "Cannot serialize config to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Cannot write config file: {}", path.display()))?;

        // Restrict file permissions on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        Ok(())
    }
}
