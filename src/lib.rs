//! CardVault Core Library
//!
//! Synchronizes a small JSON dataset of cardholder records against a single
//! file in the Google Drive application data folder. Provides:
//! - Record reconciliation (last-write-wins merge keyed by record key)
//! - A local JSON record store
//! - OAuth2 token refresh and Drive appDataFolder file operations
//!
//! Principle: records are opaque beyond `key` and `last_modified_time`;
//! application fields are carried through untouched.

pub mod config;
pub mod reconcile;
pub mod record;
pub mod store;
pub mod sync;

// Re-export main types
pub use config::Config;
pub use reconcile::reconcile;
pub use record::{Record, Timestamp};
pub use store::LocalStore;
pub use sync::{ClientAccess, Credentials, DriveClient, SyncError};
