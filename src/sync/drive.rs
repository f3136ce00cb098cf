//! Google Drive appDataFolder file operations over the v3 REST API.
//!
//! The data file lives in the application data folder, a storage area only
//! visible to this application. Operations: list, find by name, create,
//! fetch content, overwrite content.

use super::SyncError;
use crate::config::Config;
use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Boundary for multipart uploads.
const UPLOAD_BOUNDARY: &str = "----CardVaultBoundary";

/// Google Drive file metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
}

/// Response from files.list.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriveFileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Client for the Drive v3 files API, bound to one access token.
pub struct DriveClient {
    client: reqwest::blocking::Client,
    access_token: String,
    files_url: String,
    upload_url: String,
}

impl DriveClient {
    /// Create a client from config endpoints and an access token.
    pub fn new(config: &Config, access_token: &str) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            access_token: access_token.to_string(),
            files_url: config.drive.files_url.clone(),
            upload_url: config.drive.upload_url.clone(),
        }
    }

    /// List files in the appDataFolder.
    pub fn list_appdata_files(&self) -> Result<Vec<DriveFile>, SyncError> {
        let response = self
            .client
            .get(&self.files_url)
            .query(&[
                ("spaces", "appDataFolder"),
                ("fields", "files(id,name)"),
                ("pageSize", "1000"),
            ])
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()?;

        let response = check_status(response)?;
        let list: DriveFileList = response.json()?;
        Ok(list.files)
    }

    /// Find a file in the appDataFolder by name.
    pub fn find_file(&self, name: &str) -> Result<Option<DriveFile>, SyncError> {
        let files = self.list_appdata_files()?;
        Ok(files.into_iter().find(|f| f.name == name))
    }

    /// Whether a file with this name exists in the appDataFolder.
    pub fn file_exists(&self, name: &str) -> Result<bool, SyncError> {
        Ok(self.find_file(name)?.is_some())
    }

    /// Find the data file, creating it with an empty record array when
    /// absent. Returns the file id.
    pub fn ensure_file(&self, name: &str) -> Result<String, SyncError> {
        if let Some(file) = self.find_file(name)? {
            return Ok(file.id);
        }
        self.create_file(name, &[])
    }

    /// Create a JSON file in the appDataFolder via multipart upload.
    /// Returns the new file id.
    pub fn create_file(&self, name: &str, records: &[Record]) -> Result<String, SyncError> {
        #[derive(Serialize)]
        struct FileMetadata<'a> {
            name: &'a str,
            parents: Vec<&'a str>,
        }

        let metadata = FileMetadata {
            name,
            parents: vec!["appDataFolder"],
        };
        let metadata_json = serde_json::to_string(&metadata)?;
        let content = serde_json::to_vec(records)?;
        let body = multipart_body(&metadata_json, &content, UPLOAD_BOUNDARY);

        let url = format!("{}?uploadType=multipart", self.upload_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header(
                "Content-Type",
                format!("multipart/related; boundary={}", UPLOAD_BOUNDARY),
            )
            .body(body)
            .send()?;

        let response = check_status(response)?;
        let file: DriveFile = response.json()?;
        Ok(file.id)
    }

    /// Fetch the record array stored in a file.
    ///
    /// Soft-deleted records are dropped here, on the read path; the merge
    /// itself never interprets `is_deleted`.
    pub fn fetch_records(&self, file_id: &str) -> Result<Vec<Record>, SyncError> {
        let url = format!("{}/{}", self.files_url, file_id);
        let response = self
            .client
            .get(&url)
            .query(&[("alt", "media")])
            .header("Authorization", format!("Bearer {}", self.access_token))
            .send()?;

        if response.status().as_u16() == 404 {
            return Err(SyncError::FileMissing(file_id.to_string()));
        }
        let response = check_status(response)?;

        let body = response.text()?;
        let records: Vec<Record> = serde_json::from_str(&body)?;
        Ok(records.into_iter().filter(|r| !r.is_deleted).collect())
    }

    /// Overwrite a file's content with the given record array.
    pub fn update_file(&self, file_id: &str, records: &[Record]) -> Result<String, SyncError> {
        let content = serde_json::to_vec(records)?;

        let url = format!("{}/{}?uploadType=media", self.upload_url, file_id);
        let response = self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {}", self.access_token))
            .header("Content-Type", "application/json")
            .body(content)
            .send()?;

        if response.status().as_u16() == 404 {
            return Err(SyncError::FileMissing(file_id.to_string()));
        }
        let response = check_status(response)?;
        let file: DriveFile = response.json()?;
        Ok(file.id)
    }
}

/// Map a non-success response to a sync error. 401 means the access token
/// was rejected and the caller may refresh and retry.
fn check_status(
    response: reqwest::blocking::Response,
) -> Result<reqwest::blocking::Response, SyncError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().unwrap_or_default();
    Err(status_error(status.as_u16(), body))
}

fn status_error(status: u16, body: String) -> SyncError {
    if status == 401 {
        SyncError::TokenRejected(body)
    } else {
        SyncError::Api { status, body }
    }
}

/// Assemble a multipart/related body: JSON metadata part followed by the
/// file content part.
fn multipart_body(metadata_json: &str, content: &[u8], boundary: &str) -> Vec<u8> {
    let head = format!(
        "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: application/json\r\n\r\n",
        boundary = boundary,
        metadata = metadata_json
    );
    let mut body = head.into_bytes();
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--", boundary).as_bytes());
    body
}
