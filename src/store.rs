//! Local record store - a JSON file of cardholder records.
//!
//! This is the incoming side of a sync: records created or edited here get
//! merged into the remote file, and the merged result replaces the local
//! file afterwards. Deletion is soft: the record stays in the file with
//! `is_deleted` set so the deletion travels to the remote on the next sync.

use crate::record::{Record, Timestamp};
use anyhow::{bail, Context, Result};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Local record store backed by a single JSON file.
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    /// Open a store at the given path. The file is created lazily on the
    /// first write.
    pub fn open(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all records, including soft-deleted ones.
    pub fn load(&self) -> Result<Vec<Record>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Cannot read store file: {}", self.path.display()))?;

        let records: Vec<Record> = serde_json::from_str(&content)
            .with_context(|| format!("Cannot parse store file: {}", self.path.display()))?;

        Ok(records)
    }

    /// Load records that are not soft-deleted.
    pub fn active(&self) -> Result<Vec<Record>> {
        let records = self.load()?;
        Ok(records.into_iter().filter(|r| !r.is_deleted).collect())
    }

    /// Add a new record with the given application fields. Returns the
    /// generated key.
    pub fn add(&self, fields: Map<String, Value>) -> Result<String> {
        let record = Record::new(fields);
        let key = record.key.clone();

        let mut records = self.load()?;
        records.push(record);
        self.write(&records)?;

        Ok(key)
    }

    /// Update application fields of an existing record and bump its
    /// timestamp so the change wins the next merge.
    pub fn touch(&self, key: &str, fields: Map<String, Value>) -> Result<()> {
        let mut records = self.load()?;
        let record = match records.iter_mut().find(|r| r.key == key) {
            Some(r) => r,
            None => bail!("No record with key '{}'", key),
        };

        for (name, value) in fields {
            record.fields.insert(name, value);
        }
        record.last_modified_time = Some(Timestamp::now());
        record.is_synced = false;

        self.write(&records)
    }

    /// Soft-delete a record: mark it deleted and bump its timestamp.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut records = self.load()?;
        let record = match records.iter_mut().find(|r| r.key == key) {
            Some(r) => r,
            None => bail!("No record with key '{}'", key),
        };

        record.is_deleted = true;
        record.last_modified_time = Some(Timestamp::now());
        record.is_synced = false;

        self.write(&records)
    }

    /// Replace the whole store with the merged result of a sync.
    pub fn replace_all(&self, records: &[Record]) -> Result<()> {
        self.write(records)
    }

    fn write(&self, records: &[Record]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(records)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Cannot write store file: {}", self.path.display()))?;

        Ok(())
    }
}
