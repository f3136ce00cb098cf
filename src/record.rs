//! Record data model.
//!
//! A record is a JSON object with a unique `key`, a modification timestamp
//! and two bookkeeping flags. All other fields belong to the application and
//! pass through serialization untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Modification timestamp of a record.
///
/// The wire format allows either a JSON number (epoch milliseconds) or an
/// ordered string (e.g. RFC 3339). Numbers compare numerically, strings
/// lexicographically. Mixed types are incomparable: neither value is
/// considered newer than the other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Timestamp {
    Number(f64),
    Text(String),
}

impl Timestamp {
    /// Strictly-greater comparison. Equal or incomparable values return false.
    pub fn strictly_after(&self, other: &Timestamp) -> bool {
        match (self, other) {
            (Timestamp::Number(a), Timestamp::Number(b)) => a > b,
            (Timestamp::Text(a), Timestamp::Text(b)) => a > b,
            _ => false,
        }
    }

    /// Current time as epoch milliseconds.
    pub fn now() -> Timestamp {
        Timestamp::Number(chrono::Utc::now().timestamp_millis() as f64)
    }
}

/// A single cardholder record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier within a record set.
    pub key: String,

    /// Modification timestamp. Absent timestamps compare older than any
    /// present one, so a record without a timestamp never wins a merge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_time: Option<Timestamp>,

    /// Soft-delete marker. Absent on the wire when false.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_deleted: bool,

    /// Set after a successful sync. Absent on the wire when false.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_synced: bool,

    /// Application fields, opaque to reconciliation.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl Record {
    /// Create a record with a fresh UUID key and the current timestamp.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self {
            key: uuid::Uuid::new_v4().to_string(),
            last_modified_time: Some(Timestamp::now()),
            is_deleted: false,
            is_synced: false,
            fields,
        }
    }

    /// Whether this record's timestamp is strictly newer than `other`'s.
    /// A missing timestamp loses to any present one; two missing timestamps
    /// are incomparable.
    pub fn newer_than(&self, other: &Record) -> bool {
        match (&self.last_modified_time, &other.last_modified_time) {
            (Some(a), Some(b)) => a.strictly_after(b),
            (Some(_), None) => true,
            _ => false,
        }
    }
}
