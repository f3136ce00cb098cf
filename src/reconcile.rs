//! Record reconciliation - last-write-wins merge of two record sets.
//!
//! The remote set is authoritative on ties; an incoming record only replaces
//! a remote one when its timestamp is strictly newer.

use crate::record::Record;
use std::collections::HashMap;

/// Merge two record sets keyed by `key`, latest timestamp wins.
///
/// Remote records are inserted first, in order; a duplicate key within the
/// remote set overwrites unconditionally. Incoming records then either fill
/// a new key or replace an existing entry when strictly newer. Equal or
/// missing timestamps keep the existing entry.
///
/// Output order is deterministic: first-insertion order of remote keys,
/// then new keys from the incoming set in encounter order. Records are
/// returned unmodified.
pub fn reconcile(remote: &[Record], incoming: &[Record]) -> Vec<Record> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut merged: Vec<Record> = Vec::with_capacity(remote.len() + incoming.len());

    for record in remote {
        match index.get(&record.key) {
            Some(&slot) => merged[slot] = record.clone(),
            None => {
                index.insert(record.key.clone(), merged.len());
                merged.push(record.clone());
            }
        }
    }

    for record in incoming {
        match index.get(&record.key) {
            Some(&slot) => {
                if record.newer_than(&merged[slot]) {
                    merged[slot] = record.clone();
                }
            }
            None => {
                index.insert(record.key.clone(), merged.len());
                merged.push(record.clone());
            }
        }
    }

    merged
}
