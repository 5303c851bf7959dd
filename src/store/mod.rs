//! store - ordered key-value store contract consumed by the ledger.
//!
//! Разделение:
//! - mod.rs    - трейт KvStore, WriteOp, общие хелперы границ скана
//! - memory.rs - MemStore (BTreeMap, in-process)
//! - file.rs   - FileStore (commit journal + in-memory index, crash-safe batches)
//!
//! Contract:
//! - `get` returns None for absent keys;
//! - `delete` of an absent key is a no-op success;
//! - `scan(start, end)` yields pairs of the half-open range [start, end) in ascending key
//!   order. An empty `start` means "from the first key", an empty `end` means "to the last
//!   key"; `start >= end` (both non-empty) is an empty range.

use std::ops::Bound;

pub use crate::error::StoreError;

pub mod file;
pub mod memory;

pub use file::{FileStore, FileStoreStatus};
pub use memory::MemStore;

/// Lazy, finite, non-restartable scan over (key, value) pairs.
pub type ScanIter<'a> = Box<dyn Iterator<Item = Result<(String, Vec<u8>), StoreError>> + 'a>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Put { key: String, value: Vec<u8> },
    Delete { key: String },
}

impl WriteOp {
    pub fn put(key: impl Into<String>, value: Vec<u8>) -> Self {
        WriteOp::Put {
            key: key.into(),
            value,
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        WriteOp::Delete { key: key.into() }
    }

    pub fn key(&self) -> &str {
        match self {
            WriteOp::Put { key, .. } | WriteOp::Delete { key } => key,
        }
    }
}

pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    fn delete(&mut self, key: &str) -> Result<(), StoreError>;

    fn scan<'a>(&'a self, start: &str, end: &str) -> Result<ScanIter<'a>, StoreError>;

    /// Apply several writes. The default applies them one by one and is NOT atomic:
    /// a failure leaves the earlier writes in place.
    fn apply_batch(&mut self, ops: &[WriteOp]) -> Result<(), StoreError> {
        for op in ops {
            match op {
                WriteOp::Put { key, value } => self.put(key, value)?,
                WriteOp::Delete { key } => self.delete(key)?,
            }
        }
        Ok(())
    }

    /// True if `apply_batch` commits all ops or none.
    fn atomic_batches(&self) -> bool {
        false
    }
}

/// Range bounds for `BTreeMap::range::<str, _>`; None when the range is empty by construction.
pub fn scan_bounds<'k>(start: &'k str, end: &'k str) -> Option<(Bound<&'k str>, Bound<&'k str>)> {
    if !start.is_empty() && !end.is_empty() && start >= end {
        return None;
    }
    let lo = if start.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Included(start)
    };
    let hi = if end.is_empty() {
        Bound::Unbounded
    } else {
        Bound::Excluded(end)
    };
    Some((lo, hi))
}
