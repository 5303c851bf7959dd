//! store/memory - BTreeMap-backed KvStore for tests, tooling and embedding.

use std::collections::BTreeMap;

use super::{scan_bounds, KvStore, ScanIter, StoreError, WriteOp};

#[derive(Debug, Default, Clone)]
pub struct MemStore {
    map: BTreeMap<String, Vec<u8>>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.map.keys().map(|k| k.as_str())
    }
}

impl KvStore for MemStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.map.get(key).cloned())
    }

    fn put(&mut self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.map.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        self.map.remove(key);
        Ok(())
    }

    fn scan<'a>(&'a self, start: &str, end: &str) -> Result<ScanIter<'a>, StoreError> {
        match scan_bounds(start, end) {
            Some(bounds) => Ok(Box::new(
                self.map
                    .range::<str, _>(bounds)
                    .map(|(k, v)| Ok((k.clone(), v.clone()))),
            )),
            None => Ok(Box::new(std::iter::empty())),
        }
    }

    // In-memory inserts cannot fail halfway, so the batch is all-or-nothing.
    fn apply_batch(&mut self, ops: &[WriteOp]) -> Result<(), StoreError> {
        for op in ops {
            match op {
                WriteOp::Put { key, value } => {
                    self.map.insert(key.clone(), value.clone());
                }
                WriteOp::Delete { key } => {
                    self.map.remove(key);
                }
            }
        }
        Ok(())
    }

    fn atomic_batches(&self) -> bool {
        true
    }
}
