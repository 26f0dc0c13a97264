//! Shared, volatile key-value cache.
//!
//! Every request handler, in every process, sees the same cache. Nothing here
//! is transactional: a read followed by a write can interleave with another
//! handler's read and write, and the later write wins. Entries may also vanish
//! at any time, so callers treat a missing key as "never existed".

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
    #[error("counter {key} holds a non-numeric value")]
    NotACounter { key: String },
}

pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError>;

    /// Stores `value` only if `key` is absent. Returns whether it was stored.
    fn add(&self, key: &str, value: Vec<u8>) -> Result<bool, CacheError>;

    /// Fetches several keys at once. Missing keys are absent from the result.
    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, CacheError>;

    fn delete_multi(&self, keys: &[String]) -> Result<(), CacheError>;

    /// Atomically increments a counter, creating it at zero first, and returns
    /// the new value. Counters are stored as 8 little-endian bytes, so `set`
    /// can move one.
    fn incr(&self, key: &str) -> Result<u64, CacheError>;

    fn add_multi(&self, entries: Vec<(String, Vec<u8>)>) -> Result<(), CacheError> {
        for (key, value) in entries {
            self.add(&key, value)?;
        }
        Ok(())
    }
}

/// In-process cache shared by every handler of one server.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Vec<u8>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Drops an entry the way a real cache would under memory pressure.
    pub fn evict(&self, key: &str) -> bool {
        self.entries().remove(key).is_some()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        Ok(self.entries().get(key).cloned())
    }

    fn set(&self, key: &str, value: Vec<u8>) -> Result<(), CacheError> {
        self.entries().insert(key.to_string(), value);
        Ok(())
    }

    fn add(&self, key: &str, value: Vec<u8>) -> Result<bool, CacheError> {
        let mut entries = self.entries();
        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(key.to_string(), value);
        Ok(true)
    }

    fn get_multi(&self, keys: &[String]) -> Result<HashMap<String, Vec<u8>>, CacheError> {
        let entries = self.entries();
        Ok(keys
            .iter()
            .filter_map(|key| entries.get(key).map(|value| (key.clone(), value.clone())))
            .collect())
    }

    fn delete_multi(&self, keys: &[String]) -> Result<(), CacheError> {
        let mut entries = self.entries();
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    fn incr(&self, key: &str) -> Result<u64, CacheError> {
        let mut entries = self.entries();
        let current = match entries.get(key) {
            Some(bytes) => {
                let raw: [u8; 8] = bytes.as_slice().try_into().map_err(|_| {
                    CacheError::NotACounter {
                        key: key.to_string(),
                    }
                })?;
                u64::from_le_bytes(raw)
            }
            None => 0,
        };
        let next = current + 1;
        entries.insert(key.to_string(), next.to_le_bytes().to_vec());
        Ok(next)
    }
}
