use crate::Result;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// The shared hash behind the distributed counter. One key holds one hash whose
/// fields are request ids and whose values are insertion timestamps.
///
/// Implementations report connectivity failures as `Err`; the counter turns
/// them into fail-open results.
pub trait CounterStore: Send + Sync {
    /// Number of fields in the hash.
    fn count(&self, key: &str) -> Result<u64>;

    /// Inserts `field => timestamp` only if the hash holds fewer than `limit`
    /// fields, as one atomic step across every client of the store.
    /// Returns whether the field was inserted.
    fn admit(&self, key: &str, field: &str, timestamp: i64, limit: u64, ttl_secs: u64)
        -> Result<bool>;

    fn remove(&self, key: &str, field: &str) -> Result<()>;

    /// Every `(field, value)` pair of the hash.
    fn entries(&self, key: &str) -> Result<Vec<(String, String)>>;

    /// Removes the given fields, returning how many existed.
    fn remove_many(&self, key: &str, fields: &[String]) -> Result<u64>;
}

/// A store living in this process. Admission is atomic for every thread
/// sharing the instance, which makes it suitable for single-process
/// deployments and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    hashes: Mutex<HashMap<String, HashMap<String, String>>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a connectivity outage: every operation fails while set.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Writes a field directly, bypassing the limit.
    pub fn insert(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut hashes = self.lock()?;
        hashes
            .entry(key.to_owned())
            .or_default()
            .insert(field.to_owned(), value.to_owned());
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, HashMap<String, String>>>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(crate::Error::msg("memory store marked unavailable"));
        }
        Ok(self
            .hashes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()))
    }
}

impl CounterStore for MemoryStore {
    fn count(&self, key: &str) -> Result<u64> {
        let hashes = self.lock()?;
        Ok(hashes.get(key).map_or(0, |h| h.len() as u64))
    }

    fn admit(
        &self,
        key: &str,
        field: &str,
        timestamp: i64,
        limit: u64,
        _ttl_secs: u64,
    ) -> Result<bool> {
        let mut hashes = self.lock()?;
        let hash = hashes.entry(key.to_owned()).or_default();
        if hash.len() as u64 >= limit {
            return Ok(false);
        }
        hash.insert(field.to_owned(), timestamp.to_string());
        Ok(true)
    }

    fn remove(&self, key: &str, field: &str) -> Result<()> {
        let mut hashes = self.lock()?;
        if let Some(hash) = hashes.get_mut(key) {
            hash.remove(field);
            if hash.is_empty() {
                hashes.remove(key);
            }
        }
        Ok(())
    }

    fn entries(&self, key: &str) -> Result<Vec<(String, String)>> {
        let hashes = self.lock()?;
        Ok(hashes
            .get(key)
            .map(|h| h.iter().map(|(f, v)| (f.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    fn remove_many(&self, key: &str, fields: &[String]) -> Result<u64> {
        let mut hashes = self.lock()?;
        let mut removed = 0;
        if let Some(hash) = hashes.get_mut(key) {
            for field in fields {
                if hash.remove(field).is_some() {
                    removed += 1;
                }
            }
            if hash.is_empty() {
                hashes.remove(key);
            }
        }
        Ok(removed)
    }
}
