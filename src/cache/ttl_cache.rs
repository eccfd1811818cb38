use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::{CacheDiagnostic, CacheEntry, CacheOptions};
use crate::host::{Clock, DurableStorage};

/// Key/value cache with a fixed time-to-live, written through to durable
/// storage after every mutation.
///
/// Expiry is pure TTL: reads never refresh an entry. Only [`get`] evicts
/// stale entries; [`has`] and [`size`] report whatever is held in memory,
/// expired or not.
///
/// Storage failures never reach the caller. They are logged and recorded as
/// [`CacheDiagnostic`]s while the in-memory store stays authoritative.
///
/// [`get`]: TimeBoundedCache::get
/// [`has`]: TimeBoundedCache::has
/// [`size`]: TimeBoundedCache::size
pub struct TimeBoundedCache {
    store: HashMap<String, CacheEntry>,
    options: CacheOptions,
    storage: Arc<dyn DurableStorage>,
    clock: Arc<dyn Clock>,
    diagnostics: Vec<CacheDiagnostic>,
}

impl TimeBoundedCache {
    /// Build a cache, restoring the fresh part of any stored snapshot.
    pub fn new(
        options: CacheOptions,
        storage: Arc<dyn DurableStorage>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let mut cache = Self {
            store: HashMap::new(),
            options,
            storage,
            clock,
            diagnostics: Vec::new(),
        };
        cache.store = cache.load();
        cache
    }

    pub fn with_defaults(storage: Arc<dyn DurableStorage>, clock: Arc<dyn Clock>) -> Self {
        Self::new(CacheOptions::default(), storage, clock)
    }

    fn load(&mut self) -> HashMap<String, CacheEntry> {
        let raw = match self.storage.read(&self.options.storage_key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return HashMap::new(),
            Err(err) => {
                warn!(
                    storage_key = %self.options.storage_key,
                    error = %err,
                    "Failed to load video cache"
                );
                self.diagnostics
                    .push(CacheDiagnostic::StorageRead(err.to_string()));
                return HashMap::new();
            }
        };

        let parsed: HashMap<String, CacheEntry> = match serde_json::from_str(&raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(
                    storage_key = %self.options.storage_key,
                    error = %err,
                    "Discarding malformed video cache snapshot"
                );
                self.diagnostics
                    .push(CacheDiagnostic::MalformedSnapshot(err.to_string()));
                return HashMap::new();
            }
        };

        let now = self.clock.now_ms();
        let total = parsed.len();
        let fresh: HashMap<String, CacheEntry> = parsed
            .into_iter()
            .filter(|(_, entry)| entry.is_fresh(now, self.options.ttl))
            .collect();
        debug!(
            restored = fresh.len(),
            dropped = total - fresh.len(),
            "Restored video cache snapshot"
        );
        fresh
    }

    fn persist(&mut self) {
        let snapshot = match serde_json::to_string(&self.store) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "Failed to serialize video cache");
                self.diagnostics
                    .push(CacheDiagnostic::StorageWrite(err.to_string()));
                return;
            }
        };
        if let Err(err) = self.storage.write(&self.options.storage_key, &snapshot) {
            warn!(
                storage_key = %self.options.storage_key,
                error = %err,
                "Failed to save video cache"
            );
            self.diagnostics
                .push(CacheDiagnostic::StorageWrite(err.to_string()));
        }
    }

    /// Return the value stored under `key` if it is still fresh. A stale
    /// entry is removed and the removal persisted.
    pub fn get(&mut self, key: &str) -> Option<Value> {
        let entry = self.store.get(key)?;
        if entry.is_fresh(self.clock.now_ms(), self.options.ttl) {
            return Some(entry.data.clone());
        }

        debug!(key, "Evicting expired cache entry");
        self.store.remove(key);
        self.persist();
        None
    }

    /// Typed [`get`](Self::get). A value of the wrong shape reads as absent.
    pub fn get_as<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.get(key)?;
        match serde_json::from_value(value) {
            Ok(typed) => Some(typed),
            Err(err) => {
                warn!(key, error = %err, "Cached value has an unexpected shape");
                self.diagnostics.push(CacheDiagnostic::TypeMismatch {
                    key: key.to_string(),
                    reason: err.to_string(),
                });
                None
            }
        }
    }

    /// Store `value`, replacing any previous entry and restarting its TTL.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let entry = CacheEntry {
            data: value,
            timestamp: self.clock.now_ms(),
        };
        self.store.insert(key.into(), entry);
        self.persist();
    }

    /// Typed [`set`](Self::set). Values that cannot be represented as JSON
    /// are skipped.
    pub fn set_as<T: Serialize + ?Sized>(&mut self, key: impl Into<String>, value: &T) {
        let key = key.into();
        match serde_json::to_value(value) {
            Ok(value) => self.set(key, value),
            Err(err) => {
                warn!(key = %key, error = %err, "Value cannot be cached");
                self.diagnostics.push(CacheDiagnostic::TypeMismatch {
                    key,
                    reason: err.to_string(),
                });
            }
        }
    }

    /// Remove one entry. Returns whether anything was removed.
    pub fn delete(&mut self, key: &str) -> bool {
        if self.store.remove(key).is_none() {
            return false;
        }
        self.persist();
        true
    }

    /// Drop every entry and erase the durable snapshot.
    pub fn clear(&mut self) {
        self.store.clear();
        if let Err(err) = self.storage.remove(&self.options.storage_key) {
            warn!(
                storage_key = %self.options.storage_key,
                error = %err,
                "Failed to erase video cache snapshot"
            );
            self.diagnostics
                .push(CacheDiagnostic::StorageRemove(err.to_string()));
        }
    }

    /// Whether an entry is held for `key`. Does not check expiry.
    pub fn has(&self, key: &str) -> bool {
        self.store.contains_key(key)
    }

    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.store.keys().cloned().collect();
        keys.sort();
        keys
    }

    /// Time since `key` was stored, if it is held.
    pub fn age_of(&self, key: &str) -> Option<Duration> {
        let entry = self.store.get(key)?;
        let elapsed = self.clock.now_ms().saturating_sub(entry.timestamp).max(0);
        Some(Duration::from_millis(elapsed.unsigned_abs()))
    }

    pub fn ttl(&self) -> Duration {
        self.options.ttl
    }

    pub fn storage_key(&self) -> &str {
        &self.options.storage_key
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn diagnostics(&self) -> &[CacheDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<CacheDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }
}
