mod media;
mod storage;
mod ttl_cache;

pub use media::*;
pub use storage::*;
pub use ttl_cache::*;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_STORAGE_KEY: &str = "video_cache";

/// One cached value with the instant it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub data: Value,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
}

impl CacheEntry {
    pub fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.timestamp) < ttl_ms
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    pub ttl: Duration,
    /// Key of the snapshot record in durable storage.
    pub storage_key: String,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            storage_key: DEFAULT_STORAGE_KEY.to_string(),
        }
    }
}

/// A failure the cache absorbed instead of returning to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheDiagnostic {
    StorageRead(String),
    StorageWrite(String),
    StorageRemove(String),
    MalformedSnapshot(String),
    /// A stored value did not match the type a caller asked for.
    TypeMismatch { key: String, reason: String },
}
