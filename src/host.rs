//! Capabilities the hosting page supplies.
//!
//! Nothing in this crate touches a real page, storage area or network on its
//! own. Production adapters implement these traits against the host; tests
//! supply fakes.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{LoadError, StorageError};
use crate::media::policy::{DeviceHint, NetworkHint};

/// Wall-clock source, in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn set(&self, ms: i64) {
        self.now.store(ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        let delta = i64::try_from(by.as_millis()).unwrap_or(i64::MAX);
        self.now.fetch_add(delta, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Tab-scoped key/value storage that survives reloads.
///
/// Operations are synchronous and may fail at any time (quota, privacy mode,
/// missing host). Implementations use interior mutability so one backend can
/// be shared by several caches.
pub trait DurableStorage: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Options passed to the host's visibility observer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObserveOptions {
    /// Margin around the viewport, in the host's CSS margin syntax.
    pub root_margin: String,
    /// Minimum visible fraction before the callback fires.
    pub threshold: f64,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self {
            root_margin: "50px 0px".to_string(),
            threshold: 0.1,
        }
    }
}

/// One visibility change delivered by the host observer.
#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityEntry {
    pub id: String,
    pub is_intersecting: bool,
}

impl VisibilityEntry {
    pub fn visible(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_intersecting: true,
        }
    }

    pub fn hidden(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_intersecting: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreloadKind {
    Image,
    Fetch,
}

/// Fire-and-forget prefetch request. The controller never observes whether
/// the host honoured it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreloadHint {
    pub kind: PreloadKind,
    pub href: String,
}

impl PreloadHint {
    pub fn image(href: impl Into<String>) -> Self {
        Self {
            kind: PreloadKind::Image,
            href: href.into(),
        }
    }

    pub fn fetch(href: impl Into<String>) -> Self {
        Self {
            kind: PreloadKind::Fetch,
            href: href.into(),
        }
    }
}

/// Page-side capabilities used by [`crate::media::LazyMediaController`].
pub trait MediaHost {
    /// Start reporting visibility changes for `id`.
    fn observe(&mut self, id: &str, options: &ObserveOptions);

    /// Stop reporting visibility changes for `id`.
    fn unobserve(&mut self, id: &str);

    /// Tear down the observer entirely.
    fn disconnect(&mut self);

    /// Point the placeholder `id` at its real media source.
    fn assign_source(&mut self, id: &str, source: &str) -> Result<(), LoadError>;

    fn preload(&mut self, hint: PreloadHint);

    /// Current effective connection type, if the host exposes one.
    fn network(&self) -> Option<NetworkHint> {
        None
    }

    fn device(&self) -> DeviceHint {
        DeviceHint::default()
    }
}

/// Loads a single image and resolves once the host reports success or failure.
#[async_trait]
pub trait ImageLoader: Send + Sync {
    async fn load(&self, url: &str) -> Result<(), LoadError>;
}
