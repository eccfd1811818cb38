//! Rate limiting for scroll and resize driven work.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;

/// Admits one call per window. Time is passed in so callers decide which
/// clock drives it.
#[derive(Debug, Clone)]
pub struct Throttle {
    window_ms: i64,
    last_admitted: Option<i64>,
}

impl Throttle {
    pub fn new(window: Duration) -> Self {
        Self {
            window_ms: i64::try_from(window.as_millis()).unwrap_or(i64::MAX),
            last_admitted: None,
        }
    }

    pub fn try_acquire(&mut self, now_ms: i64) -> bool {
        match self.last_admitted {
            Some(last) if now_ms.saturating_sub(last) < self.window_ms => false,
            _ => {
                self.last_admitted = Some(now_ms);
                true
            }
        }
    }
}

/// Runs only the most recent call, once `wait` has passed without another
/// call. Must be used inside a tokio runtime.
#[derive(Debug)]
pub struct Debouncer {
    wait: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(wait: Duration) -> Self {
        Self {
            wait,
            pending: None,
        }
    }

    pub fn call<F, Fut>(&mut self, f: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let wait = self.wait;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(wait).await;
            f().await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
