//! Publish/subscribe key-value feed boundary.
//!
//! The realtime database transport is external; this module only fixes the
//! contract the monitor relies on ([`Feed`]) and ships an in-process
//! implementation ([`MemoryFeed`]) used by the CLI and by tests.

#![allow(missing_docs)]

pub mod memory;

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::core::errors::Result;

pub use memory::MemoryFeed;

/// One delivery from the feed: the current value at `path`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEvent {
    pub path: String,
    pub value: Value,
    /// Server-side write time, when the transport provides one.
    pub server_timestamp: Option<DateTime<Utc>>,
}

pub type FeedCallback = Arc<dyn Fn(&FeedEvent) + Send + Sync>;

pub trait Feed: Send + Sync {
    /// Register `callback` for `path`. Implementations may deliver the current
    /// value immediately, before returning.
    fn subscribe(&self, path: &str, callback: FeedCallback) -> Result<Subscription>;

    /// Overwrite the value at `path`. `Value::Null` deletes it.
    fn set(&self, path: &str, value: Value) -> Result<()>;
}

impl<F: Feed + ?Sized> Feed for Arc<F> {
    fn subscribe(&self, path: &str, callback: FeedCallback) -> Result<Subscription> {
        (**self).subscribe(path, callback)
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        (**self).set(path, value)
    }
}

/// Handle that unsubscribes exactly once, explicitly or on drop.
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    #[must_use]
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.release_now();
    }

    fn release_now(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.release.is_some())
            .finish()
    }
}

/// Canonical form of a feed path: no leading, trailing or doubled slashes.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn subscription_releases_once() {
        let released = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&released);
        let sub = Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        sub.unsubscribe();
        assert_eq!(released.load(Ordering::SeqCst), 1);

        let counter = Arc::clone(&released);
        drop(Subscription::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        assert_eq!(released.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn paths_are_normalized() {
        assert_eq!(normalize_path("/kontrol//paksa_usir/"), "kontrol/paksa_usir");
        assert_eq!(normalize_path("/"), "");
    }
}
