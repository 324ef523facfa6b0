//! Manual deterrent override: a boolean switch stored in the feed that forces
//! the buzzer/servo on regardless of what the sensor sees.

#![allow(missing_docs)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;

use crate::core::errors::Result;
use crate::feed::{Feed, FeedCallback, FeedEvent, Subscription, normalize_path};

pub type OverrideListener = Arc<dyn Fn(bool) + Send + Sync>;

/// Mirrors the switch at `path` and writes changes back to the feed.
pub struct ManualOverride<F: Feed> {
    feed: F,
    path: String,
    active: Arc<AtomicBool>,
    listener: Option<OverrideListener>,
    subscription: Option<Subscription>,
}

impl<F: Feed> ManualOverride<F> {
    pub fn new(feed: F, path: &str) -> Self {
        Self {
            feed,
            path: normalize_path(path),
            active: Arc::new(AtomicBool::new(false)),
            listener: None,
            subscription: None,
        }
    }

    /// Called with the new state on every feed delivery.
    #[must_use]
    pub fn with_listener(mut self, listener: impl Fn(bool) + Send + Sync + 'static) -> Self {
        self.listener = Some(Arc::new(listener));
        self
    }

    pub fn start(&mut self) -> Result<()> {
        if self.subscription.is_some() {
            return Ok(());
        }
        let active = Arc::clone(&self.active);
        let listener = self.listener.clone();
        let callback: FeedCallback = Arc::new(move |event: &FeedEvent| {
            let on = is_switched_on(&event.value);
            active.store(on, Ordering::SeqCst);
            if let Some(listener) = &listener {
                listener(on);
            }
        });
        self.subscription = Some(self.feed.subscribe(&self.path, callback)?);
        Ok(())
    }

    pub fn stop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    pub fn set(&self, on: bool) -> Result<()> {
        let previous = self.active.swap(on, Ordering::SeqCst);
        if let Err(err) = self.feed.set(&self.path, Value::Bool(on)) {
            self.active.store(previous, Ordering::SeqCst);
            return Err(err);
        }
        Ok(())
    }

    /// Flip the switch; returns the state that was written.
    pub fn toggle(&self) -> Result<bool> {
        let next = !self.is_active();
        self.set(next)?;
        Ok(next)
    }
}

/// Only a literal `true` counts; strings, numbers and null are off.
#[must_use]
pub fn is_switched_on(value: &Value) -> bool {
    value == &Value::Bool(true)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;

    use super::*;
    use crate::feed::MemoryFeed;

    #[test]
    fn mirrors_existing_switch_on_start() {
        let feed = MemoryFeed::new();
        feed.set("kontrol/paksa_usir", json!(true)).unwrap();
        let mut control = ManualOverride::new(feed, "kontrol/paksa_usir");
        assert!(!control.is_active());
        control.start().unwrap();
        assert!(control.is_active());
    }

    #[test]
    fn toggle_writes_back_and_notifies() {
        let feed = MemoryFeed::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut control = ManualOverride::new(feed.clone(), "kontrol/paksa_usir")
            .with_listener(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            });
        control.start().unwrap();

        assert!(control.toggle().unwrap());
        assert_eq!(feed.get("kontrol/paksa_usir"), json!(true));
        assert!(!control.toggle().unwrap());
        assert_eq!(feed.get("kontrol/paksa_usir"), json!(false));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn non_boolean_values_read_as_off() {
        assert!(!is_switched_on(&json!("true")));
        assert!(!is_switched_on(&json!(1)));
        assert!(!is_switched_on(&Value::Null));
        assert!(is_switched_on(&json!(true)));
    }

    #[test]
    fn failed_write_restores_previous_state() {
        let feed = MemoryFeed::new();
        let control = ManualOverride::new(feed.clone(), "kontrol/paksa_usir");
        feed.close();
        assert!(control.toggle().is_err());
        assert!(!control.is_active());
    }
}
