//! In-process hierarchical feed with realtime-database delivery semantics.
//!
//! * subscribing replays the current value at the path, if any;
//! * a write notifies subscribers at the written path, its ancestors and its
//!   descendants, each with the value at their own path;
//! * callbacks run after the store lock is released, so they may write back.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::{Map, Value};

use super::{Feed, FeedCallback, FeedEvent, Subscription, normalize_path};
use crate::core::errors::{GuardError, Result};

struct Subscriber {
    id: u64,
    path: String,
    callback: FeedCallback,
}

#[derive(Default)]
struct Store {
    root: Value,
    stamps: HashMap<String, DateTime<Utc>>,
    subscribers: Vec<Subscriber>,
    next_id: u64,
    closed: bool,
}

type Delivery = (FeedCallback, FeedEvent);

impl Store {
    fn value_at(&self, path: &str) -> Value {
        let mut node = &self.root;
        for segment in segments(path) {
            match node.get(segment) {
                Some(child) => node = child,
                None => return Value::Null,
            }
        }
        node.clone()
    }

    fn write(&mut self, path: &str, value: Value) {
        let parts: Vec<&str> = segments(path).collect();
        let Some((last, parents)) = parts.split_last() else {
            self.root = value;
            return;
        };
        let mut node = &mut self.root;
        for segment in parents {
            node = ensure_object(node)
                .entry((*segment).to_string())
                .or_insert(Value::Null);
        }
        let map = ensure_object(node);
        if value.is_null() {
            map.remove(*last);
        } else {
            map.insert((*last).to_string(), value);
        }
    }

    /// Deliveries for every subscriber related to `written`.
    fn deliveries(&self, written: &str) -> Vec<Delivery> {
        let stamp = self.stamps.get(written).copied();
        self.subscribers
            .iter()
            .filter(|sub| related(&sub.path, written))
            .map(|sub| {
                let event = FeedEvent {
                    path: sub.path.clone(),
                    value: self.value_at(&sub.path),
                    server_timestamp: stamp,
                };
                (Arc::clone(&sub.callback), event)
            })
            .collect()
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

fn ensure_object(node: &mut Value) -> &mut Map<String, Value> {
    if !node.is_object() {
        *node = Value::Object(Map::new());
    }
    match node {
        Value::Object(map) => map,
        _ => unreachable!("node was just replaced with an object"),
    }
}

/// Same path, ancestor, or descendant.
fn related(subscribed: &str, written: &str) -> bool {
    fn is_prefix(parent: &str, child: &str) -> bool {
        parent.is_empty()
            || child == parent
            || (child.starts_with(parent) && child.as_bytes().get(parent.len()) == Some(&b'/'))
    }
    is_prefix(subscribed, written) || is_prefix(written, subscribed)
}

fn dispatch(deliveries: Vec<Delivery>) {
    for (callback, event) in deliveries {
        callback(&event);
    }
}

/// Cloneable handle to a shared in-memory store.
#[derive(Clone, Default)]
pub struct MemoryFeed {
    store: Arc<Mutex<Store>>,
}

impl std::fmt::Debug for MemoryFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.lock();
        f.debug_struct("MemoryFeed")
            .field("root", &store.root)
            .field("subscribers", &store.subscribers.len())
            .field("closed", &store.closed)
            .finish()
    }
}

impl MemoryFeed {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` at `path`, optionally stamped with a server write time.
    pub fn publish(
        &self,
        path: &str,
        value: Value,
        server_timestamp: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let path = normalize_path(path);
        let deliveries = {
            let mut store = self.store.lock();
            ensure_open(&store, &path)?;
            store.write(&path, value);
            // A write replaces everything above and below it, stamps included.
            store.stamps.retain(|stamped, _| !related(stamped, &path));
            if let Some(at) = server_timestamp {
                store.stamps.insert(path.clone(), at);
            }
            store.deliveries(&path)
        };
        dispatch(deliveries);
        Ok(())
    }

    /// Re-emit the current value at `path` without changing it.
    pub fn redeliver(&self, path: &str) -> Result<()> {
        let path = normalize_path(path);
        let deliveries = {
            let store = self.store.lock();
            ensure_open(&store, &path)?;
            store.deliveries(&path)
        };
        dispatch(deliveries);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Value {
        self.store.lock().value_at(&normalize_path(path))
    }

    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.store.lock().subscribers.len()
    }

    /// Drop every subscriber and refuse further calls.
    pub fn close(&self) {
        let mut store = self.store.lock();
        store.closed = true;
        store.subscribers.clear();
    }
}

fn ensure_open(store: &Store, path: &str) -> Result<()> {
    if store.closed {
        return Err(GuardError::FeedClosed {
            path: path.to_string(),
        });
    }
    Ok(())
}

impl Feed for MemoryFeed {
    fn subscribe(&self, path: &str, callback: FeedCallback) -> Result<Subscription> {
        let path = normalize_path(path);
        let (id, initial) = {
            let mut store = self.store.lock();
            ensure_open(&store, &path)?;
            let id = store.next_id;
            store.next_id += 1;
            store.subscribers.push(Subscriber {
                id,
                path: path.clone(),
                callback: Arc::clone(&callback),
            });
            let value = store.value_at(&path);
            let initial = (!value.is_null()).then(|| FeedEvent {
                server_timestamp: store.stamps.get(&path).copied(),
                path,
                value,
            });
            (id, initial)
        };
        if let Some(event) = initial {
            callback(&event);
        }

        let store: Weak<Mutex<Store>> = Arc::downgrade(&self.store);
        Ok(Subscription::new(move || {
            if let Some(store) = store.upgrade() {
                store.lock().subscribers.retain(|sub| sub.id != id);
            }
        }))
    }

    fn set(&self, path: &str, value: Value) -> Result<()> {
        self.publish(path, value, None)
    }
}
