// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! List/watch informers and the shared object store.
//!
//! An informer primes its store from a full list *before* emitting any
//! event, so a handler observing one object can already see every other.
//! It then follows the watch stream, re-emitting the full cached set on a
//! resync interval; a broken watch falls back to a fresh list. Objects that
//! disappeared between lists are delivered as deletions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use mitosis_client::{ObjectApi, WatchEvent};
use mitosis_core::{Namespace, ReplicableObject};

const RELIST_BACKOFF: Duration = Duration::from_secs(5);

/// A keyed in-memory cache of one resource kind.
///
/// Shared between the informer task (the primary writer) and the event
/// handlers, which write mutations through immediately so later decisions
/// in the same burst do not act on a stale view. The map's internal
/// sharding serializes the two writers.
pub struct Store<T> {
    items: DashMap<String, T>,
    key_of: fn(&T) -> String,
}

impl<T: Clone> Store<T> {
    /// Creates an empty store with the given key function.
    #[must_use]
    pub fn new(key_of: fn(&T) -> String) -> Self {
        Self { items: DashMap::new(), key_of }
    }

    /// The store key of an item.
    pub fn key_of(&self, item: &T) -> String {
        (self.key_of)(item)
    }

    /// Looks up an item by key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<T> {
        self.items.get(key).map(|entry| entry.value().clone())
    }

    /// True when an item with the key is cached.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.items.contains_key(key)
    }

    /// Inserts or replaces an item.
    pub fn insert(&self, item: T) {
        self.items.insert(self.key_of(&item), item);
    }

    /// Removes an item.
    pub fn remove(&self, item: &T) {
        self.items.remove(&self.key_of(item));
    }

    /// All cached keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.items.iter().map(|entry| entry.key().clone()).collect();
        keys.sort();
        keys
    }

    /// All cached items, sorted by key.
    #[must_use]
    pub fn values(&self) -> Vec<T> {
        let mut items: Vec<(String, T)> =
            self.items.iter().map(|entry| (entry.key().clone(), entry.value().clone())).collect();
        items.sort_by(|a, b| a.0.cmp(&b.0));
        items.into_iter().map(|(_, item)| item).collect()
    }

    /// Replaces the full contents, returning the items that are no longer
    /// present.
    pub fn replace(&self, items: Vec<T>) -> Vec<T> {
        let fresh: Vec<(String, T)> =
            items.into_iter().map(|item| (self.key_of(&item), item)).collect();
        let displaced: Vec<T> = self
            .items
            .iter()
            .filter(|entry| !fresh.iter().any(|(key, _)| key == entry.key()))
            .map(|entry| entry.value().clone())
            .collect();
        self.items.clear();
        for (key, item) in fresh {
            self.items.insert(key, item);
        }
        displaced
    }
}

/// Creates a store keyed by canonical object keys.
#[must_use]
pub fn object_store<T: ReplicableObject>() -> Store<T> {
    Store::new(|object: &T| object.key())
}

/// Creates a store keyed by bare namespace names.
#[must_use]
pub fn namespace_store() -> Store<Namespace> {
    Store::new(|namespace: &Namespace| namespace.name().to_string())
}

/// A change observed by an informer, after the store was brought up to
/// date. Primed and resynced items surface as `Added`.
pub(crate) enum InformerEvent<T> {
    Added(T),
    Modified(T),
    Deleted(T),
}

pub(crate) struct InformerHandle {
    task: JoinHandle<()>,
}

impl Drop for InformerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawns the list/watch/resync loop for one kind. Events mapped to `None`
/// still update the store but are not delivered.
pub(crate) fn spawn_informer<T, E, M>(
    api: Arc<dyn ObjectApi<T>>,
    store: Arc<Store<T>>,
    synced: Arc<AtomicBool>,
    tx: mpsc::Sender<E>,
    resync_period: Duration,
    map: M,
) -> InformerHandle
where
    T: ReplicableObject,
    E: Send + 'static,
    M: Fn(InformerEvent<T>) -> Option<E> + Send + Sync + 'static,
{
    let task = tokio::spawn(async move {
        loop {
            let list = match api.list().await {
                Ok(list) => list,
                Err(err) => {
                    warn!(kind = T::KIND, error = %err, "list failed");
                    tokio::time::sleep(RELIST_BACKOFF).await;
                    continue;
                }
            };

            // prime the store completely before dispatching anything
            let displaced = store.replace(list.items.clone());
            for item in list.items {
                if deliver(&tx, &map, InformerEvent::Added(item)).await.is_err() {
                    return;
                }
            }
            for item in displaced {
                if deliver(&tx, &map, InformerEvent::Deleted(item)).await.is_err() {
                    return;
                }
            }
            synced.store(true, Ordering::SeqCst);

            let mut watch = match api.watch(&list.resource_version).await {
                Ok(watch) => watch,
                Err(err) => {
                    warn!(kind = T::KIND, error = %err, "watch failed");
                    tokio::time::sleep(RELIST_BACKOFF).await;
                    continue;
                }
            };

            let start = tokio::time::Instant::now() + resync_period;
            let mut resync = tokio::time::interval_at(start, resync_period);
            resync.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    event = watch.recv() => {
                        let Some(event) = event else {
                            debug!(kind = T::KIND, "watch ended, listing again");
                            break;
                        };
                        let event = match event {
                            WatchEvent::Added(item) => {
                                store.insert(item.clone());
                                InformerEvent::Added(item)
                            }
                            WatchEvent::Modified(item) => {
                                store.insert(item.clone());
                                InformerEvent::Modified(item)
                            }
                            WatchEvent::Deleted(item) => {
                                store.remove(&item);
                                InformerEvent::Deleted(item)
                            }
                        };
                        if deliver(&tx, &map, event).await.is_err() {
                            return;
                        }
                    }
                    _ = resync.tick() => {
                        debug!(kind = T::KIND, "resync");
                        for item in store.values() {
                            if deliver(&tx, &map, InformerEvent::Added(item)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
    });
    InformerHandle { task }
}

async fn deliver<T, E, M>(
    tx: &mpsc::Sender<E>,
    map: &M,
    event: InformerEvent<T>,
) -> Result<(), ()>
where
    M: Fn(InformerEvent<T>) -> Option<E>,
{
    match map(event) {
        Some(event) => tx.send(event).await.map_err(|_| ()),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use mitosis_core::{ConfigMap, ObjectMeta};

    use super::*;

    fn config_map(namespace: &str, name: &str) -> ConfigMap {
        ConfigMap { metadata: ObjectMeta::new(namespace, name), ..ConfigMap::default() }
    }

    #[test]
    fn test_store_round_trip() {
        let store = object_store::<ConfigMap>();
        store.insert(config_map("default", "b"));
        store.insert(config_map("default", "a"));

        assert!(store.contains("default/a"));
        assert_eq!(store.keys(), vec!["default/a".to_string(), "default/b".to_string()]);
        assert_eq!(store.get("default/a").unwrap().metadata.name, "a");

        store.remove(&config_map("default", "a"));
        assert!(!store.contains("default/a"));
    }

    #[test]
    fn test_store_replace_reports_displaced() {
        let store = object_store::<ConfigMap>();
        store.insert(config_map("default", "a"));
        store.insert(config_map("default", "b"));

        let displaced = store.replace(vec![config_map("default", "b"), config_map("default", "c")]);
        assert_eq!(displaced.len(), 1);
        assert_eq!(displaced[0].metadata.key(), "default/a");
        assert_eq!(store.keys(), vec!["default/b".to_string(), "default/c".to_string()]);
    }

    #[test]
    fn test_namespace_store_keyed_by_name() {
        let store = namespace_store();
        store.insert(Namespace::new("target-1"));
        assert!(store.contains("target-1"));
    }
}
