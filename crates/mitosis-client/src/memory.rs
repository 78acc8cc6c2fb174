// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! A single-process in-memory cluster.
//!
//! Backs the test suites and local experimentation with the same contract a
//! real orchestrator enforces: a monotonically increasing resource version
//! assigned on every mutation, conflict on stale updates and delete
//! preconditions, and watch fan-out for every change. Every mutation is
//! also recorded in an action log so tests can assert on exactly which API
//! calls were made.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;

use mitosis_core::{ConfigMap, Namespace, ReplicableObject, Secret};

use crate::api::{ObjectApi, ObjectList, WatchEvent, WatchStream};
use crate::error::{ClientError, Result};

const WATCH_CHANNEL_CAPACITY: usize = 64;

/// The verb of a recorded mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionVerb {
    /// An object was created.
    Create,
    /// An object was updated.
    Update,
    /// An object was deleted.
    Delete,
}

/// One recorded mutation against the in-memory cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    /// What happened.
    pub verb: ActionVerb,
    /// The resource kind acted on.
    pub kind: &'static str,
    /// The canonical key of the object.
    pub key: String,
}

struct Table<T> {
    items: DashMap<String, T>,
    watchers: Mutex<Vec<mpsc::Sender<WatchEvent<T>>>>,
}

impl<T> Default for Table<T> {
    fn default() -> Self {
        Self { items: DashMap::new(), watchers: Mutex::new(Vec::new()) }
    }
}

impl<T: Clone + Send + 'static> Table<T> {
    async fn notify(&self, event: WatchEvent<T>) {
        let senders: Vec<mpsc::Sender<WatchEvent<T>>> =
            self.watchers.lock().expect("watcher registry poisoned").clone();
        for sender in senders {
            // A full or closed watcher is the consumer's problem; the next
            // list will resynchronize it.
            let _ = sender.send(event.clone()).await;
        }
        self.watchers
            .lock()
            .expect("watcher registry poisoned")
            .retain(|sender| !sender.is_closed());
    }
}

fn object_key<T: ReplicableObject>(object: &T) -> String {
    let meta = object.meta();
    if meta.namespace.is_empty() {
        meta.name.clone()
    } else {
        meta.key()
    }
}

fn lookup_key(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}/{name}")
    }
}

/// An in-memory orchestrator implementing [`ObjectApi`] for every
/// replicable kind plus namespaces.
#[derive(Default)]
pub struct MemoryCluster {
    version: AtomicU64,
    actions: Mutex<Vec<Action>>,
    namespaces: Table<Namespace>,
    config_maps: Table<ConfigMap>,
    secrets: Table<Secret>,
}

impl MemoryCluster {
    /// Creates an empty cluster.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a namespace, notifying namespace watchers.
    pub async fn add_namespace(&self, name: &str) -> Result<Namespace> {
        ObjectApi::<Namespace>::create(self, &Namespace::new(name)).await
    }

    /// A copy of every mutation recorded so far.
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().expect("action log poisoned").clone()
    }

    /// Drains and returns the recorded mutations.
    pub fn take_actions(&self) -> Vec<Action> {
        std::mem::take(&mut *self.actions.lock().expect("action log poisoned"))
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn collection_version(&self) -> String {
        self.version.load(Ordering::SeqCst).to_string()
    }

    fn record(&self, verb: ActionVerb, kind: &'static str, key: &str) {
        self.actions
            .lock()
            .expect("action log poisoned")
            .push(Action { verb, kind, key: key.to_string() });
    }

    async fn list_in<T: ReplicableObject>(&self, table: &Table<T>) -> Result<ObjectList<T>> {
        let mut items: Vec<T> = table.items.iter().map(|entry| entry.value().clone()).collect();
        items.sort_by_key(object_key);
        Ok(ObjectList { items, resource_version: self.collection_version() })
    }

    async fn watch_in<T: ReplicableObject>(&self, table: &Table<T>) -> Result<WatchStream<T>> {
        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        table.watchers.lock().expect("watcher registry poisoned").push(tx);
        Ok(rx)
    }

    async fn get_in<T: ReplicableObject>(
        &self,
        table: &Table<T>,
        namespace: &str,
        name: &str,
    ) -> Result<T> {
        let key = lookup_key(namespace, name);
        table
            .items
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or(ClientError::NotFound { kind: T::KIND, key })
    }

    async fn create_in<T: ReplicableObject>(&self, table: &Table<T>, object: &T) -> Result<T> {
        let key = object_key(object);
        if table.items.contains_key(&key) {
            return Err(ClientError::Conflict { kind: T::KIND, key });
        }
        let mut object = object.clone();
        object.meta_mut().resource_version = Some(self.next_version());
        table.items.insert(key.clone(), object.clone());
        self.record(ActionVerb::Create, T::KIND, &key);
        table.notify(WatchEvent::Added(object.clone())).await;
        Ok(object)
    }

    async fn update_in<T: ReplicableObject>(&self, table: &Table<T>, object: &T) -> Result<T> {
        let key = object_key(object);
        {
            let current = table
                .items
                .get(&key)
                .ok_or_else(|| ClientError::NotFound { kind: T::KIND, key: key.clone() })?;
            if current.value().meta().resource_version != object.meta().resource_version {
                return Err(ClientError::Conflict { kind: T::KIND, key });
            }
        }
        let mut object = object.clone();
        object.meta_mut().resource_version = Some(self.next_version());
        table.items.insert(key.clone(), object.clone());
        self.record(ActionVerb::Update, T::KIND, &key);
        table.notify(WatchEvent::Modified(object.clone())).await;
        Ok(object)
    }

    async fn delete_in<T: ReplicableObject>(
        &self,
        table: &Table<T>,
        namespace: &str,
        name: &str,
        resource_version: &str,
    ) -> Result<()> {
        let key = lookup_key(namespace, name);
        let current = table
            .items
            .get(&key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ClientError::NotFound { kind: T::KIND, key: key.clone() })?;
        if !resource_version.is_empty()
            && current.meta().resource_version.as_deref() != Some(resource_version)
        {
            return Err(ClientError::Conflict { kind: T::KIND, key });
        }
        table.items.remove(&key);
        self.record(ActionVerb::Delete, T::KIND, &key);
        table.notify(WatchEvent::Deleted(current)).await;
        Ok(())
    }
}

/// Folds write-only string entries into the binary payload, the way the
/// real API server does on admission.
fn normalized(secret: &Secret) -> Secret {
    let mut secret = secret.clone();
    let entries = std::mem::take(&mut secret.string_data);
    for (key, value) in entries {
        secret.data.insert(key, value.into_bytes());
    }
    secret
}

#[async_trait]
impl ObjectApi<ConfigMap> for MemoryCluster {
    async fn list(&self) -> Result<ObjectList<ConfigMap>> {
        self.list_in(&self.config_maps).await
    }

    async fn watch(&self, _resource_version: &str) -> Result<WatchStream<ConfigMap>> {
        self.watch_in(&self.config_maps).await
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<ConfigMap> {
        self.get_in(&self.config_maps, namespace, name).await
    }

    async fn create(&self, object: &ConfigMap) -> Result<ConfigMap> {
        self.create_in(&self.config_maps, object).await
    }

    async fn update(&self, object: &ConfigMap) -> Result<ConfigMap> {
        self.update_in(&self.config_maps, object).await
    }

    async fn delete(&self, namespace: &str, name: &str, resource_version: &str) -> Result<()> {
        self.delete_in(&self.config_maps, namespace, name, resource_version).await
    }
}

#[async_trait]
impl ObjectApi<Secret> for MemoryCluster {
    async fn list(&self) -> Result<ObjectList<Secret>> {
        self.list_in(&self.secrets).await
    }

    async fn watch(&self, _resource_version: &str) -> Result<WatchStream<Secret>> {
        self.watch_in(&self.secrets).await
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Secret> {
        self.get_in(&self.secrets, namespace, name).await
    }

    async fn create(&self, object: &Secret) -> Result<Secret> {
        self.create_in(&self.secrets, &normalized(object)).await
    }

    async fn update(&self, object: &Secret) -> Result<Secret> {
        self.update_in(&self.secrets, &normalized(object)).await
    }

    async fn delete(&self, namespace: &str, name: &str, resource_version: &str) -> Result<()> {
        self.delete_in(&self.secrets, namespace, name, resource_version).await
    }
}

#[async_trait]
impl ObjectApi<Namespace> for MemoryCluster {
    async fn list(&self) -> Result<ObjectList<Namespace>> {
        self.list_in(&self.namespaces).await
    }

    async fn watch(&self, _resource_version: &str) -> Result<WatchStream<Namespace>> {
        self.watch_in(&self.namespaces).await
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<Namespace> {
        self.get_in(&self.namespaces, namespace, name).await
    }

    async fn create(&self, object: &Namespace) -> Result<Namespace> {
        self.create_in(&self.namespaces, object).await
    }

    async fn update(&self, object: &Namespace) -> Result<Namespace> {
        self.update_in(&self.namespaces, object).await
    }

    async fn delete(&self, namespace: &str, name: &str, resource_version: &str) -> Result<()> {
        self.delete_in(&self.namespaces, namespace, name, resource_version).await
    }
}
