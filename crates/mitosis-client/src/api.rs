// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! The orchestrator API surface the replication engine consumes.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::mpsc;

use mitosis_core::{ConfigMap, Namespace, ReplicableObject, Secret};

use crate::error::Result;

/// A change notification delivered by a watch subscription.
#[derive(Debug, Clone, PartialEq)]
pub enum WatchEvent<T> {
    /// A new object appeared.
    Added(T),
    /// An existing object changed.
    Modified(T),
    /// An object was removed.
    Deleted(T),
}

impl<T> WatchEvent<T> {
    /// Consumes the event, returning the carried object.
    pub fn into_object(self) -> T {
        match self {
            Self::Added(object) | Self::Modified(object) | Self::Deleted(object) => object,
        }
    }
}

/// The receiver half of a watch subscription. The sender side is dropped
/// when the underlying stream ends; consumers re-list and re-subscribe.
pub type WatchStream<T> = mpsc::Receiver<WatchEvent<T>>;

/// A full enumeration of a resource kind.
#[derive(Debug, Clone)]
pub struct ObjectList<T> {
    /// Every object of the kind at list time.
    pub items: Vec<T>,
    /// The collection resource version, usable to start a watch.
    pub resource_version: String,
}

/// Cluster operations for one resource kind.
///
/// Mutations follow optimistic-concurrency rules: `update` submits the
/// object's current resource version and `delete` takes an explicit version
/// precondition; a mismatch surfaces as [`ClientError::Conflict`].
///
/// [`ClientError::Conflict`]: crate::error::ClientError::Conflict
#[async_trait]
pub trait ObjectApi<T: ReplicableObject>: Send + Sync {
    /// Enumerates all objects of the kind across the cluster.
    async fn list(&self) -> Result<ObjectList<T>>;

    /// Subscribes to changes from the given collection resource version.
    async fn watch(&self, resource_version: &str) -> Result<WatchStream<T>>;

    /// Fetches a single object.
    async fn get(&self, namespace: &str, name: &str) -> Result<T>;

    /// Creates an object; the returned copy carries its assigned resource
    /// version.
    async fn create(&self, object: &T) -> Result<T>;

    /// Updates an object in place, conditional on its resource version.
    async fn update(&self, object: &T) -> Result<T>;

    /// Deletes an object, conditional on the given resource version. An
    /// empty version deletes unconditionally.
    async fn delete(&self, namespace: &str, name: &str, resource_version: &str) -> Result<()>;
}

/// Wire-level description of a resource kind served over the REST API.
pub trait RestResource: ReplicableObject + Serialize + DeserializeOwned {
    /// The plural path segment of the kind's collection.
    const PLURAL: &'static str;

    /// Whether mutation paths are scoped under a namespace.
    const NAMESPACED: bool;
}

impl RestResource for ConfigMap {
    const PLURAL: &'static str = "configmaps";
    const NAMESPACED: bool = true;
}

impl RestResource for Secret {
    const PLURAL: &'static str = "secrets";
    const NAMESPACED: bool = true;
}

impl RestResource for Namespace {
    const PLURAL: &'static str = "namespaces";
    const NAMESPACED: bool = false;
}
