// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! The replication event loop and its handlers.
//!
//! One `ObjectReplicator` runs per enabled resource kind. Its informer pair
//! serializes namespace and object events into a single channel; each
//! handler runs to completion before the next event is taken, so the
//! dependency graph only ever has one writer. Every successful mutation is
//! written back into the shared store immediately, keeping later decisions
//! in the same burst consistent before the watch echoes the change.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use mitosis_client::ObjectApi;
use mitosis_core::types::split_key;
use mitosis_core::{Namespace, ObjectMeta, ReplicableObject, ReplicatorOptions};

use crate::adapter::ResourceAdapter;
use crate::error::{ReplicationError, Result};
use crate::graph::DependencyGraph;
use crate::informer::{self, spawn_informer, InformerEvent, Store};
use crate::policy::{self, Allowance, DataUpdate, ReplicationTargets};

const EVENT_QUEUE_SIZE: usize = 256;

/// A change delivered to the replication loop.
pub(crate) enum Event<T> {
    ObjectAdded(T),
    ObjectDeleted(T),
    NamespaceAdded(Namespace),
}

/// A cheap handle onto a running replicator, for liveness reporting.
#[derive(Clone)]
pub struct ReplicatorHandle {
    name: &'static str,
    object_synced: Arc<AtomicBool>,
    namespace_synced: Arc<AtomicBool>,
}

impl ReplicatorHandle {
    /// The replicator's display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// True once both informers have primed their stores.
    #[must_use]
    pub fn synced(&self) -> bool {
        self.object_synced.load(Ordering::SeqCst) && self.namespace_synced.load(Ordering::SeqCst)
    }
}

/// The annotation-driven replication engine for one resource kind.
pub struct ObjectReplicator<A: ResourceAdapter> {
    name: &'static str,
    options: ReplicatorOptions,
    resync_period: Duration,
    adapter: A,
    object_api: Arc<dyn ObjectApi<A::Object>>,
    namespace_api: Arc<dyn ObjectApi<Namespace>>,
    object_store: Arc<Store<A::Object>>,
    namespace_store: Arc<Store<Namespace>>,
    graph: DependencyGraph,
    object_synced: Arc<AtomicBool>,
    namespace_synced: Arc<AtomicBool>,
}

impl<A: ResourceAdapter> ObjectReplicator<A> {
    /// Assembles a replicator; nothing runs until [`run`](Self::run).
    pub fn new(
        name: &'static str,
        adapter: A,
        object_api: Arc<dyn ObjectApi<A::Object>>,
        namespace_api: Arc<dyn ObjectApi<Namespace>>,
        options: ReplicatorOptions,
        resync_period: Duration,
    ) -> Self {
        Self {
            name,
            options,
            resync_period,
            adapter,
            object_api,
            namespace_api,
            object_store: Arc::new(informer::object_store::<A::Object>()),
            namespace_store: Arc::new(informer::namespace_store()),
            graph: DependencyGraph::new(),
            object_synced: Arc::new(AtomicBool::new(false)),
            namespace_synced: Arc::new(AtomicBool::new(false)),
        }
    }

    /// A liveness handle that outlives the move into [`run`](Self::run).
    #[must_use]
    pub fn handle(&self) -> ReplicatorHandle {
        ReplicatorHandle {
            name: self.name,
            object_synced: self.object_synced.clone(),
            namespace_synced: self.namespace_synced.clone(),
        }
    }

    /// The shared object store.
    #[must_use]
    pub fn object_store(&self) -> Arc<Store<A::Object>> {
        self.object_store.clone()
    }

    /// The shared namespace store.
    #[must_use]
    pub fn namespace_store(&self) -> Arc<Store<Namespace>> {
        self.namespace_store.clone()
    }

    /// Runs the informer pair and consumes events until the process ends.
    pub async fn run(mut self) {
        info!(kind = self.name, "running object replicator");
        let (tx, mut rx) = mpsc::channel(EVENT_QUEUE_SIZE);

        let _namespaces = spawn_informer(
            self.namespace_api.clone(),
            self.namespace_store.clone(),
            self.namespace_synced.clone(),
            tx.clone(),
            self.resync_period,
            |event| match event {
                InformerEvent::Added(namespace) => Some(Event::NamespaceAdded(namespace)),
                InformerEvent::Modified(_) | InformerEvent::Deleted(_) => None,
            },
        );
        let _objects = spawn_informer(
            self.object_api.clone(),
            self.object_store.clone(),
            self.object_synced.clone(),
            tx,
            self.resync_period,
            |event| match event {
                InformerEvent::Added(object) | InformerEvent::Modified(object) => {
                    Some(Event::ObjectAdded(object))
                }
                InformerEvent::Deleted(object) => Some(Event::ObjectDeleted(object)),
            },
        );

        while let Some(event) = rx.recv().await {
            match event {
                Event::ObjectAdded(object) => self.object_added(object).await,
                Event::ObjectDeleted(object) => self.object_deleted(object).await,
                Event::NamespaceAdded(namespace) => self.namespace_added(namespace).await,
            }
        }
    }

    /// Handles a new or changed object.
    pub async fn object_added(&mut self, object: A::Object) {
        let mut object = object;
        let mut meta = object.meta().clone();
        let key = meta.key();

        let unknown = self.options.keys.unknown_prefixed(&meta.annotations);
        if !unknown.is_empty() {
            for annotation in &unknown {
                warn!(kind = self.name, %key, annotation, "unknown annotation");
            }
            if !self.options.ignore_unknown {
                warn!(kind = self.name, %key, "skipping object with unknown annotations");
                return;
            }
        }

        let mut targets = match policy::replication_targets(
            &self.options.keys,
            &meta,
            self.graph.watched_patterns(&key),
        ) {
            Ok(targets) => targets,
            Err(err) => {
                warn!(kind = self.name, %key, error = %err, "cannot resolve replication targets");
                return;
            }
        };

        // targets pushed earlier that the annotations no longer cover
        if let Some(old_targets) = self.graph.push_targets(&key) {
            debug!(kind = self.name, %key, "push source changed");
            for target in old_targets {
                if targets.contains_key(&target) {
                    continue;
                }
                info!(kind = self.name, %key, %target, "target no longer declared, deleting");
                let _ = self.delete_object(&target, &object).await;
            }
        }
        self.graph.clear_source(&key);

        if let Some(dependents) = self.graph.dependents(&key) {
            debug!(kind = self.name, %key, count = dependents.len(), "refreshing dependents");
            self.update_dependents(&object, dependents).await;
        }

        // an object installed by a push source re-enters here; refresh it
        // against its source before considering its own annotations
        if let Some(by) = meta.annotation(self.options.keys.replicated_by()).map(str::to_string) {
            debug!(kind = self.name, %key, source = %by, "object was created by replication");
            match self.get_from_store(&by) {
                Err(err) => {
                    warn!(kind = self.name, source = %by, error = %err, "cannot load replicating source");
                    return;
                }
                Ok(None) => {
                    info!(kind = self.name, %key, source = %by, "source deleted, deleting target");
                    let _ = self.do_delete_object(&object).await;
                    return;
                }
                Ok(Some((source_object, source_meta))) => {
                    let covered = match policy::is_replicated_to(
                        &self.options.keys,
                        &source_meta,
                        &meta,
                        self.graph.watched_patterns(&by),
                    ) {
                        Ok(covered) => covered,
                        Err(err) => {
                            warn!(kind = self.name, source = %by, error = %err, "cannot resolve source targets");
                            return;
                        }
                    };
                    if !covered {
                        info!(kind = self.name, %key, source = %by, "source no longer replicates here, deleting target");
                        let _ = self.do_delete_object(&object).await;
                        return;
                    }
                    if self.install_object("", Some(&object), &source_object).await.is_err() {
                        return;
                    }
                    // pick the refreshed copy back up; it may have grown
                    // pull annotations that the rest of the handler acts on
                    match self.require_from_store(&key) {
                        Ok((refreshed, refreshed_meta)) => {
                            object = refreshed;
                            meta = refreshed_meta;
                            targets = ReplicationTargets::default();
                        }
                        Err(err) => {
                            warn!(kind = self.name, %key, error = %err, "cannot reload installed target");
                            return;
                        }
                    }
                }
            }
        }

        if !targets.is_empty() {
            let mut existing: Vec<String> = Vec::new();
            for target in &targets.literals {
                let namespace = split_key(target).map(|(namespace, _)| namespace).unwrap_or("");
                if self.namespace_store.contains(namespace) {
                    existing.push(target.clone());
                } else {
                    info!(kind = self.name, %key, %target, "replication cancelled, namespace does not exist yet");
                }
            }
            if !targets.patterns.is_empty() {
                let namespaces = self.namespace_store.keys();
                let mut seen: BTreeSet<String> = existing.iter().cloned().collect();
                seen.insert(key.clone());
                for pattern in &targets.patterns {
                    for target in pattern.targets(namespaces.iter().map(String::as_str)) {
                        if seen.insert(target.clone()) {
                            existing.push(target);
                        }
                    }
                }
            }
            self.graph.set_watched(&key, targets.literals.clone(), targets.patterns.clone());
            if !existing.is_empty() {
                self.graph.set_push_targets(&key, existing.clone());
                for target in existing {
                    info!(kind = self.name, %key, %target, "replicating to target");
                    let _ = self.install_object(&target, None, &object).await;
                }
            }
            // a pull annotation on a push source only describes its
            // targets; the installed copies execute the pull themselves
            // when they come back through this handler
            return;
        }

        if let Some(source_key) = policy::resolve_annotation(&meta, self.options.keys.replicate_from())
        {
            debug!(kind = self.name, %key, source = %source_key, "object pulls from source");
            self.graph.record_dependent(&source_key, key.clone());
            match self.get_from_store(&source_key) {
                Err(err) => {
                    warn!(kind = self.name, source = %source_key, error = %err, "cannot load pull source");
                }
                Ok(None) => {
                    info!(kind = self.name, %key, source = %source_key, "source deleted, clearing target");
                    let _ = self.do_clear_object(&object).await;
                }
                Ok(Some((source_object, _))) => {
                    let _ = self.replicate_object(&object, &source_object).await;
                }
            }
        }
    }

    /// Handles a deleted object: cascades to pushed targets, clears
    /// dependents, and offers the vacated key to a waiting source.
    pub async fn object_deleted(&mut self, object: A::Object) {
        let meta = object.meta().clone();
        let key = meta.key();
        debug!(kind = self.name, %key, "object deleted");

        if let Some(targets) = self.graph.push_targets(&key) {
            for target in targets {
                let _ = self.delete_object(&target, &object).await;
            }
        }
        self.graph.clear_source(&key);

        if let Some(dependents) = self.graph.dependents(&key) {
            let mut kept = Vec::new();
            for dependent in dependents {
                match self.clear_object(&dependent, &object).await {
                    Ok(true) => kept.push(dependent),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(kind = self.name, %dependent, error = %err, "cannot clear dependent");
                    }
                }
            }
            self.graph.set_dependents(&key, kept);
        }

        // a source that wanted this key all along may now claim it; sorted
        // iteration makes the winner deterministic
        for source_key in self.graph.sources_watching_key(&key, &meta) {
            match self.get_from_store(&source_key) {
                Err(err) => {
                    warn!(kind = self.name, source = %source_key, error = %err, "cannot load watching source");
                }
                Ok(None) => {
                    debug!(kind = self.name, source = %source_key, "watching source not found");
                    self.graph.forget_watched(&source_key);
                }
                Ok(Some((source_object, source_meta))) => {
                    match policy::is_replicated_to(
                        &self.options.keys,
                        &source_meta,
                        &meta,
                        self.graph.watched_patterns(&source_key),
                    ) {
                        Err(err) => {
                            warn!(kind = self.name, source = %source_key, error = %err, "cannot resolve source targets");
                        }
                        Ok(false) => {}
                        Ok(true) => {
                            info!(kind = self.name, %key, source = %source_key, "installing replacement replica");
                            let _ = self.install_object(&key, None, &source_object).await;
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Handles a new namespace: sources watching it by literal target or
    /// pattern replicate into it.
    pub async fn namespace_added(&mut self, namespace: Namespace) {
        let name = namespace.name().to_string();
        debug!(kind = self.name, namespace = %name, "namespace seen");
        for source_key in self.graph.sources_watching_namespace(&name) {
            match self.get_from_store(&source_key) {
                Err(err) => {
                    warn!(kind = self.name, source = %source_key, error = %err, "cannot load watching source");
                }
                Ok(None) => {
                    debug!(kind = self.name, source = %source_key, "watching source not found");
                    self.graph.forget_watched(&source_key);
                }
                Ok(Some((source_object, _))) => {
                    debug!(kind = self.name, source = %source_key, namespace = %name, "source watches new namespace");
                    self.replicate_to_namespace(&source_object, &name).await;
                }
            }
        }
    }

    /// Installs a source's declared targets inside one namespace.
    async fn replicate_to_namespace(&mut self, object: &A::Object, namespace: &str) {
        let meta = object.meta().clone();
        let key = meta.key();
        // replicas never push further
        if meta.annotations.contains_key(self.options.keys.replicated_by()) {
            return;
        }
        let targets = match policy::replication_targets(
            &self.options.keys,
            &meta,
            self.graph.watched_patterns(&key),
        ) {
            Ok(targets) => targets,
            Err(err) => {
                warn!(kind = self.name, %key, error = %err, "cannot resolve replication targets");
                return;
            }
        };

        let mut new_targets: BTreeSet<String> = BTreeSet::new();
        for target in &targets.literals {
            if split_key(target).is_some_and(|(target_ns, _)| target_ns == namespace) {
                new_targets.insert(target.clone());
            }
        }
        for pattern in &targets.patterns {
            if let Some(target) = pattern.match_namespace(namespace) {
                new_targets.insert(target);
            }
        }
        new_targets.remove(&key);

        for target in new_targets {
            info!(kind = self.name, %key, %target, "replicating to target");
            self.graph.add_push_target(&key, target.clone());
            let _ = self.install_object(&target, None, object).await;
        }
    }

    /// Refreshes every target pulling from `source`, keeping only those
    /// that still reference it.
    async fn update_dependents(&mut self, source: &A::Object, dependents: Vec<String>) {
        let key = source.key();
        let mut kept = Vec::new();
        for dependent in dependents {
            let (target_object, target_meta) = match self.require_from_store(&dependent) {
                Ok(found) => found,
                Err(err) => {
                    warn!(kind = self.name, %dependent, error = %err, "cannot load dependent");
                    continue;
                }
            };
            let resolved =
                policy::resolve_annotation(&target_meta, self.options.keys.replicate_from());
            if resolved.as_deref() != Some(key.as_str()) {
                debug!(kind = self.name, %dependent, "dependent no longer references source");
                continue;
            }
            kept.push(dependent);
            let _ = self.replicate_object(&target_object, source).await;
        }
        self.graph.set_dependents(&key, kept);
    }

    /// The pull primitive: refresh `target`'s payload from `source`.
    async fn replicate_object(&self, target: &A::Object, source: &A::Object) -> Result<()> {
        let meta = target.meta().clone();
        let source_meta = source.meta().clone();
        let key = meta.key();

        match policy::replication_allowed(&self.options, &meta, &source_meta) {
            Ok(Allowance::Allowed) => {}
            Ok(Allowance::Denied(reason)) => {
                info!(kind = self.name, %key, %reason, "replication not allowed, clearing target");
                return self.do_clear_object(target).await;
            }
            Err(err) => {
                warn!(kind = self.name, %key, error = %err, "replication cancelled");
                return Err(err);
            }
        }

        match policy::needs_data_update(&self.options.keys, &meta, &source_meta) {
            Ok(DataUpdate::Needed) => {}
            Ok(DataUpdate::UpToDate) => {
                debug!(kind = self.name, %key, "target already up-to-date");
                return Ok(());
            }
            Ok(DataUpdate::ReplicatedOnce) => {
                debug!(kind = self.name, %key, "target already replicated once");
                return Ok(());
            }
            Err(err) => {
                warn!(kind = self.name, %key, error = %err, "replication skipped");
                return Err(err);
            }
        }

        let keys = &self.options.keys;
        let mut annotations = meta.annotations.clone();
        annotations.insert(keys.replicated_at().to_string(), now_rfc3339());
        annotations.insert(
            keys.replicated_from_version().to_string(),
            source_meta.resource_version.clone().unwrap_or_default(),
        );
        copy_annotation(
            &mut annotations,
            keys.replicate_once_version(),
            source_meta.annotation(keys.replicate_once_version()),
        );

        let updated = self.adapter.update(target, source, annotations).await?;
        self.object_store.insert(updated);
        Ok(())
    }

    /// The push primitive: create or refresh one target of `source`.
    ///
    /// Takes either a key to resolve through the store or an already loaded
    /// object. A target that exists but was not created by this source is
    /// left alone.
    async fn install_object(
        &self,
        target_key: &str,
        target_object: Option<&A::Object>,
        source: &A::Object,
    ) -> Result<()> {
        let source_meta = source.meta().clone();
        let keys = self.options.keys.clone();

        let (target_namespace, target_name, target_meta, existing) = match target_object {
            Some(object) => {
                let meta = object.meta().clone();
                (meta.namespace.clone(), meta.name.clone(), Some(meta), Some(object.clone()))
            }
            None => {
                let Some((namespace, name)) = split_key(target_key) else {
                    let err = ReplicationError::Config(format!(
                        "source {} has ill-formed target key {target_key}",
                        source_meta.key()
                    ));
                    warn!(kind = self.name, error = %err, "cannot install target");
                    return Err(err);
                };
                match self.get_from_store(target_key) {
                    Err(err) => {
                        warn!(kind = self.name, target = %target_key, error = %err, "cannot load target");
                        return Err(err);
                    }
                    Ok(None) => (namespace.to_string(), name.to_string(), None, None),
                    Ok(Some((object, meta))) => {
                        if let Err(err) = policy::is_replicated_by(&keys, &meta, &source_meta) {
                            info!(kind = self.name, target = %target_key, error = %err, "replication cancelled");
                            return Err(err);
                        }
                        (meta.namespace.clone(), meta.name.clone(), Some(meta), Some(object))
                    }
                }
            }
        };
        let target_display = format!("{target_namespace}/{target_name}");

        // the source pulls from elsewhere: install identity only and let
        // the target's own pull pass move the payload
        if let Some(from) = policy::resolve_annotation(&source_meta, keys.replicate_from()) {
            if let Some(target_meta) = &target_meta {
                match policy::needs_from_annotations_update(&keys, target_meta, &source_meta) {
                    Err(err) => {
                        warn!(kind = self.name, target = %target_display, error = %err, "replication cancelled");
                        return Err(err);
                    }
                    Ok(false) => return Ok(()),
                    Ok(true) => {}
                }
            }
            let mut annotations = BTreeMap::new();
            annotations.insert(keys.replicated_by().to_string(), source_meta.key());
            annotations.insert(keys.replicate_from().to_string(), from);
            if let Some(once) = source_meta.annotation(keys.replicate_once()) {
                annotations.insert(keys.replicate_once().to_string(), once.to_string());
            }
            let meta = ObjectMeta {
                namespace: target_namespace,
                name: target_name,
                resource_version: target_meta.as_ref().and_then(|meta| meta.resource_version.clone()),
                annotations,
                labels: self.options.labels.clone(),
            };
            info!(kind = self.name, target = %target_display, "installing target with pull annotations");
            let installed = self.adapter.install(meta, source, existing.as_ref()).await?;
            self.object_store.insert(installed);
            return Ok(());
        }

        if let Some(target_meta_ref) = &target_meta {
            // a leftover pull annotation means the source stopped pulling;
            // reinstall from scratch below
            let carries_pull = target_meta_ref.annotations.contains_key(keys.replicate_from());
            if !carries_pull {
                match policy::needs_data_update(&keys, target_meta_ref, &source_meta) {
                    Ok(DataUpdate::Needed) => {}
                    Ok(DataUpdate::UpToDate) => {
                        debug!(kind = self.name, target = %target_display, "target already up-to-date");
                        return Ok(());
                    }
                    Ok(DataUpdate::ReplicatedOnce) => {
                        match policy::needs_allowed_annotations_update(
                            &keys,
                            target_meta_ref,
                            &source_meta,
                        ) {
                            Err(err) => {
                                warn!(kind = self.name, target = %target_display, error = %err, "replication skipped");
                                return Err(err);
                            }
                            Ok(false) => {
                                debug!(kind = self.name, target = %target_display, "target already replicated once");
                                return Ok(());
                            }
                            Ok(true) => {
                                let mut meta = target_meta_ref.clone();
                                copy_annotation(
                                    &mut meta.annotations,
                                    keys.replication_allowed(),
                                    source_meta.annotation(keys.replication_allowed()),
                                );
                                copy_annotation(
                                    &mut meta.annotations,
                                    keys.replication_allowed_namespaces(),
                                    source_meta.annotation(keys.replication_allowed_namespaces()),
                                );
                                info!(kind = self.name, target = %target_display, "refreshing permission annotations");
                                let installed =
                                    self.adapter.install(meta, source, existing.as_ref()).await?;
                                self.object_store.insert(installed);
                                return Ok(());
                            }
                        }
                    }
                    Err(err) => {
                        warn!(kind = self.name, target = %target_display, error = %err, "replication skipped");
                        return Err(err);
                    }
                }
            }
        }

        let mut annotations = BTreeMap::new();
        annotations.insert(keys.replicated_at().to_string(), now_rfc3339());
        annotations.insert(keys.replicated_by().to_string(), source_meta.key());
        annotations.insert(
            keys.replicated_from_version().to_string(),
            source_meta.resource_version.clone().unwrap_or_default(),
        );
        for annotation in [
            keys.replicate_once_version(),
            keys.replication_allowed(),
            keys.replication_allowed_namespaces(),
        ] {
            if let Some(value) = source_meta.annotation(annotation) {
                annotations.insert(annotation.to_string(), value.to_string());
            }
        }
        let meta = ObjectMeta {
            namespace: target_namespace,
            name: target_name,
            resource_version: target_meta.as_ref().and_then(|meta| meta.resource_version.clone()),
            annotations,
            labels: self.options.labels.clone(),
        };
        info!(kind = self.name, target = %target_display, "installing target with source data");
        let installed = self.adapter.install(meta, source, Some(source)).await?;
        self.object_store.insert(installed);
        Ok(())
    }

    /// Clears a dependent after its source disappeared. Returns whether the
    /// dependent still references the source.
    async fn clear_object(&self, key: &str, source: &A::Object) -> Result<bool> {
        let source_meta = source.meta().clone();
        let (target, target_meta) = match self.require_from_store(key) {
            Ok(found) => found,
            Err(err) => {
                warn!(kind = self.name, target = %key, error = %err, "cannot load dependent");
                return Ok(false);
            }
        };
        if !policy::annotation_refers_to(&target_meta, self.options.keys.replicate_from(), &source_meta)
        {
            debug!(kind = self.name, target = %key, "dependent no longer references source");
            return Ok(false);
        }
        self.do_clear_object(&target).await?;
        Ok(true)
    }

    /// Empties a target's replicated payload and drops the version markers.
    async fn do_clear_object(&self, object: &A::Object) -> Result<()> {
        let meta = object.meta();
        let keys = &self.options.keys;
        if !meta.annotations.contains_key(keys.replicated_from_version()) {
            debug!(kind = self.name, key = %meta.key(), "target carries no replicated data");
            return Ok(());
        }
        let mut annotations = meta.annotations.clone();
        annotations.insert(keys.replicated_at().to_string(), now_rfc3339());
        annotations.remove(keys.replicated_from_version());
        annotations.remove(keys.replicate_once_version());

        let cleared = self.adapter.clear(object, annotations).await?;
        self.object_store.insert(cleared);
        Ok(())
    }

    /// Deletes a pushed target, provided it was created by `source`.
    async fn delete_object(&self, key: &str, source: &A::Object) -> Result<()> {
        let source_meta = source.meta().clone();
        let (target, target_meta) = match self.require_from_store(key) {
            Ok(found) => found,
            Err(err) => {
                warn!(kind = self.name, target = %key, error = %err, "cannot load target");
                return Err(err);
            }
        };
        if let Err(err) = policy::is_replicated_by(&self.options.keys, &target_meta, &source_meta) {
            info!(kind = self.name, target = %key, error = %err, "deletion cancelled");
            return Err(err);
        }
        self.do_delete_object(&target).await
    }

    /// Deletes an object and forgets it locally.
    async fn do_delete_object(&self, object: &A::Object) -> Result<()> {
        self.adapter.delete(object).await?;
        self.object_store.remove(object);
        Ok(())
    }

    /// Reads an object from the local store, enforcing the unknown-
    /// annotation policy.
    fn get_from_store(&self, key: &str) -> Result<Option<(A::Object, ObjectMeta)>> {
        let Some(object) = self.object_store.get(key) else {
            return Ok(None);
        };
        let meta = object.meta().clone();
        if !self.options.ignore_unknown {
            let unknown = self.options.keys.unknown_prefixed(&meta.annotations);
            for annotation in &unknown {
                warn!(kind = self.name, %key, annotation, "unknown annotation");
            }
            if let Some(first) = unknown.first() {
                return Err(ReplicationError::Config(format!(
                    "unknown annotation {first} on {key}"
                )));
            }
        }
        Ok(Some((object, meta)))
    }

    /// Like [`get_from_store`](Self::get_from_store) but absence is an
    /// error.
    fn require_from_store(&self, key: &str) -> Result<(A::Object, ObjectMeta)> {
        self.get_from_store(key)?.ok_or_else(|| {
            ReplicationError::Missing(format!("{} {key} is not in the store", self.name))
        })
    }
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn copy_annotation(annotations: &mut BTreeMap<String, String>, key: &str, value: Option<&str>) {
    match value {
        Some(value) => {
            annotations.insert(key.to_string(), value.to_string());
        }
        None => {
            annotations.remove(key);
        }
    }
}
