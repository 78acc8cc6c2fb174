// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! The per-kind adapter seam between the engine and payload mechanics.

use std::collections::BTreeMap;

use async_trait::async_trait;

use mitosis_core::{ObjectMeta, ReplicableObject};

use crate::error::Result;

/// Payload operations for one resource kind.
///
/// The engine decides *what* to do from annotations alone; adapters know
/// *how* to copy, empty, create and delete the kind's payload. An adapter
/// owns its API handle and submits every mutation with the optimistic
/// concurrency the client enforces.
#[async_trait]
pub trait ResourceAdapter: Send + Sync + 'static {
    /// The object type this adapter operates on.
    type Object: ReplicableObject;

    /// Human-readable kind name used in log output.
    fn kind(&self) -> &'static str;

    /// Rewrites the target's payload from the source and replaces its
    /// annotations wholesale.
    async fn update(
        &self,
        target: &Self::Object,
        source: &Self::Object,
        annotations: BTreeMap<String, String>,
    ) -> Result<Self::Object>;

    /// Empties the target's payload (kind-appropriate placeholder content
    /// where the orchestrator validates payload shape) and replaces its
    /// annotations.
    async fn clear(
        &self,
        target: &Self::Object,
        annotations: BTreeMap<String, String>,
    ) -> Result<Self::Object>;

    /// Creates or updates an object with the given metadata: create when
    /// `meta.resource_version` is `None`, update otherwise. Payload comes
    /// from `data` when given, else it is placeholder-emptied. `source`
    /// supplies kind-level identity such as the secret type.
    async fn install(
        &self,
        meta: ObjectMeta,
        source: &Self::Object,
        data: Option<&Self::Object>,
    ) -> Result<Self::Object>;

    /// Deletes the object, conditional on its observed resource version.
    async fn delete(&self, object: &Self::Object) -> Result<()>;
}
