// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! Config map payload mechanics.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

use mitosis_client::ObjectApi;
use mitosis_core::{ConfigMap, Namespace, ObjectMeta, ReplicableObject, ReplicatorOptions};

use crate::adapter::ResourceAdapter;
use crate::error::Result;
use crate::replicator::ObjectReplicator;

/// Payload operations for config maps: both the UTF-8 and the binary
/// entries travel; clearing leaves no payload at all.
pub struct ConfigMapAdapter {
    api: Arc<dyn ObjectApi<ConfigMap>>,
}

impl ConfigMapAdapter {
    /// Creates an adapter over the given API handle.
    pub fn new(api: Arc<dyn ObjectApi<ConfigMap>>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl ResourceAdapter for ConfigMapAdapter {
    type Object = ConfigMap;

    fn kind(&self) -> &'static str {
        "config map"
    }

    async fn update(
        &self,
        target: &ConfigMap,
        source: &ConfigMap,
        annotations: BTreeMap<String, String>,
    ) -> Result<ConfigMap> {
        let mut object = target.clone();
        object.metadata.annotations = annotations;
        object.data = source.data.clone();
        object.binary_data = source.binary_data.clone();

        debug!(key = %object.key(), "updating config map");
        let updated = self.api.update(&object).await.map_err(|err| {
            error!(key = %object.key(), error = %err, "error while updating config map");
            err
        })?;
        Ok(updated)
    }

    async fn clear(
        &self,
        target: &ConfigMap,
        annotations: BTreeMap<String, String>,
    ) -> Result<ConfigMap> {
        let mut object = target.clone();
        object.metadata.annotations = annotations;
        object.data.clear();
        object.binary_data.clear();

        debug!(key = %object.key(), "clearing config map");
        let cleared = self.api.update(&object).await.map_err(|err| {
            error!(key = %object.key(), error = %err, "error while clearing config map");
            err
        })?;
        Ok(cleared)
    }

    async fn install(
        &self,
        meta: ObjectMeta,
        _source: &ConfigMap,
        data: Option<&ConfigMap>,
    ) -> Result<ConfigMap> {
        let object = ConfigMap {
            metadata: meta,
            data: data.map(|data| data.data.clone()).unwrap_or_default(),
            binary_data: data.map(|data| data.binary_data.clone()).unwrap_or_default(),
        };

        debug!(key = %object.key(), "installing config map");
        let result = if object.metadata.resource_version.is_none() {
            self.api.create(&object).await
        } else {
            self.api.update(&object).await
        };
        let installed = result.map_err(|err| {
            error!(key = %object.key(), error = %err, "error while installing config map");
            err
        })?;
        Ok(installed)
    }

    async fn delete(&self, object: &ConfigMap) -> Result<()> {
        let meta = object.meta();
        debug!(key = %meta.key(), "deleting config map");
        self.api
            .delete(
                &meta.namespace,
                &meta.name,
                meta.resource_version.as_deref().unwrap_or_default(),
            )
            .await
            .map_err(|err| {
                error!(key = %meta.key(), error = %err, "error while deleting config map");
                err
            })?;
        Ok(())
    }
}

/// Builds the config map replicator on top of a client serving both config
/// maps and namespaces.
pub fn new_config_map_replicator<C>(
    client: Arc<C>,
    options: ReplicatorOptions,
    resync_period: Duration,
) -> ObjectReplicator<ConfigMapAdapter>
where
    C: ObjectApi<ConfigMap> + ObjectApi<Namespace> + 'static,
{
    let object_api: Arc<dyn ObjectApi<ConfigMap>> = client.clone();
    let namespace_api: Arc<dyn ObjectApi<Namespace>> = client;
    ObjectReplicator::new(
        "config map",
        ConfigMapAdapter::new(object_api.clone()),
        object_api,
        namespace_api,
        options,
        resync_period,
    )
}

#[cfg(test)]
mod tests {
    use mitosis_client::MemoryCluster;

    use super::*;

    fn config_map(namespace: &str, name: &str, entries: &[(&str, &str)]) -> ConfigMap {
        let mut object = ConfigMap { metadata: ObjectMeta::new(namespace, name), ..ConfigMap::default() };
        for (key, value) in entries {
            object.data.insert(key.to_string(), value.to_string());
        }
        object
    }

    #[tokio::test]
    async fn test_update_copies_payload() {
        let cluster = Arc::new(MemoryCluster::new());
        let adapter = ConfigMapAdapter::new(cluster.clone());

        let target = cluster.create(&config_map("b", "t", &[("stale", "x")])).await.unwrap();
        let source = config_map("a", "s", &[("fresh", "y")]);

        let updated = adapter.update(&target, &source, BTreeMap::new()).await.unwrap();
        assert_eq!(updated.data.get("fresh").map(String::as_str), Some("y"));
        assert!(!updated.data.contains_key("stale"));
    }

    #[tokio::test]
    async fn test_clear_empties_payload() {
        let cluster = Arc::new(MemoryCluster::new());
        let adapter = ConfigMapAdapter::new(cluster.clone());

        let mut seeded = config_map("b", "t", &[("entry", "x")]);
        seeded.binary_data.insert("blob".to_string(), vec![1, 2, 3]);
        let target = cluster.create(&seeded).await.unwrap();

        let cleared = adapter.clear(&target, BTreeMap::new()).await.unwrap();
        assert!(cleared.data.is_empty());
        assert!(cleared.binary_data.is_empty());
    }

    #[tokio::test]
    async fn test_install_creates_then_updates() {
        let cluster = Arc::new(MemoryCluster::new());
        let adapter = ConfigMapAdapter::new(cluster.clone());
        let source = config_map("a", "s", &[("entry", "x")]);

        let created = adapter
            .install(ObjectMeta::new("b", "t"), &source, Some(&source))
            .await
            .unwrap();
        assert_eq!(created.data.get("entry").map(String::as_str), Some("x"));
        assert!(created.metadata.resource_version.is_some());

        let mut meta = created.metadata.clone();
        meta.annotations.insert("marker".to_string(), "1".to_string());
        let updated = adapter.install(meta, &source, None).await.unwrap();
        assert!(updated.data.is_empty());
        assert_ne!(updated.metadata.resource_version, created.metadata.resource_version);
    }
}
