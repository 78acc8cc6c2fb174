// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! Secret payload mechanics.
//!
//! Secrets cannot always be emptied outright: several types are validated
//! server-side for the presence or shape of specific keys. Clearing or
//! installing without a data source therefore writes type-appropriate
//! stand-in content instead of nothing.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, error};

use mitosis_client::ObjectApi;
use mitosis_core::{Namespace, ObjectMeta, ReplicableObject, ReplicatorOptions, Secret, SecretType};

use crate::adapter::ResourceAdapter;
use crate::error::Result;
use crate::replicator::ObjectReplicator;

const PASSWORD_LENGTH: usize = 128;

/// Payload operations for secrets.
pub struct SecretAdapter {
    api: Arc<dyn ObjectApi<Secret>>,
}

impl SecretAdapter {
    /// Creates an adapter over the given API handle.
    pub fn new(api: Arc<dyn ObjectApi<Secret>>) -> Self {
        Self { api }
    }
}

fn random_password() -> String {
    rand::thread_rng().sample_iter(&Alphanumeric).take(PASSWORD_LENGTH).map(char::from).collect()
}

/// Stand-in entries satisfying the server-side validation of each secret
/// type. The basic-auth password is random so an emptied credential cannot
/// be logged into.
fn placeholder_entries(secret_type: &SecretType) -> BTreeMap<String, String> {
    let mut entries = BTreeMap::new();
    match secret_type {
        // these fields are checked to be JSON
        SecretType::Dockercfg => {
            entries.insert(".dockercfg".to_string(), "{}".to_string());
        }
        SecretType::DockerConfigJson => {
            entries.insert(".dockerconfigjson".to_string(), "{}".to_string());
        }
        SecretType::BasicAuth => {
            entries.insert("username".to_string(), String::new());
            entries.insert("password".to_string(), random_password());
        }
        // this field is checked to be non-empty
        SecretType::SshAuth => {
            entries.insert("ssh-privatekey".to_string(), "empty".to_string());
        }
        SecretType::Tls => {
            entries.insert("tls.crt".to_string(), String::new());
            entries.insert("tls.key".to_string(), String::new());
        }
        SecretType::Opaque | SecretType::Other(_) => {}
    }
    entries
}

#[async_trait]
impl ResourceAdapter for SecretAdapter {
    type Object = Secret;

    fn kind(&self) -> &'static str {
        "secret"
    }

    async fn update(
        &self,
        target: &Secret,
        source: &Secret,
        annotations: BTreeMap<String, String>,
    ) -> Result<Secret> {
        let mut object = target.clone();
        object.metadata.annotations = annotations;
        object.data = source.data.clone();
        object.string_data = BTreeMap::new();

        debug!(key = %object.key(), "updating secret");
        let updated = self.api.update(&object).await.map_err(|err| {
            error!(key = %object.key(), error = %err, "error while updating secret");
            err
        })?;
        Ok(updated)
    }

    async fn clear(&self, target: &Secret, annotations: BTreeMap<String, String>) -> Result<Secret> {
        let mut object = target.clone();
        object.metadata.annotations = annotations;
        object.data = BTreeMap::new();
        object.string_data = placeholder_entries(&object.secret_type);

        debug!(key = %object.key(), "clearing secret");
        let cleared = self.api.update(&object).await.map_err(|err| {
            error!(key = %object.key(), error = %err, "error while clearing secret");
            err
        })?;
        Ok(cleared)
    }

    async fn install(
        &self,
        meta: ObjectMeta,
        source: &Secret,
        data: Option<&Secret>,
    ) -> Result<Secret> {
        let mut object = Secret {
            metadata: meta,
            secret_type: source.secret_type.clone(),
            ..Secret::default()
        };
        match data {
            Some(data) => object.data = data.data.clone(),
            None => object.string_data = placeholder_entries(&object.secret_type),
        }

        debug!(key = %object.key(), "installing secret");
        let result = if object.metadata.resource_version.is_none() {
            self.api.create(&object).await
        } else {
            self.api.update(&object).await
        };
        let installed = result.map_err(|err| {
            error!(key = %object.key(), error = %err, "error while installing secret");
            err
        })?;
        Ok(installed)
    }

    async fn delete(&self, object: &Secret) -> Result<()> {
        let meta = object.meta();
        debug!(key = %meta.key(), "deleting secret");
        self.api
            .delete(
                &meta.namespace,
                &meta.name,
                meta.resource_version.as_deref().unwrap_or_default(),
            )
            .await
            .map_err(|err| {
                error!(key = %meta.key(), error = %err, "error while deleting secret");
                err
            })?;
        Ok(())
    }
}

/// Builds the secret replicator on top of a client serving both secrets and
/// namespaces.
pub fn new_secret_replicator<C>(
    client: Arc<C>,
    options: ReplicatorOptions,
    resync_period: Duration,
) -> ObjectReplicator<SecretAdapter>
where
    C: ObjectApi<Secret> + ObjectApi<Namespace> + 'static,
{
    let object_api: Arc<dyn ObjectApi<Secret>> = client.clone();
    let namespace_api: Arc<dyn ObjectApi<Namespace>> = client;
    ObjectReplicator::new(
        "secret",
        SecretAdapter::new(object_api.clone()),
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

    fn secret(namespace: &str, name: &str, secret_type: SecretType) -> Secret {
        Secret { metadata: ObjectMeta::new(namespace, name), secret_type, ..Secret::default() }
    }

    #[test]
    fn test_placeholders_per_type() {
        let entries = placeholder_entries(&SecretType::Dockercfg);
        assert_eq!(entries.get(".dockercfg").map(String::as_str), Some("{}"));

        let entries = placeholder_entries(&SecretType::SshAuth);
        assert_eq!(entries.get("ssh-privatekey").map(String::as_str), Some("empty"));

        let entries = placeholder_entries(&SecretType::Tls);
        assert_eq!(entries.get("tls.crt").map(String::as_str), Some(""));
        assert_eq!(entries.get("tls.key").map(String::as_str), Some(""));

        assert!(placeholder_entries(&SecretType::Opaque).is_empty());
    }

    #[test]
    fn test_basic_auth_placeholder_password() {
        let entries = placeholder_entries(&SecretType::BasicAuth);
        assert_eq!(entries.get("username").map(String::as_str), Some(""));
        let password = entries.get("password").unwrap();
        assert_eq!(password.len(), PASSWORD_LENGTH);
        assert!(password.chars().all(|c| c.is_ascii_alphanumeric()));

        // two placeholders must not share a password
        let other = placeholder_entries(&SecretType::BasicAuth);
        assert_ne!(password, other.get("password").unwrap());
    }

    #[tokio::test]
    async fn test_clear_installs_placeholders() {
        let cluster = Arc::new(MemoryCluster::new());
        let adapter = SecretAdapter::new(cluster.clone());

        let mut seeded = secret("b", "t", SecretType::SshAuth);
        seeded.data.insert("ssh-privatekey".to_string(), b"real key".to_vec());
        let target = cluster.create(&seeded).await.unwrap();

        let cleared = adapter.clear(&target, BTreeMap::new()).await.unwrap();
        // the in-memory server folds string entries into data
        assert_eq!(cleared.data.get("ssh-privatekey").map(Vec::as_slice), Some(b"empty".as_slice()));
    }

    #[tokio::test]
    async fn test_install_copies_type_and_data() {
        let cluster = Arc::new(MemoryCluster::new());
        let adapter = SecretAdapter::new(cluster.clone());

        let mut source = secret("a", "s", SecretType::Opaque);
        source.data.insert("token".to_string(), b"value".to_vec());

        let installed = adapter
            .install(ObjectMeta::new("b", "t"), &source, Some(&source))
            .await
            .unwrap();
        assert_eq!(installed.secret_type, SecretType::Opaque);
        assert_eq!(installed.data.get("token").map(Vec::as_slice), Some(b"value".as_slice()));
    }
}
