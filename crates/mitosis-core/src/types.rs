//! The replicated object model.
//!
//! Objects carry the subset of orchestrator metadata the controller acts on:
//! namespace, name, resource version, annotations and labels. Payloads are
//! kind-specific and opaque to the engine; only the adapters touch them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Metadata shared by every replicable object.
///
/// Field names follow the orchestrator's camelCase wire format. Annotation
/// and label maps are ordered so serialization and iteration stay
/// deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ObjectMeta {
    /// Namespace the object lives in; empty for cluster-scoped objects.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// Object name, unique within its namespace.
    pub name: String,

    /// Opaque monotonic token assigned by the orchestrator, used for
    /// optimistic concurrency. `None` on objects not yet persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_version: Option<String>,

    /// Annotations; the controller's own annotations share a common prefix.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Labels, applied by the controller on creation only.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
}

impl ObjectMeta {
    /// Creates metadata for a namespaced object.
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), name: name.into(), ..Self::default() }
    }

    /// The canonical `namespace/name` key.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// Looks up an annotation value.
    #[must_use]
    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }
}

/// Splits a canonical key into its namespace and name parts.
///
/// Returns `None` when the key carries no `/` separator.
#[must_use]
pub fn split_key(key: &str) -> Option<(&str, &str)> {
    key.split_once('/')
}

/// An object the replication engine can operate on.
pub trait ReplicableObject: Clone + Send + Sync + 'static {
    /// Lowercase kind name, used in log output and error messages.
    const KIND: &'static str;

    /// The object's metadata.
    fn meta(&self) -> &ObjectMeta;

    /// Mutable access to the object's metadata.
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// The canonical `namespace/name` key.
    fn key(&self) -> String {
        self.meta().key()
    }
}

/// A keyed name/value configuration bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigMap {
    /// Object metadata.
    pub metadata: ObjectMeta,

    /// UTF-8 payload entries.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, String>,

    /// Binary payload entries, base64 on the wire.
    #[serde(with = "base64_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub binary_data: BTreeMap<String, Vec<u8>>,
}

impl ReplicableObject for ConfigMap {
    const KIND: &'static str = "configmap";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// The type of a credential bundle, constraining its expected payload keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SecretType {
    /// Free-form payload.
    #[default]
    Opaque,
    /// Legacy docker registry credentials.
    Dockercfg,
    /// Docker registry credentials in config-json form.
    DockerConfigJson,
    /// Username/password pair.
    BasicAuth,
    /// SSH private key.
    SshAuth,
    /// TLS certificate and private key.
    Tls,
    /// Any type the controller has no special handling for.
    Other(String),
}

impl SecretType {
    const OPAQUE: &'static str = "Opaque";
    const DOCKERCFG: &'static str = "kubernetes.io/dockercfg";
    const DOCKER_CONFIG_JSON: &'static str = "kubernetes.io/dockerconfigjson";
    const BASIC_AUTH: &'static str = "kubernetes.io/basic-auth";
    const SSH_AUTH: &'static str = "kubernetes.io/ssh-auth";
    const TLS: &'static str = "kubernetes.io/tls";

    /// The wire representation of this type.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Opaque => Self::OPAQUE,
            Self::Dockercfg => Self::DOCKERCFG,
            Self::DockerConfigJson => Self::DOCKER_CONFIG_JSON,
            Self::BasicAuth => Self::BASIC_AUTH,
            Self::SshAuth => Self::SSH_AUTH,
            Self::Tls => Self::TLS,
            Self::Other(other) => other,
        }
    }
}

impl From<String> for SecretType {
    fn from(value: String) -> Self {
        match value.as_str() {
            Self::OPAQUE | "" => Self::Opaque,
            Self::DOCKERCFG => Self::Dockercfg,
            Self::DOCKER_CONFIG_JSON => Self::DockerConfigJson,
            Self::BASIC_AUTH => Self::BasicAuth,
            Self::SSH_AUTH => Self::SshAuth,
            Self::TLS => Self::Tls,
            _ => Self::Other(value),
        }
    }
}

impl From<SecretType> for String {
    fn from(value: SecretType) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for SecretType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A credential bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Secret {
    /// Object metadata.
    pub metadata: ObjectMeta,

    /// Payload type; constrains which keys the orchestrator validates.
    #[serde(rename = "type")]
    pub secret_type: SecretType,

    /// Binary payload entries, base64 on the wire.
    #[serde(with = "base64_map", skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Vec<u8>>,

    /// Write-only convenience entries the server folds into `data`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub string_data: BTreeMap<String, String>,
}

impl ReplicableObject for Secret {
    const KIND: &'static str = "secret";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// A namespace; the controller only consumes its name and lifecycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Namespace {
    /// Object metadata; the namespace field is empty.
    pub metadata: ObjectMeta,
}

impl Namespace {
    /// Creates a namespace with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self { metadata: ObjectMeta { name: name.into(), ..ObjectMeta::default() } }
    }

    /// The namespace name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }
}

impl ReplicableObject for Namespace {
    const KIND: &'static str = "namespace";

    fn meta(&self) -> &ObjectMeta {
        &self.metadata
    }

    fn meta_mut(&mut self) -> &mut ObjectMeta {
        &mut self.metadata
    }
}

/// Serde helper for base64-encoded binary payload maps.
mod base64_map {
    use std::collections::BTreeMap;

    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(map: &BTreeMap<String, Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded: BTreeMap<&str, String> =
            map.iter().map(|(key, value)| (key.as_str(), STANDARD.encode(value))).collect();
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded: BTreeMap<String, String> = Deserialize::deserialize(deserializer)?;
        encoded
            .into_iter()
            .map(|(key, value)| {
                STANDARD.decode(&value).map(|value| (key, value)).map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_key() {
        let meta = ObjectMeta::new("default", "source");
        assert_eq!(meta.key(), "default/source");
        assert_eq!(split_key("default/source"), Some(("default", "source")));
        assert_eq!(split_key("source"), None);
    }

    #[test]
    fn test_secret_type_round_trip() {
        for (secret_type, wire) in [
            (SecretType::Opaque, "\"Opaque\""),
            (SecretType::Dockercfg, "\"kubernetes.io/dockercfg\""),
            (SecretType::BasicAuth, "\"kubernetes.io/basic-auth\""),
            (SecretType::Tls, "\"kubernetes.io/tls\""),
        ] {
            let json = serde_json::to_string(&secret_type).unwrap();
            assert_eq!(json, wire);
            let parsed: SecretType = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, secret_type);
        }

        let parsed: SecretType = serde_json::from_str("\"example.com/custom\"").unwrap();
        assert_eq!(parsed, SecretType::Other("example.com/custom".to_string()));
    }

    #[test]
    fn test_config_map_wire_format() {
        let mut config_map = ConfigMap {
            metadata: ObjectMeta::new("default", "source"),
            ..ConfigMap::default()
        };
        config_map.metadata.resource_version = Some("41".to_string());
        config_map.data.insert("greeting".to_string(), "hello".to_string());
        config_map.binary_data.insert("blob".to_string(), vec![0x01, 0x02]);

        let json = serde_json::to_string(&config_map).unwrap();
        assert!(json.contains("\"resourceVersion\":\"41\""));
        assert!(json.contains("\"binaryData\":{\"blob\":\"AQI=\"}"));

        let parsed: ConfigMap = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config_map);
    }

    #[test]
    fn test_namespace_key_is_bare_name() {
        let namespace = Namespace::new("target-1");
        assert_eq!(namespace.name(), "target-1");
        assert!(namespace.metadata.namespace.is_empty());
    }
}
