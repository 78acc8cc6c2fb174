//! The annotation registry.
//!
//! Every annotation the controller understands is a fixed suffix under a
//! single configurable prefix. The registry is a plain value constructed
//! once at startup and handed to each replicator; tests reparametrize it by
//! constructing a different instance.

use std::collections::BTreeMap;

/// Default prefix applied to every recognized annotation suffix.
pub const DEFAULT_ANNOTATIONS_PREFIX: &str = "v1.mitosis.dev/";

/// Suffix of the annotation naming the source a target pulls from.
pub const REPLICATE_FROM: &str = "replicate-from";
/// Suffix of the annotation naming the targets a source pushes to.
pub const REPLICATE_TO: &str = "replicate-to";
/// Suffix of the annotation naming the namespaces a source pushes to.
pub const REPLICATE_TO_NAMESPACES: &str = "replicate-to-namespaces";
/// Suffix of the replicate-at-most-once policy annotation.
pub const REPLICATE_ONCE: &str = "replicate-once";
/// Suffix of the version override for the replicate-once policy.
pub const REPLICATE_ONCE_VERSION: &str = "replicate-once-version";
/// Suffix of the last-replication timestamp annotation.
pub const REPLICATED_AT: &str = "replicated-at";
/// Suffix of the annotation recording which source created a target.
pub const REPLICATED_BY: &str = "replicated-by";
/// Suffix of the annotation recording the source version last replicated.
pub const REPLICATED_FROM_VERSION: &str = "replicated-from-version";
/// Suffix of the explicit pull permission annotation.
pub const REPLICATION_ALLOWED: &str = "replication-allowed";
/// Suffix of the per-namespace pull permission annotation.
pub const REPLICATION_ALLOWED_NAMESPACES: &str = "replication-allowed-namespaces";

const SUFFIXES: [&str; 10] = [
    REPLICATE_FROM,
    REPLICATE_TO,
    REPLICATE_TO_NAMESPACES,
    REPLICATE_ONCE,
    REPLICATE_ONCE_VERSION,
    REPLICATED_AT,
    REPLICATED_BY,
    REPLICATED_FROM_VERSION,
    REPLICATION_ALLOWED,
    REPLICATION_ALLOWED_NAMESPACES,
];

/// The full set of recognized annotation keys under one prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationKeys {
    prefix: String,
    replicate_from: String,
    replicate_to: String,
    replicate_to_namespaces: String,
    replicate_once: String,
    replicate_once_version: String,
    replicated_at: String,
    replicated_by: String,
    replicated_from_version: String,
    replication_allowed: String,
    replication_allowed_namespaces: String,
}

impl AnnotationKeys {
    /// Builds the registry for the given prefix.
    ///
    /// A `/` is appended when a non-empty prefix does not already end with
    /// one. An empty prefix yields the bare suffixes, in which case the
    /// controller's annotations are indistinguishable from unrelated ones
    /// and unknown-annotation detection is disabled.
    #[must_use]
    pub fn new(prefix: &str) -> Self {
        let mut prefix = prefix.to_string();
        if !prefix.is_empty() && !prefix.ends_with('/') {
            prefix.push('/');
        }
        Self {
            replicate_from: format!("{prefix}{REPLICATE_FROM}"),
            replicate_to: format!("{prefix}{REPLICATE_TO}"),
            replicate_to_namespaces: format!("{prefix}{REPLICATE_TO_NAMESPACES}"),
            replicate_once: format!("{prefix}{REPLICATE_ONCE}"),
            replicate_once_version: format!("{prefix}{REPLICATE_ONCE_VERSION}"),
            replicated_at: format!("{prefix}{REPLICATED_AT}"),
            replicated_by: format!("{prefix}{REPLICATED_BY}"),
            replicated_from_version: format!("{prefix}{REPLICATED_FROM_VERSION}"),
            replication_allowed: format!("{prefix}{REPLICATION_ALLOWED}"),
            replication_allowed_namespaces: format!("{prefix}{REPLICATION_ALLOWED_NAMESPACES}"),
            prefix,
        }
    }

    /// The normalized prefix, ending in `/` unless empty.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key of the annotation naming the source a target pulls from.
    #[must_use]
    pub fn replicate_from(&self) -> &str {
        &self.replicate_from
    }

    /// Key of the annotation naming the targets a source pushes to.
    #[must_use]
    pub fn replicate_to(&self) -> &str {
        &self.replicate_to
    }

    /// Key of the annotation naming the namespaces a source pushes to.
    #[must_use]
    pub fn replicate_to_namespaces(&self) -> &str {
        &self.replicate_to_namespaces
    }

    /// Key of the replicate-at-most-once policy annotation.
    #[must_use]
    pub fn replicate_once(&self) -> &str {
        &self.replicate_once
    }

    /// Key of the version override for the replicate-once policy.
    #[must_use]
    pub fn replicate_once_version(&self) -> &str {
        &self.replicate_once_version
    }

    /// Key of the last-replication timestamp annotation.
    #[must_use]
    pub fn replicated_at(&self) -> &str {
        &self.replicated_at
    }

    /// Key of the annotation recording which source created a target.
    #[must_use]
    pub fn replicated_by(&self) -> &str {
        &self.replicated_by
    }

    /// Key of the annotation recording the source version last replicated.
    #[must_use]
    pub fn replicated_from_version(&self) -> &str {
        &self.replicated_from_version
    }

    /// Key of the explicit pull permission annotation.
    #[must_use]
    pub fn replication_allowed(&self) -> &str {
        &self.replication_allowed
    }

    /// Key of the per-namespace pull permission annotation.
    #[must_use]
    pub fn replication_allowed_namespaces(&self) -> &str {
        &self.replication_allowed_namespaces
    }

    /// Returns every annotation key that carries the prefix but is not a
    /// recognized suffix. Always empty when the prefix is empty.
    #[must_use]
    pub fn unknown_prefixed<'a>(&self, annotations: &'a BTreeMap<String, String>) -> Vec<&'a str> {
        if self.prefix.is_empty() {
            return Vec::new();
        }
        annotations
            .keys()
            .filter(|key| {
                key.strip_prefix(&self.prefix)
                    .is_some_and(|suffix| !SUFFIXES.contains(&suffix))
            })
            .map(String::as_str)
            .collect()
    }
}

impl Default for AnnotationKeys {
    fn default() -> Self {
        Self::new(DEFAULT_ANNOTATIONS_PREFIX)
    }
}
