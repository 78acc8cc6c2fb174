// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! Replication policy: pure decision functions over object metadata.
//!
//! Everything here is side-effect free. The engine consults these functions
//! on every event and acts on the verdicts; errors mean the object's
//! annotations could not be interpreted and the object is skipped for this
//! pass.

use std::collections::{BTreeSet, HashMap};

use regex::Regex;

use mitosis_core::pattern::{anchored, is_valid_name, is_valid_path};
use mitosis_core::{AnnotationKeys, ObjectMeta, ReplicatorOptions, TargetPattern};

use crate::error::{ReplicationError, Result};

/// Verdict of [`replication_allowed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Allowance {
    /// The source permits the target to pull from it.
    Allowed,
    /// The source denies replication; a target holding replicated data must
    /// be cleared.
    Denied(String),
}

/// Verdict of [`needs_data_update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataUpdate {
    /// The target payload must be refreshed from the source.
    Needed,
    /// The target already carries the source's current version.
    UpToDate,
    /// The replicate-once policy suppresses further updates.
    ReplicatedOnce,
}

/// The declared push targets of a source: fully qualified keys plus
/// namespace patterns still to be expanded against known namespaces.
#[derive(Debug, Clone, Default)]
pub struct ReplicationTargets {
    /// Fully qualified `namespace/name` targets, deduplicated, never
    /// containing the source itself.
    pub literals: Vec<String>,
    /// Pattern targets; these may expand to the source itself, which the
    /// engine excludes at execution time.
    pub patterns: Vec<TargetPattern>,
}

impl ReplicationTargets {
    /// True when neither literals nor patterns are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.literals.is_empty() && self.patterns.is_empty()
    }

    /// True when the given key is covered by a literal or a pattern.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.literals.iter().any(|literal| literal == key)
            || self.patterns.iter().any(|pattern| pattern.matches_key(key))
    }
}

/// Parses the boolean literals accepted in annotations.
#[must_use]
pub fn parse_bool_annotation(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Reads an annotation as a canonical `namespace/name` key; a bare name
/// resolves into the object's own namespace.
#[must_use]
pub fn resolve_annotation(meta: &ObjectMeta, annotation: &str) -> Option<String> {
    let value = meta.annotation(annotation)?;
    if value.contains('/') {
        Some(value.to_string())
    } else {
        Some(format!("{}/{}", meta.namespace, value))
    }
}

/// True when the annotation on `meta` references `reference`, with a bare
/// name resolved into `meta`'s own namespace.
#[must_use]
pub fn annotation_refers_to(meta: &ObjectMeta, annotation: &str, reference: &ObjectMeta) -> bool {
    let Some(value) = meta.annotation(annotation) else {
        return false;
    };
    match value.split_once('/') {
        Some((namespace, name)) => namespace == reference.namespace && name == reference.name,
        None => meta.namespace == reference.namespace && value == reference.name,
    }
}

/// Checks whether the source permits `target` to pull from it.
///
/// Unless the controller runs with allow-all, a source must carry at least
/// one of the two permission annotations. A source that itself pulls from
/// elsewhere never allows replication, or chained copies would drift.
pub fn replication_allowed(
    options: &ReplicatorOptions,
    target: &ObjectMeta,
    source: &ObjectMeta,
) -> Result<Allowance> {
    let keys = &options.keys;
    let source_key = source.key();
    let allowed = source.annotation(keys.replication_allowed());
    let allowed_namespaces = source.annotation(keys.replication_allowed_namespaces());

    if !options.allow_all && allowed.is_none() && allowed_namespaces.is_none() {
        return Ok(Allowance::Denied(format!(
            "source {source_key} does not explicitly allow replication"
        )));
    }

    if let Some(value) = allowed {
        match parse_bool_annotation(value) {
            None => {
                return Err(ReplicationError::Config(format!(
                    "source {source_key} has ill-formed annotation {} ({value})",
                    keys.replication_allowed()
                )))
            }
            Some(false) => {
                return Ok(Allowance::Denied(format!(
                    "source {source_key} explicitly disallows replication"
                )))
            }
            Some(true) => {}
        }
    }

    if let Some(list) = allowed_namespaces {
        let mut namespace_allowed = false;
        for entry in list.split(',') {
            if entry.is_empty() {
                continue;
            }
            if is_valid_name(entry) {
                if entry == target.namespace {
                    namespace_allowed = true;
                }
                continue;
            }
            let regex = Regex::new(&anchored(entry)).map_err(|err| {
                ReplicationError::Config(format!(
                    "source {source_key} has compilation error on annotation {} ({entry}): {err}",
                    keys.replication_allowed_namespaces()
                ))
            })?;
            if regex.is_match(&target.namespace) {
                namespace_allowed = true;
            }
        }
        if !namespace_allowed {
            return Ok(Allowance::Denied(format!(
                "source {source_key} does not allow replication to namespace {}",
                target.namespace
            )));
        }
    }

    if let Some(from) = resolve_annotation(source, keys.replicate_from()) {
        return Ok(Allowance::Denied(format!(
            "source {source_key} is already replicated from {from}"
        )));
    }

    Ok(Allowance::Allowed)
}

/// Checks whether the target's payload must be refreshed from the source.
pub fn needs_data_update(
    keys: &AnnotationKeys,
    target: &ObjectMeta,
    source: &ObjectMeta,
) -> Result<DataUpdate> {
    // never replicated, or replicated from a source that was deleted since
    let Some(target_version) = target.annotation(keys.replicated_from_version()) else {
        return Ok(DataUpdate::Needed);
    };
    if source.resource_version.as_deref() == Some(target_version) {
        return Ok(DataUpdate::UpToDate);
    }

    let mut has_once = false;
    for (meta, role) in [(source, "source"), (target, "target")] {
        if let Some(value) = meta.annotation(keys.replicate_once()) {
            match parse_bool_annotation(value) {
                None => {
                    return Err(ReplicationError::Config(format!(
                        "{role} {} has ill-formed annotation {} ({value})",
                        meta.key(),
                        keys.replicate_once()
                    )))
                }
                Some(once) => has_once = has_once || once,
            }
        }
    }

    if has_once {
        match source.annotation(keys.replicate_once_version()) {
            // no version override: one replication was enough
            None => return Ok(DataUpdate::ReplicatedOnce),
            Some(source_once) => {
                if target.annotation(keys.replicate_once_version()) == Some(source_once) {
                    return Ok(DataUpdate::ReplicatedOnce);
                }
            }
        }
    }

    Ok(DataUpdate::Needed)
}

/// Checks whether a push target must have its pull annotations refreshed.
///
/// Used when a source declares both directions: the created target carries
/// the source's `replicate-from` and `replicate-once` annotations and pulls
/// the payload itself.
pub fn needs_from_annotations_update(
    keys: &AnnotationKeys,
    target: &ObjectMeta,
    source: &ObjectMeta,
) -> Result<bool> {
    let source_key = source.key();
    let Some(from) = resolve_annotation(source, keys.replicate_from()) else {
        return Err(ReplicationError::Config(format!(
            "source {source_key} misses annotation {}",
            keys.replicate_from()
        )));
    };
    if !is_valid_path(&from) || from == source_key {
        return Err(ReplicationError::Config(format!(
            "source {source_key} has invalid annotation {} ({from})",
            keys.replicate_from()
        )));
    }
    let mut update = target.annotation(keys.replicate_from()) != Some(from.as_str());

    let source_once = source.annotation(keys.replicate_once());
    if let Some(value) = source_once {
        if parse_bool_annotation(value).is_none() {
            return Err(ReplicationError::Config(format!(
                "source {source_key} has ill-formed annotation {} ({value})",
                keys.replicate_once()
            )));
        }
    }
    if target.annotation(keys.replicate_once()) != source_once {
        update = true;
    }

    Ok(update)
}

/// Checks whether a push target must have the permission annotations
/// copied over from the source.
pub fn needs_allowed_annotations_update(
    keys: &AnnotationKeys,
    target: &ObjectMeta,
    source: &ObjectMeta,
) -> Result<bool> {
    let allowed = source.annotation(keys.replication_allowed());
    let allowed_namespaces = source.annotation(keys.replication_allowed_namespaces());

    let update = target.annotation(keys.replication_allowed()) != allowed
        || target.annotation(keys.replication_allowed_namespaces()) != allowed_namespaces;
    if !update {
        return Ok(false);
    }

    let source_key = source.key();
    if let Some(value) = allowed {
        if parse_bool_annotation(value).is_none() {
            return Err(ReplicationError::Config(format!(
                "source {source_key} has ill-formed annotation {} ({value})",
                keys.replication_allowed()
            )));
        }
    }
    if let Some(list) = allowed_namespaces {
        for entry in list.split(',') {
            if entry.is_empty() || is_valid_name(entry) {
                continue;
            }
            Regex::new(&anchored(entry)).map_err(|err| {
                ReplicationError::Config(format!(
                    "source {source_key} has compilation error on annotation {} ({entry}): {err}",
                    keys.replication_allowed_namespaces()
                ))
            })?;
        }
    }

    Ok(true)
}

/// Checks that the target was created by replication from the source.
pub fn is_replicated_by(
    keys: &AnnotationKeys,
    target: &ObjectMeta,
    source: &ObjectMeta,
) -> Result<()> {
    match target.annotation(keys.replicated_by()) {
        None => Err(ReplicationError::Permission(format!(
            "target {} was not created by replication",
            target.key()
        ))),
        Some(by) if by != source.key() => Err(ReplicationError::Permission(format!(
            "target {} was not replicated by {}",
            target.key(),
            source.key()
        ))),
        Some(_) => Ok(()),
    }
}

/// Checks whether the source's declared target set covers `target`.
pub fn is_replicated_to(
    keys: &AnnotationKeys,
    source: &ObjectMeta,
    target: &ObjectMeta,
    cached_patterns: &[TargetPattern],
) -> Result<bool> {
    let targets = replication_targets(keys, source, cached_patterns)?;
    let key = target.key();
    Ok(targets.literals.iter().any(|literal| *literal == key)
        || targets.patterns.iter().any(|pattern| pattern.matches_meta(target)))
}

/// Resolves the declared push target set of a source.
///
/// `replicate-to` entries are bare names, qualified `namespace/name` paths,
/// or paths whose namespace part is a regex; `replicate-to-namespaces`
/// entries are namespaces or namespace regexes. When only one of the two
/// annotations is present, the missing dimension defaults to the source's
/// own name or namespace. The cross product of namespaces and names is
/// deduplicated, and the source's own key is excluded from the literal
/// output.
///
/// `cached_patterns` seeds the regex compilation cache, so re-resolving an
/// unchanged source does not recompile its patterns.
pub fn replication_targets(
    keys: &AnnotationKeys,
    meta: &ObjectMeta,
    cached_patterns: &[TargetPattern],
) -> Result<ReplicationTargets> {
    let to = meta.annotation(keys.replicate_to());
    let to_namespaces = meta.annotation(keys.replicate_to_namespaces());
    if to.is_none() && to_namespaces.is_none() {
        return Ok(ReplicationTargets::default());
    }
    let key = meta.key();

    let mut compiled: HashMap<String, Regex> = cached_patterns
        .iter()
        .map(|pattern| (pattern.namespace_pattern().to_string(), pattern.namespace_regex().clone()))
        .collect();
    let mut compile_namespace = |expression: &str, annotation: &str| -> Result<Regex> {
        let pattern = anchored(expression);
        if let Some(regex) = compiled.get(&pattern) {
            return Ok(regex.clone());
        }
        match Regex::new(&pattern) {
            Ok(regex) => {
                compiled.insert(pattern, regex.clone());
                Ok(regex)
            }
            Err(err) => Err(ReplicationError::Config(format!(
                "source {key} has compilation error on annotation {annotation} ({expression}): {err}"
            ))),
        }
    };

    let mut names: BTreeSet<String> = BTreeSet::new();
    let mut qualified: BTreeSet<String> = BTreeSet::new();
    match to {
        // no names declared: targets take the source's own name
        None => {
            names.insert(meta.name.clone());
        }
        Some(list) => {
            for entry in list.split(',') {
                if entry.is_empty() {
                    continue;
                }
                if entry.contains('/') {
                    qualified.insert(entry.to_string());
                } else if is_valid_name(entry) {
                    names.insert(entry.to_string());
                } else {
                    return Err(ReplicationError::Config(format!(
                        "source {key} has invalid name on annotation {} ({entry})",
                        keys.replicate_to()
                    )));
                }
            }
        }
    }

    let mut namespaces: BTreeSet<String> = BTreeSet::new();
    match to_namespaces {
        // no namespaces declared: targets stay in the source's namespace
        None => {
            namespaces.insert(meta.namespace.clone());
        }
        Some(list) => {
            for entry in list.split(',') {
                if entry.contains('/') {
                    return Err(ReplicationError::Config(format!(
                        "source {key} has invalid namespace pattern on annotation {} ({entry})",
                        keys.replicate_to_namespaces()
                    )));
                }
                if !entry.is_empty() {
                    namespaces.insert(entry.to_string());
                }
            }
        }
    }

    let mut seen: BTreeSet<String> = BTreeSet::from([key.clone()]);
    let mut literals = Vec::new();
    let mut patterns = Vec::new();

    for namespace in &namespaces {
        if is_valid_name(namespace) {
            for name in &names {
                let full = format!("{namespace}/{name}");
                if seen.insert(full.clone()) {
                    literals.push(full);
                }
            }
        } else {
            let regex = compile_namespace(namespace, keys.replicate_to_namespaces())?;
            for name in &names {
                let full = format!("{namespace}/{name}");
                if seen.insert(full) {
                    patterns.push(TargetPattern::from_regex(regex.clone(), name.clone()));
                }
            }
        }
    }

    for entry in &qualified {
        if seen.contains(entry) {
            continue;
        }
        let parts: Vec<&str> = entry.splitn(3, '/').collect();
        let [namespace, name] = parts[..] else {
            return Err(ReplicationError::Config(format!(
                "source {key} has invalid path on annotation {} ({entry})",
                keys.replicate_to()
            )));
        };
        if !is_valid_name(name) {
            return Err(ReplicationError::Config(format!(
                "source {key} has invalid name on annotation {} ({name})",
                keys.replicate_to()
            )));
        }
        if is_valid_name(namespace) {
            literals.push(entry.clone());
        } else {
            let regex = compile_namespace(namespace, keys.replicate_to())?;
            patterns.push(TargetPattern::from_regex(regex, name));
        }
    }

    Ok(ReplicationTargets { literals, patterns })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> AnnotationKeys {
        AnnotationKeys::new("test.mitosis.dev")
    }

    fn meta(namespace: &str, name: &str, annotations: &[(&str, &str)]) -> ObjectMeta {
        let mut meta = ObjectMeta::new(namespace, name);
        meta.resource_version = Some("7".to_string());
        meta.annotations = annotations
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        meta
    }

    fn options(allow_all: bool) -> ReplicatorOptions {
        ReplicatorOptions { allow_all, keys: keys(), ..ReplicatorOptions::default() }
    }

    #[test]
    fn test_resolve_annotation_qualifies_bare_names() {
        let keys = keys();
        let target = meta("b", "t", &[(keys.replicate_from(), "s")]);
        assert_eq!(resolve_annotation(&target, keys.replicate_from()).as_deref(), Some("b/s"));

        let target = meta("b", "t", &[(keys.replicate_from(), "a/s")]);
        assert_eq!(resolve_annotation(&target, keys.replicate_from()).as_deref(), Some("a/s"));

        let target = meta("b", "t", &[]);
        assert_eq!(resolve_annotation(&target, keys.replicate_from()), None);
    }

    #[test]
    fn test_annotation_refers_to() {
        let keys = keys();
        let source = meta("a", "s", &[]);
        let same_namespace = meta("a", "t", &[(keys.replicate_from(), "s")]);
        let qualified = meta("b", "t", &[(keys.replicate_from(), "a/s")]);
        let other = meta("b", "t", &[(keys.replicate_from(), "s")]);

        assert!(annotation_refers_to(&same_namespace, keys.replicate_from(), &source));
        assert!(annotation_refers_to(&qualified, keys.replicate_from(), &source));
        assert!(!annotation_refers_to(&other, keys.replicate_from(), &source));
    }

    #[test]
    fn test_replication_requires_explicit_permission() {
        let keys = keys();
        let target = meta("b", "t", &[]);

        let source = meta("a", "s", &[]);
        let verdict = replication_allowed(&options(false), &target, &source).unwrap();
        assert!(matches!(verdict, Allowance::Denied(_)));

        // allow-all waives the requirement
        let verdict = replication_allowed(&options(true), &target, &source).unwrap();
        assert_eq!(verdict, Allowance::Allowed);

        let source = meta("a", "s", &[(keys.replication_allowed(), "true")]);
        let verdict = replication_allowed(&options(false), &target, &source).unwrap();
        assert_eq!(verdict, Allowance::Allowed);
    }

    #[test]
    fn test_replication_allowed_boolean_handling() {
        let keys = keys();
        let target = meta("b", "t", &[]);

        let source = meta("a", "s", &[(keys.replication_allowed(), "false")]);
        let verdict = replication_allowed(&options(false), &target, &source).unwrap();
        assert!(matches!(verdict, Allowance::Denied(_)));

        let source = meta("a", "s", &[(keys.replication_allowed(), "yes")]);
        let err = replication_allowed(&options(false), &target, &source).unwrap_err();
        assert!(matches!(err, ReplicationError::Config(_)));
    }

    #[test]
    fn test_replication_allowed_namespaces() {
        let keys = keys();
        let target = meta("team-blue", "t", &[]);

        let source = meta("a", "s", &[(keys.replication_allowed_namespaces(), "team-blue")]);
        assert_eq!(
            replication_allowed(&options(false), &target, &source).unwrap(),
            Allowance::Allowed
        );

        let source = meta("a", "s", &[(keys.replication_allowed_namespaces(), "team-.*")]);
        assert_eq!(
            replication_allowed(&options(false), &target, &source).unwrap(),
            Allowance::Allowed
        );

        let source = meta("a", "s", &[(keys.replication_allowed_namespaces(), "ops,prod")]);
        assert!(matches!(
            replication_allowed(&options(false), &target, &source).unwrap(),
            Allowance::Denied(_)
        ));

        let source = meta("a", "s", &[(keys.replication_allowed_namespaces(), "team-[")]);
        assert!(replication_allowed(&options(false), &target, &source).is_err());
    }

    #[test]
    fn test_replica_sources_deny_replication() {
        let keys = keys();
        let target = meta("b", "t", &[]);
        let source = meta(
            "a",
            "s",
            &[(keys.replication_allowed(), "true"), (keys.replicate_from(), "c/upstream")],
        );
        let verdict = replication_allowed(&options(false), &target, &source).unwrap();
        assert!(matches!(verdict, Allowance::Denied(reason) if reason.contains("already replicated")));
    }

    #[test]
    fn test_needs_data_update() {
        let keys = keys();
        let source = meta("a", "s", &[]);

        let target = meta("b", "t", &[]);
        assert_eq!(needs_data_update(&keys, &target, &source).unwrap(), DataUpdate::Needed);

        let target = meta("b", "t", &[(keys.replicated_from_version(), "7")]);
        assert_eq!(needs_data_update(&keys, &target, &source).unwrap(), DataUpdate::UpToDate);

        let target = meta("b", "t", &[(keys.replicated_from_version(), "3")]);
        assert_eq!(needs_data_update(&keys, &target, &source).unwrap(), DataUpdate::Needed);
    }

    #[test]
    fn test_needs_data_update_replicate_once() {
        let keys = keys();
        let source = meta("a", "s", &[(keys.replicate_once(), "true")]);
        let target = meta("b", "t", &[(keys.replicated_from_version(), "3")]);
        assert_eq!(
            needs_data_update(&keys, &target, &source).unwrap(),
            DataUpdate::ReplicatedOnce
        );

        // a version override forces one more pass
        let source = meta(
            "a",
            "s",
            &[(keys.replicate_once(), "true"), (keys.replicate_once_version(), "v2")],
        );
        assert_eq!(needs_data_update(&keys, &target, &source).unwrap(), DataUpdate::Needed);

        // until the target has caught up with the override
        let target = meta(
            "b",
            "t",
            &[(keys.replicated_from_version(), "3"), (keys.replicate_once_version(), "v2")],
        );
        assert_eq!(
            needs_data_update(&keys, &target, &source).unwrap(),
            DataUpdate::ReplicatedOnce
        );

        // the once annotation counts on either side
        let source = meta("a", "s", &[]);
        let target = meta(
            "b",
            "t",
            &[(keys.replicated_from_version(), "3"), (keys.replicate_once(), "true")],
        );
        assert_eq!(
            needs_data_update(&keys, &target, &source).unwrap(),
            DataUpdate::ReplicatedOnce
        );

        let source = meta("a", "s", &[(keys.replicate_once(), "maybe")]);
        let target = meta("b", "t", &[(keys.replicated_from_version(), "3")]);
        assert!(needs_data_update(&keys, &target, &source).is_err());
    }

    #[test]
    fn test_needs_from_annotations_update() {
        let keys = keys();
        let source = meta("s-ns", "src", &[(keys.replicate_from(), "d-ns/d")]);

        let target = meta("t-ns", "t", &[]);
        assert!(needs_from_annotations_update(&keys, &target, &source).unwrap());

        let target = meta("t-ns", "t", &[(keys.replicate_from(), "d-ns/d")]);
        assert!(!needs_from_annotations_update(&keys, &target, &source).unwrap());

        // differing once annotations require an update too
        let source = meta(
            "s-ns",
            "src",
            &[(keys.replicate_from(), "d-ns/d"), (keys.replicate_once(), "true")],
        );
        assert!(needs_from_annotations_update(&keys, &target, &source).unwrap());

        // a source referencing itself is invalid
        let source = meta("s-ns", "src", &[(keys.replicate_from(), "s-ns/src")]);
        assert!(needs_from_annotations_update(&keys, &target, &source).is_err());

        let source = meta("s-ns", "src", &[]);
        assert!(needs_from_annotations_update(&keys, &target, &source).is_err());
    }

    #[test]
    fn test_needs_allowed_annotations_update() {
        let keys = keys();
        let source = meta("a", "s", &[(keys.replication_allowed(), "true")]);

        let target = meta("b", "t", &[]);
        assert!(needs_allowed_annotations_update(&keys, &target, &source).unwrap());

        let target = meta("b", "t", &[(keys.replication_allowed(), "true")]);
        assert!(!needs_allowed_annotations_update(&keys, &target, &source).unwrap());

        // presence-sensitive in both directions
        let source = meta("a", "s", &[]);
        assert!(needs_allowed_annotations_update(&keys, &target, &source).unwrap());

        let source = meta("a", "s", &[(keys.replication_allowed(), "maybe")]);
        let target = meta("b", "t", &[]);
        assert!(needs_allowed_annotations_update(&keys, &target, &source).is_err());

        let source = meta("a", "s", &[(keys.replication_allowed_namespaces(), "team-[")]);
        assert!(needs_allowed_annotations_update(&keys, &target, &source).is_err());
    }

    #[test]
    fn test_is_replicated_by() {
        let keys = keys();
        let source = meta("a", "s", &[]);

        let target = meta("b", "t", &[(keys.replicated_by(), "a/s")]);
        assert!(is_replicated_by(&keys, &target, &source).is_ok());

        let target = meta("b", "t", &[(keys.replicated_by(), "other/s")]);
        assert!(is_replicated_by(&keys, &target, &source).is_err());

        let target = meta("b", "t", &[]);
        assert!(is_replicated_by(&keys, &target, &source).is_err());
    }

    #[test]
    fn test_replication_targets_bare_name() {
        let keys = keys();
        let source = meta("default", "src", &[(keys.replicate_to(), "dst")]);
        let targets = replication_targets(&keys, &source, &[]).unwrap();
        assert_eq!(targets.literals, vec!["default/dst".to_string()]);
        assert!(targets.patterns.is_empty());
    }

    #[test]
    fn test_replication_targets_excludes_self() {
        let keys = keys();
        let source = meta("default", "src", &[(keys.replicate_to(), "src,dst")]);
        let targets = replication_targets(&keys, &source, &[]).unwrap();
        assert_eq!(targets.literals, vec!["default/dst".to_string()]);
    }

    #[test]
    fn test_replication_targets_namespaces_cross_product() {
        let keys = keys();
        let source = meta(
            "default",
            "src",
            &[(keys.replicate_to(), "a,b"), (keys.replicate_to_namespaces(), "ns1,ns2")],
        );
        let targets = replication_targets(&keys, &source, &[]).unwrap();
        let mut literals = targets.literals.clone();
        literals.sort();
        assert_eq!(literals, vec!["ns1/a", "ns1/b", "ns2/a", "ns2/b"]);
    }

    #[test]
    fn test_replication_targets_namespace_only() {
        let keys = keys();
        let source = meta("default", "src", &[(keys.replicate_to_namespaces(), "ns1")]);
        let targets = replication_targets(&keys, &source, &[]).unwrap();
        assert_eq!(targets.literals, vec!["ns1/src".to_string()]);
    }

    #[test]
    fn test_replication_targets_patterns() {
        let keys = keys();
        let source = meta("default", "src", &[(keys.replicate_to(), "target-[0-9]+/settings")]);
        let targets = replication_targets(&keys, &source, &[]).unwrap();
        assert!(targets.literals.is_empty());
        assert_eq!(targets.patterns.len(), 1);
        assert!(targets.patterns[0].matches_key("target-3/settings"));

        let source = meta(
            "default",
            "src",
            &[(keys.replicate_to_namespaces(), "team-.*,ops")],
        );
        let targets = replication_targets(&keys, &source, &[]).unwrap();
        assert_eq!(targets.literals, vec!["ops/src".to_string()]);
        assert_eq!(targets.patterns.len(), 1);
        assert!(targets.patterns[0].matches_key("team-red/src"));
    }

    #[test]
    fn test_replication_targets_deduplicates() {
        let keys = keys();
        let source = meta(
            "default",
            "src",
            &[(keys.replicate_to(), "dst,ns1/dst"), (keys.replicate_to_namespaces(), "ns1")],
        );
        let targets = replication_targets(&keys, &source, &[]).unwrap();
        assert_eq!(targets.literals, vec!["ns1/dst".to_string()]);
    }

    #[test]
    fn test_replication_targets_rejects_invalid_entries() {
        let keys = keys();
        for annotations in [
            vec![(keys.replicate_to(), "Bad Name")],
            vec![(keys.replicate_to(), "a/b/c")],
            vec![(keys.replicate_to(), "ns/Bad")],
            vec![(keys.replicate_to_namespaces(), "ns/name")],
            vec![(keys.replicate_to(), "bad-[/x")],
        ] {
            let source = meta("default", "src", &annotations);
            assert!(replication_targets(&keys, &source, &[]).is_err(), "{annotations:?}");
        }
    }

    #[test]
    fn test_replication_targets_is_pure() {
        let keys = keys();
        let source = meta(
            "default",
            "src",
            &[(keys.replicate_to(), "dst"), (keys.replicate_to_namespaces(), "team-.*")],
        );
        let first = replication_targets(&keys, &source, &[]).unwrap();
        let second = replication_targets(&keys, &source, &first.patterns).unwrap();
        assert_eq!(first.literals, second.literals);
        assert_eq!(first.patterns.len(), second.patterns.len());
        for (a, b) in first.patterns.iter().zip(second.patterns.iter()) {
            assert_eq!(a.namespace_pattern(), b.namespace_pattern());
            assert_eq!(a.name(), b.name());
        }
    }

    #[test]
    fn test_is_replicated_to() {
        let keys = keys();
        let source = meta("default", "src", &[(keys.replicate_to(), "dst,team-.*/cfg")]);

        let covered = meta("default", "dst", &[]);
        assert!(is_replicated_to(&keys, &source, &covered, &[]).unwrap());

        let pattern_covered = meta("team-red", "cfg", &[]);
        assert!(is_replicated_to(&keys, &source, &pattern_covered, &[]).unwrap());

        let uncovered = meta("ops", "dst", &[]);
        assert!(!is_replicated_to(&keys, &source, &uncovered, &[]).unwrap());
    }

    #[test]
    fn test_bool_literals() {
        for value in ["1", "t", "T", "true", "TRUE", "True"] {
            assert_eq!(parse_bool_annotation(value), Some(true), "{value}");
        }
        for value in ["0", "f", "F", "false", "FALSE", "False"] {
            assert_eq!(parse_bool_annotation(value), Some(false), "{value}");
        }
        assert_eq!(parse_bool_annotation("yes"), None);
        assert_eq!(parse_bool_annotation(""), None);
    }
}
