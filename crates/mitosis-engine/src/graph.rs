// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! The in-memory dependency graph.
//!
//! Four maps keyed by canonical object keys, owned exclusively by the
//! replicator's event loop:
//!
//! - targets-from: source → targets currently pulling from it
//! - targets-to: source → targets it has pushed to
//! - watched targets / watched patterns: source → declared push targets,
//!   kept even when the destination namespace does not exist yet
//!
//! Append paths tolerate duplicates; consumption sorts and deduplicates.

use std::collections::{BTreeSet, HashMap};

use mitosis_core::types::split_key;
use mitosis_core::{ObjectMeta, TargetPattern};

#[derive(Debug, Default)]
pub(crate) struct DependencyGraph {
    targets_from: HashMap<String, Vec<String>>,
    targets_to: HashMap<String, Vec<String>>,
    watched_targets: HashMap<String, Vec<String>>,
    watched_patterns: HashMap<String, Vec<TargetPattern>>,
}

impl DependencyGraph {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Records that `target_key` pulls from `source_key`.
    pub(crate) fn record_dependent(&mut self, source_key: &str, target_key: String) {
        self.targets_from.entry(source_key.to_string()).or_default().push(target_key);
    }

    /// The targets pulling from `source_key`, sorted and deduplicated.
    pub(crate) fn dependents(&self, source_key: &str) -> Option<Vec<String>> {
        self.targets_from.get(source_key).map(|dependents| {
            let mut dependents = dependents.clone();
            dependents.sort();
            dependents.dedup();
            dependents
        })
    }

    /// Replaces the dependent list of `source_key`; empty removes the entry.
    pub(crate) fn set_dependents(&mut self, source_key: &str, dependents: Vec<String>) {
        if dependents.is_empty() {
            self.targets_from.remove(source_key);
        } else {
            self.targets_from.insert(source_key.to_string(), dependents);
        }
    }

    /// The targets `source_key` has pushed to, sorted and deduplicated.
    pub(crate) fn push_targets(&self, source_key: &str) -> Option<Vec<String>> {
        self.targets_to.get(source_key).map(|targets| {
            let mut targets = targets.clone();
            targets.sort();
            targets.dedup();
            targets
        })
    }

    /// Replaces the pushed-target list of `source_key`.
    pub(crate) fn set_push_targets(&mut self, source_key: &str, targets: Vec<String>) {
        if targets.is_empty() {
            self.targets_to.remove(source_key);
        } else {
            self.targets_to.insert(source_key.to_string(), targets);
        }
    }

    /// Appends one pushed target for `source_key`.
    pub(crate) fn add_push_target(&mut self, source_key: &str, target_key: String) {
        self.targets_to.entry(source_key.to_string()).or_default().push(target_key);
    }

    /// Stores the declared target set of `source_key` for later namespace
    /// matches; empty sets remove the respective entry.
    pub(crate) fn set_watched(
        &mut self,
        source_key: &str,
        targets: Vec<String>,
        patterns: Vec<TargetPattern>,
    ) {
        if targets.is_empty() {
            self.watched_targets.remove(source_key);
        } else {
            self.watched_targets.insert(source_key.to_string(), targets);
        }
        if patterns.is_empty() {
            self.watched_patterns.remove(source_key);
        } else {
            self.watched_patterns.insert(source_key.to_string(), patterns);
        }
    }

    /// The declared patterns of `source_key`, used to seed regex
    /// compilation caches.
    pub(crate) fn watched_patterns(&self, source_key: &str) -> &[TargetPattern] {
        self.watched_patterns.get(source_key).map_or(&[], Vec::as_slice)
    }

    /// Drops the watched declarations of `source_key`.
    pub(crate) fn forget_watched(&mut self, source_key: &str) {
        self.watched_targets.remove(source_key);
        self.watched_patterns.remove(source_key);
    }

    /// Drops every push-side entry of `source_key`.
    pub(crate) fn clear_source(&mut self, source_key: &str) {
        self.targets_to.remove(source_key);
        self.forget_watched(source_key);
    }

    /// Sources declaring the given object as a target, by literal key or by
    /// pattern match, in sorted order.
    pub(crate) fn sources_watching_key(&self, key: &str, meta: &ObjectMeta) -> Vec<String> {
        let mut sources: BTreeSet<String> = BTreeSet::new();
        for (source, watched) in &self.watched_targets {
            if watched.iter().any(|target| target == key) {
                sources.insert(source.clone());
            }
        }
        for (source, patterns) in &self.watched_patterns {
            if sources.contains(source) {
                continue;
            }
            if patterns.iter().any(|pattern| pattern.matches_meta(meta)) {
                sources.insert(source.clone());
            }
        }
        sources.into_iter().collect()
    }

    /// Sources declaring a target inside `namespace`, in sorted order.
    pub(crate) fn sources_watching_namespace(&self, namespace: &str) -> Vec<String> {
        let mut sources: BTreeSet<String> = BTreeSet::new();
        for (source, watched) in &self.watched_targets {
            let covers = watched
                .iter()
                .any(|target| split_key(target).is_some_and(|(target_ns, _)| target_ns == namespace));
            if covers {
                sources.insert(source.clone());
            }
        }
        for (source, patterns) in &self.watched_patterns {
            if sources.contains(source) {
                continue;
            }
            if patterns.iter().any(|pattern| pattern.match_namespace(namespace).is_some()) {
                sources.insert(source.clone());
            }
        }
        sources.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependents_are_sorted_and_deduplicated() {
        let mut graph = DependencyGraph::new();
        graph.record_dependent("a/s", "b/t".to_string());
        graph.record_dependent("a/s", "a/t".to_string());
        graph.record_dependent("a/s", "b/t".to_string());

        assert_eq!(
            graph.dependents("a/s").unwrap(),
            vec!["a/t".to_string(), "b/t".to_string()]
        );
        assert!(graph.dependents("other/s").is_none());

        graph.set_dependents("a/s", Vec::new());
        assert!(graph.dependents("a/s").is_none());
    }

    #[test]
    fn test_clear_source_drops_push_state() {
        let mut graph = DependencyGraph::new();
        graph.set_push_targets("a/s", vec!["ns/t".to_string()]);
        graph.set_watched(
            "a/s",
            vec!["ns/t".to_string()],
            vec![TargetPattern::compile("team-.*", "t").unwrap()],
        );
        graph.record_dependent("a/s", "b/t".to_string());

        graph.clear_source("a/s");
        assert!(graph.push_targets("a/s").is_none());
        assert!(graph.watched_patterns("a/s").is_empty());
        // pull-side state survives
        assert!(graph.dependents("a/s").is_some());
    }

    #[test]
    fn test_sources_watching_key() {
        let mut graph = DependencyGraph::new();
        graph.set_watched("a/s1", vec!["ns/t".to_string()], Vec::new());
        graph.set_watched(
            "a/s2",
            Vec::new(),
            vec![TargetPattern::compile("ns", "t").unwrap()],
        );
        graph.set_watched("a/s3", vec!["other/t".to_string()], Vec::new());

        let meta = ObjectMeta::new("ns", "t");
        assert_eq!(graph.sources_watching_key("ns/t", &meta), vec!["a/s1", "a/s2"]);
    }

    #[test]
    fn test_sources_watching_namespace() {
        let mut graph = DependencyGraph::new();
        graph.set_watched("a/s1", vec!["target-1/t".to_string()], Vec::new());
        graph.set_watched(
            "a/s2",
            Vec::new(),
            vec![TargetPattern::compile("target-[0-9]+", "t").unwrap()],
        );
        graph.set_watched("a/s3", vec!["ops/t".to_string()], Vec::new());

        assert_eq!(graph.sources_watching_namespace("target-1"), vec!["a/s1", "a/s2"]);
        assert_eq!(graph.sources_watching_namespace("target-2"), vec!["a/s2"]);
        assert!(graph.sources_watching_namespace("nowhere").is_empty());
    }
}
