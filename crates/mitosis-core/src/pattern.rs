//! Namespace target patterns.
//!
//! A `replicate-to` or `replicate-to-namespaces` entry whose namespace part
//! is not a plain name is treated as a regex over namespace names. Patterns
//! are compiled in anchored form so `target-[0-9]+` cannot accidentally
//! match `not-a-target-1-either`.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{split_key, ObjectMeta};

static VALID_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^[0-9a-z.-]+$").expect("valid name pattern"));

static VALID_PATH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("^(?:[0-9a-z.-]+/)?[0-9a-z.-]+$").expect("valid path pattern"));

/// Returns true when `value` is a valid object or namespace name.
#[must_use]
pub fn is_valid_name(value: &str) -> bool {
    VALID_NAME.is_match(value)
}

/// Returns true when `value` is a valid name or `namespace/name` path.
#[must_use]
pub fn is_valid_path(value: &str) -> bool {
    VALID_PATH.is_match(value)
}

/// Wraps a namespace expression in the anchored form used for matching.
#[must_use]
pub fn anchored(expression: &str) -> String {
    format!("^(?:{expression})$")
}

/// A push target addressed by namespace pattern: any namespace matching the
/// compiled regex receives an object with the literal name.
#[derive(Debug, Clone)]
pub struct TargetPattern {
    namespace: Regex,
    name: String,
}

impl TargetPattern {
    /// Compiles a pattern from a raw namespace expression and target name.
    pub fn compile(namespace_expression: &str, name: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self { namespace: Regex::new(&anchored(namespace_expression))?, name: name.into() })
    }

    /// Builds a pattern from an already compiled (anchored) namespace regex.
    #[must_use]
    pub fn from_regex(namespace: Regex, name: impl Into<String>) -> Self {
        Self { namespace, name: name.into() }
    }

    /// The literal target name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The anchored namespace expression, usable as a compilation cache key.
    #[must_use]
    pub fn namespace_pattern(&self) -> &str {
        self.namespace.as_str()
    }

    /// The compiled namespace regex.
    #[must_use]
    pub fn namespace_regex(&self) -> &Regex {
        &self.namespace
    }

    /// Returns true when the pattern matches the given object.
    #[must_use]
    pub fn matches_meta(&self, meta: &ObjectMeta) -> bool {
        meta.name == self.name && self.namespace.is_match(&meta.namespace)
    }

    /// Returns true when the pattern matches the given canonical key.
    #[must_use]
    pub fn matches_key(&self, key: &str) -> bool {
        split_key(key)
            .is_some_and(|(namespace, name)| name == self.name && self.namespace.is_match(namespace))
    }

    /// Returns the target key in `namespace` when the namespace matches.
    #[must_use]
    pub fn match_namespace(&self, namespace: &str) -> Option<String> {
        self.namespace.is_match(namespace).then(|| format!("{namespace}/{}", self.name))
    }

    /// Returns the target keys in every matching namespace.
    pub fn targets<'a>(&self, namespaces: impl IntoIterator<Item = &'a str>) -> Vec<String> {
        namespaces
            .into_iter()
            .filter(|namespace| self.namespace.is_match(namespace))
            .map(|namespace| format!("{namespace}/{}", self.name))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_validation() {
        assert!(is_valid_name("target-1"));
        assert!(is_valid_name("a.b.c"));
        assert!(!is_valid_name("Target"));
        assert!(!is_valid_name("a/b"));
        assert!(!is_valid_name(""));
    }

    #[test]
    fn test_path_validation() {
        assert!(is_valid_path("target"));
        assert!(is_valid_path("ns/target"));
        assert!(!is_valid_path("ns/sub/target"));
        assert!(!is_valid_path("ns/"));
    }

    #[test]
    fn test_anchored_matching() {
        let pattern = TargetPattern::compile("target-[0-9]+", "settings").unwrap();
        assert_eq!(
            pattern.match_namespace("target-7"),
            Some("target-7/settings".to_string())
        );
        assert_eq!(pattern.match_namespace("not-a-target-7-either"), None);
        assert!(pattern.matches_key("target-12/settings"));
        assert!(!pattern.matches_key("target-12/other"));
    }

    #[test]
    fn test_matches_meta() {
        let pattern = TargetPattern::compile("team-.*", "settings").unwrap();
        assert!(pattern.matches_meta(&ObjectMeta::new("team-red", "settings")));
        assert!(!pattern.matches_meta(&ObjectMeta::new("team-red", "other")));
        assert!(!pattern.matches_meta(&ObjectMeta::new("ops", "settings")));
    }

    #[test]
    fn test_targets_enumeration() {
        let pattern = TargetPattern::compile("target-[0-9]+", "settings").unwrap();
        let namespaces = ["target-1", "ops", "target-2"];
        assert_eq!(
            pattern.targets(namespaces),
            vec!["target-1/settings".to_string(), "target-2/settings".to_string()]
        );
    }

    #[test]
    fn test_invalid_expression_is_rejected() {
        assert!(TargetPattern::compile("target-[", "settings").is_err());
    }
}
