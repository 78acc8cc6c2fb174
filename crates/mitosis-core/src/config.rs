//! Shared replicator options.

use std::collections::BTreeMap;

use crate::annotations::AnnotationKeys;
use crate::error::{Error, Result};

/// Options shared by every replicator instance in the process.
#[derive(Debug, Clone)]
pub struct ReplicatorOptions {
    /// When true, sources need no explicit permission annotation for pull
    /// replication.
    pub allow_all: bool,

    /// When true, unknown annotations under the controller prefix are
    /// tolerated; when false they suppress handling of the object.
    pub ignore_unknown: bool,

    /// Labels applied to controller-created objects.
    pub labels: BTreeMap<String, String>,

    /// The annotation registry in effect.
    pub keys: AnnotationKeys,
}

impl Default for ReplicatorOptions {
    fn default() -> Self {
        Self {
            allow_all: false,
            ignore_unknown: true,
            labels: BTreeMap::new(),
            keys: AnnotationKeys::default(),
        }
    }
}

/// Parses a `key=value,key2=value2` label list.
///
/// Empty entries are skipped; an entry without exactly one `=` between two
/// non-empty trimmed parts is rejected.
pub fn parse_labels(input: &str) -> Result<BTreeMap<String, String>> {
    let mut labels = BTreeMap::new();
    for entry in input.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        let invalid =
            || Error::Config(format!("invalid label \"{entry}\": format label=value expected"));
        let parts: Vec<&str> = entry.split('=').collect();
        let [label, value] = parts[..] else {
            return Err(invalid());
        };
        let (label, value) = (label.trim(), value.trim());
        if label.is_empty() || value.is_empty() {
            return Err(invalid());
        }
        labels.insert(label.to_string(), value.to_string());
    }
    Ok(labels)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_labels() {
        let labels = parse_labels("app=mitosis, tier = infra ,").unwrap();
        assert_eq!(labels.get("app").map(String::as_str), Some("mitosis"));
        assert_eq!(labels.get("tier").map(String::as_str), Some("infra"));
        assert_eq!(labels.len(), 2);
    }

    #[test]
    fn test_parse_labels_empty() {
        assert!(parse_labels("").unwrap().is_empty());
    }

    #[test]
    fn test_parse_labels_rejects_malformed() {
        assert!(parse_labels("app").is_err());
        assert!(parse_labels("app=").is_err());
        assert!(parse_labels("=value").is_err());
        assert!(parse_labels("a=b=c").is_err());
    }
}
