//! Core types for the mitosis replication controller.
//!
//! This crate provides the building blocks shared by the client and the
//! replication engine:
//! - The replicated object model (`ObjectMeta`, `ConfigMap`, `Secret`,
//!   `Namespace`) and canonical `namespace/name` keys
//! - The annotation registry (`AnnotationKeys`)
//! - Namespace target patterns (`TargetPattern`) and name validation
//! - Controller options shared by every replicator instance

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod annotations;
pub mod config;
pub mod error;
pub mod pattern;
pub mod types;

pub use annotations::{AnnotationKeys, DEFAULT_ANNOTATIONS_PREFIX};
pub use config::ReplicatorOptions;
pub use error::{Error, Result};
pub use pattern::TargetPattern;
pub use types::{split_key, ConfigMap, Namespace, ObjectMeta, ReplicableObject, Secret, SecretType};
