// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! Orchestrator API access for the mitosis controller.
//!
//! The replication engine talks to the cluster through the narrow
//! [`ObjectApi`] trait: list, watch, get, and the three mutations with
//! optimistic-concurrency semantics. Two implementations are provided:
//!
//! - [`HttpCluster`]: a REST client following Kubernetes-style API
//!   conventions (cluster-wide list/watch, namespaced mutation paths,
//!   bearer-token auth, streaming line-delimited watch).
//! - [`MemoryCluster`]: a single-process in-memory cluster used by the
//!   test suites and for local experimentation. It enforces the same
//!   resource-version rules as a real API server and records every
//!   mutation it performs.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod api;
pub mod credentials;
pub mod error;
pub mod http;
pub mod memory;

pub use api::{ObjectApi, ObjectList, RestResource, WatchEvent, WatchStream};
pub use credentials::ClusterCredentials;
pub use error::{ClientError, Result};
pub use http::HttpCluster;
pub use memory::{Action, ActionVerb, MemoryCluster};
