// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! Error types for orchestrator API access.

use thiserror::Error;

/// A specialized `Result` type for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors returned by the orchestrator API.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The submitted resource version is stale, or the object already
    /// exists. The caller's cached view will be refreshed by the watch.
    #[error("conflict on {kind} {key}")]
    Conflict {
        /// The resource kind.
        kind: &'static str,
        /// The canonical object key.
        key: String,
    },

    /// The requested object does not exist.
    #[error("{kind} {key} not found")]
    NotFound {
        /// The resource kind.
        kind: &'static str,
        /// The canonical object key.
        key: String,
    },

    /// Any other orchestrator-side failure.
    #[error("orchestrator returned status {status} for {url}: {message}")]
    Api {
        /// The HTTP status code.
        status: u16,
        /// The request URL.
        url: String,
        /// The response body, truncated.
        message: String,
    },

    /// The request never produced an orchestrator response.
    #[error("transport error: {0}")]
    Transport(String),

    /// Connection credentials are missing or unusable.
    #[error("credentials error: {0}")]
    Credentials(String),
}

impl ClientError {
    /// Returns true when the failure is an optimistic-concurrency conflict.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Returns true when the failure is a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
