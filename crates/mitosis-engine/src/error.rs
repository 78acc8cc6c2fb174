// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! Error types for replication decisions and mutations.

use thiserror::Error;

use mitosis_client::ClientError;

/// A specialized `Result` type for engine operations.
pub type Result<T> = std::result::Result<T, ReplicationError>;

/// Why a replication step was not carried out.
///
/// Every variant is recovered within a single handler invocation: the
/// failure is logged, the handler returns, and the next event or resync
/// retries whatever is still applicable.
#[derive(Debug, Error)]
pub enum ReplicationError {
    /// A malformed annotation, invalid target path or regex compilation
    /// failure on an observed object.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The source's permission annotations deny replication, or the target
    /// is not owned by the acting source.
    #[error("not permitted: {0}")]
    Permission(String),

    /// An object expected in the local store was absent.
    #[error("missing object: {0}")]
    Missing(String),

    /// The mutation lost an optimistic-concurrency race; the cached view
    /// catches up through the watch and the next pass retries.
    #[error("stale resource version: {0}")]
    Stale(ClientError),

    /// Any other orchestrator API failure.
    #[error("api failure: {0}")]
    Api(ClientError),
}

impl From<ClientError> for ReplicationError {
    fn from(err: ClientError) -> Self {
        if err.is_conflict() {
            Self::Stale(err)
        } else {
            Self::Api(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflicts_become_stale() {
        let err = ClientError::Conflict { kind: "configmap", key: "default/a".to_string() };
        assert!(matches!(ReplicationError::from(err), ReplicationError::Stale(_)));

        let err = ClientError::NotFound { kind: "configmap", key: "default/a".to_string() };
        assert!(matches!(ReplicationError::from(err), ReplicationError::Api(_)));
    }
}
