// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! Connection credentials for the orchestrator API.
//!
//! Credentials come either from a small TOML file or, when no file is
//! given, from the conventional in-cluster environment: the service host
//! and port variables plus the mounted service-account token.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{ClientError, Result};

const SERVICE_HOST_ENV: &str = "KUBERNETES_SERVICE_HOST";
const SERVICE_PORT_ENV: &str = "KUBERNETES_SERVICE_PORT";
const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";

/// Where and how to reach the orchestrator API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClusterCredentials {
    /// Base URL of the API server, e.g. `https://10.0.0.1:443`.
    pub server: String,

    /// Bearer token. Takes precedence over `token_file`.
    pub token: Option<String>,

    /// Path to a file holding the bearer token.
    pub token_file: Option<PathBuf>,

    /// Path to a PEM bundle to trust in addition to system roots.
    pub ca_file: Option<PathBuf>,
}

impl ClusterCredentials {
    /// Loads credentials from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|err| {
            ClientError::Credentials(format!("cannot read {}: {err}", path.display()))
        })?;
        let credentials: Self = toml::from_str(&content).map_err(|err| {
            ClientError::Credentials(format!("cannot parse {}: {err}", path.display()))
        })?;
        if credentials.server.is_empty() {
            return Err(ClientError::Credentials(format!(
                "{} does not set a server URL",
                path.display()
            )));
        }
        Ok(credentials)
    }

    /// Builds credentials from the in-cluster environment.
    pub fn in_cluster() -> Result<Self> {
        let host = std::env::var(SERVICE_HOST_ENV)
            .map_err(|_| ClientError::Credentials(format!("{SERVICE_HOST_ENV} is not set")))?;
        let port = std::env::var(SERVICE_PORT_ENV).unwrap_or_else(|_| "443".to_string());

        let service_account = Path::new(SERVICE_ACCOUNT_DIR);
        let existing = |file: &str| {
            let path = service_account.join(file);
            path.exists().then_some(path)
        };

        Ok(Self {
            server: format!("https://{host}:{port}"),
            token: None,
            token_file: existing("token"),
            ca_file: existing("ca.crt"),
        })
    }

    /// Resolves the bearer token, reading `token_file` when needed.
    pub fn resolve_token(&self) -> Result<Option<String>> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }
        match &self.token_file {
            Some(path) => {
                let token = std::fs::read_to_string(path).map_err(|err| {
                    ClientError::Credentials(format!("cannot read {}: {err}", path.display()))
                })?;
                Ok(Some(token.trim().to_string()))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_credentials() {
        let credentials: ClusterCredentials = toml::from_str(
            r#"
            server = "https://cluster.example.com:6443"
            token = "abc123"
            "#,
        )
        .unwrap();
        assert_eq!(credentials.server, "https://cluster.example.com:6443");
        assert_eq!(credentials.resolve_token().unwrap().as_deref(), Some("abc123"));
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let parsed = toml::from_str::<ClusterCredentials>("sevrer = \"https://x\"");
        assert!(parsed.is_err());
    }
}
