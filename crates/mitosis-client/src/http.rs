// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (c) 2025 The Mitosis Authors

//! REST client for Kubernetes-style orchestrator APIs.
//!
//! Unary calls carry a bounded timeout; watch requests stay open for the
//! life of the stream and are decoded line by line. A closed or failed
//! watch simply ends the stream; the informer layer re-lists and
//! re-subscribes.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use mitosis_core::ReplicableObject;

use crate::api::{ObjectApi, ObjectList, RestResource, WatchEvent, WatchStream};
use crate::credentials::ClusterCredentials;
use crate::error::{ClientError, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const WATCH_CHANNEL_CAPACITY: usize = 64;
const ERROR_BODY_LIMIT: usize = 512;

/// An orchestrator reached over its REST API.
pub struct HttpCluster {
    http: reqwest::Client,
    base: String,
    token: Option<String>,
}

impl HttpCluster {
    /// Builds a client from resolved credentials.
    pub fn connect(credentials: &ClusterCredentials) -> Result<Self> {
        if credentials.server.is_empty() {
            return Err(ClientError::Credentials("no server URL configured".to_string()));
        }

        let mut builder = reqwest::Client::builder().connect_timeout(CONNECT_TIMEOUT);
        if let Some(ca_file) = &credentials.ca_file {
            let pem = std::fs::read(ca_file).map_err(|err| {
                ClientError::Credentials(format!("cannot read {}: {err}", ca_file.display()))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem).map_err(|err| {
                ClientError::Credentials(format!("invalid CA bundle {}: {err}", ca_file.display()))
            })?;
            builder = builder.add_root_certificate(certificate);
        }
        let http = builder.build().map_err(|err| ClientError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base: credentials.server.trim_end_matches('/').to_string(),
            token: credentials.resolve_token()?,
        })
    }

    fn collection_url<T: RestResource>(&self) -> String {
        format!("{}/api/v1/{}", self.base, T::PLURAL)
    }

    fn mutation_url<T: RestResource>(&self, namespace: &str) -> String {
        if T::NAMESPACED {
            format!("{}/api/v1/namespaces/{namespace}/{}", self.base, T::PLURAL)
        } else {
            self.collection_url::<T>()
        }
    }

    fn object_url<T: RestResource>(&self, namespace: &str, name: &str) -> String {
        format!("{}/{name}", self.mutation_url::<T>(namespace))
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self.http.request(method, url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(&self, request: RequestBuilder, kind: &'static str, key: &str) -> Result<Response> {
        let response = request
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;
        Self::check(response, kind, key).await
    }

    async fn check(response: Response, kind: &'static str, key: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::CONFLICT {
            return Err(ClientError::Conflict { kind, key: key.to_string() });
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ClientError::NotFound { kind, key: key.to_string() });
        }
        let url = response.url().to_string();
        let mut message = response.text().await.unwrap_or_default();
        message.truncate(ERROR_BODY_LIMIT);
        Err(ClientError::Api { status: status.as_u16(), url, message })
    }

    async fn decode<T: RestResource>(response: Response) -> Result<T> {
        response.json().await.map_err(|err| ClientError::Transport(err.to_string()))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireList<T> {
    #[serde(default)]
    metadata: WireListMeta,
    #[serde(default = "Vec::new")]
    items: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct WireListMeta {
    resource_version: String,
}

#[derive(Debug, Deserialize)]
struct WireWatchEvent {
    #[serde(rename = "type")]
    kind: String,
    object: serde_json::Value,
}

fn parse_watch_line<T: RestResource>(line: &[u8]) -> serde_json::Result<Option<WatchEvent<T>>> {
    let wire: WireWatchEvent = serde_json::from_slice(line)?;
    let event = match wire.kind.as_str() {
        "ADDED" => WatchEvent::Added(serde_json::from_value(wire.object)?),
        "MODIFIED" => WatchEvent::Modified(serde_json::from_value(wire.object)?),
        "DELETED" => WatchEvent::Deleted(serde_json::from_value(wire.object)?),
        // Bookmarks and error frames end up here; the informer recovers
        // from missed state through its next list.
        _ => return Ok(None),
    };
    Ok(Some(event))
}

#[async_trait]
impl<T: RestResource> ObjectApi<T> for HttpCluster {
    async fn list(&self) -> Result<ObjectList<T>> {
        let url = self.collection_url::<T>();
        let response = self.send(self.request(Method::GET, &url), T::KIND, "*").await?;
        let list: WireList<T> =
            response.json().await.map_err(|err| ClientError::Transport(err.to_string()))?;
        Ok(ObjectList { items: list.items, resource_version: list.metadata.resource_version })
    }

    async fn watch(&self, resource_version: &str) -> Result<WatchStream<T>> {
        let url = self.collection_url::<T>();
        let request = self
            .request(Method::GET, &url)
            .query(&[("watch", "true"), ("resourceVersion", resource_version)]);
        let response = request.send().await.map_err(|err| ClientError::Transport(err.to_string()))?;
        let mut response = Self::check(response, T::KIND, "*").await?;

        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        tokio::spawn(async move {
            let mut buffer: Vec<u8> = Vec::new();
            loop {
                match response.chunk().await {
                    Ok(Some(chunk)) => {
                        buffer.extend_from_slice(&chunk);
                        while let Some(end) = buffer.iter().position(|byte| *byte == b'\n') {
                            let line: Vec<u8> = buffer.drain(..=end).collect();
                            let line = &line[..line.len() - 1];
                            if line.is_empty() {
                                continue;
                            }
                            match parse_watch_line::<T>(line) {
                                Ok(Some(event)) => {
                                    if tx.send(event).await.is_err() {
                                        return;
                                    }
                                }
                                Ok(None) => {}
                                Err(err) => {
                                    warn!(kind = T::KIND, error = %err, "dropping undecodable watch line");
                                }
                            }
                        }
                    }
                    Ok(None) => {
                        debug!(kind = T::KIND, "watch stream closed by server");
                        return;
                    }
                    Err(err) => {
                        debug!(kind = T::KIND, error = %err, "watch stream failed");
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }

    async fn get(&self, namespace: &str, name: &str) -> Result<T> {
        let url = self.object_url::<T>(namespace, name);
        let key = format!("{namespace}/{name}");
        let response = self.send(self.request(Method::GET, &url), T::KIND, &key).await?;
        Self::decode(response).await
    }

    async fn create(&self, object: &T) -> Result<T> {
        let meta = object.meta();
        let url = self.mutation_url::<T>(&meta.namespace);
        let request = self.request(Method::POST, &url).json(object);
        let response = self.send(request, T::KIND, &meta.key()).await?;
        Self::decode(response).await
    }

    async fn update(&self, object: &T) -> Result<T> {
        let meta = object.meta();
        let url = self.object_url::<T>(&meta.namespace, &meta.name);
        let request = self.request(Method::PUT, &url).json(object);
        let response = self.send(request, T::KIND, &meta.key()).await?;
        Self::decode(response).await
    }

    async fn delete(&self, namespace: &str, name: &str, resource_version: &str) -> Result<()> {
        let url = self.object_url::<T>(namespace, name);
        let key = format!("{namespace}/{name}");
        let mut request = self.request(Method::DELETE, &url);
        if !resource_version.is_empty() {
            request = request.json(&json!({
                "preconditions": { "resourceVersion": resource_version }
            }));
        }
        self.send(request, T::KIND, &key).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use mitosis_core::{ConfigMap, Namespace, Secret};

    use super::*;

    fn client() -> HttpCluster {
        HttpCluster::connect(&ClusterCredentials {
            server: "https://cluster.example.com:6443/".to_string(),
            ..ClusterCredentials::default()
        })
        .unwrap()
    }

    #[test]
    fn test_url_layout() {
        let client = client();
        assert_eq!(
            client.collection_url::<ConfigMap>(),
            "https://cluster.example.com:6443/api/v1/configmaps"
        );
        assert_eq!(
            client.object_url::<Secret>("default", "creds"),
            "https://cluster.example.com:6443/api/v1/namespaces/default/secrets/creds"
        );
        assert_eq!(
            client.object_url::<Namespace>("", "target-1"),
            "https://cluster.example.com:6443/api/v1/namespaces/target-1"
        );
    }

    #[test]
    fn test_parse_watch_line() {
        let line = br#"{"type":"ADDED","object":{"metadata":{"namespace":"default","name":"source","resourceVersion":"3"}}}"#;
        let event = parse_watch_line::<ConfigMap>(line).unwrap().unwrap();
        match event {
            WatchEvent::Added(object) => assert_eq!(object.metadata.key(), "default/source"),
            other => panic!("expected add event, got {other:?}"),
        }

        let bookmark = br#"{"type":"BOOKMARK","object":{}}"#;
        assert!(parse_watch_line::<ConfigMap>(bookmark).unwrap().is_none());

        assert!(parse_watch_line::<ConfigMap>(b"not json").is_err());
    }
}
