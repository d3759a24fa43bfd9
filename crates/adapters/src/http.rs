// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! HTTP adapter.
//!
//! Operations: `get` and `post` against the configured URL; `post` carries
//! the generated payload as the request body. A response status below 400
//! counts as success. The duration covers request send through full body
//! read, measured here so job-queue wait is excluded.

use async_trait::async_trait;
use blitz_engine::{Error, ErrorKind, Operation, OperationResult, ProtocolAdapter};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Connection settings for the HTTP adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Target URL.
    pub url: String,
    /// Extra request headers.
    pub headers: HashMap<String, String>,
    /// `Content-Type` for `post` operations.
    pub content_type: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        HttpConfig {
            url: "http://127.0.0.1:8080/".to_owned(),
            headers: HashMap::new(),
            content_type: "application/octet-stream".to_owned(),
        }
    }
}

/// HTTP adapter over a shared pooled client.
pub struct HttpAdapter {
    config: HttpConfig,
    client: RwLock<Option<reqwest::Client>>,
    requests: AtomicU64,
    bytes_received: AtomicU64,
    /// Response counts indexed by status class (`2xx` at index 2, ...).
    status_classes: [AtomicU64; 6],
}

impl HttpAdapter {
    /// Creates an unconnected adapter.
    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
        HttpAdapter {
            config,
            client: RwLock::new(None),
            requests: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            status_classes: Default::default(),
        }
    }

    fn count_status(&self, status: u16) {
        let class = (status / 100) as usize;
        if (1..=5).contains(&class) {
            let _ = self.status_classes[class].fetch_add(1, Ordering::Relaxed);
        }
    }
}

fn reqwest_error_kind(err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout
    } else {
        ErrorKind::Protocol
    }
}

#[async_trait]
impl ProtocolAdapter for HttpAdapter {
    fn name(&self) -> &str {
        "http"
    }

    async fn connect(&self) -> Result<(), Error> {
        let mut default_headers = reqwest::header::HeaderMap::new();
        for (name, value) in &self.config.headers {
            let name = reqwest::header::HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                Error::InvalidConfig {
                    details: format!("invalid header name `{name}`: {e}"),
                }
            })?;
            let value = reqwest::header::HeaderValue::from_str(value).map_err(|e| {
                Error::InvalidConfig {
                    details: format!("invalid header value for `{name:?}`: {e}"),
                }
            })?;
            let _ = default_headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .build()
            .map_err(|e| Error::ConnectFailed {
                protocol: "http".to_owned(),
                details: e.to_string(),
            })?;
        *self.client.write() = Some(client);
        Ok(())
    }

    async fn execute(&self, op: Operation) -> OperationResult {
        let Some(client) = self.client.read().clone() else {
            return OperationResult::failure(ErrorKind::Internal, "execute before connect");
        };
        let is_read = op.is_read_hint();

        let request = match op.op_type.as_str() {
            "get" => client.get(self.config.url.as_str()),
            "post" => client
                .post(self.config.url.as_str())
                .header(reqwest::header::CONTENT_TYPE, &self.config.content_type)
                .body(op.value.clone().unwrap_or_default()),
            other => {
                return OperationResult::failure(
                    ErrorKind::Internal,
                    format!("http adapter does not implement `{other}`"),
                );
            }
        };

        let _ = self.requests.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                return OperationResult::failure(reqwest_error_kind(&err), err.to_string())
                    .with_read(is_read)
                    .with_duration(started.elapsed());
            }
        };

        let status = response.status();
        self.count_status(status.as_u16());
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(err) => {
                return OperationResult::failure(reqwest_error_kind(&err), err.to_string())
                    .with_read(is_read)
                    .with_duration(started.elapsed());
            }
        };
        let duration = started.elapsed();
        let _ = self
            .bytes_received
            .fetch_add(body.len() as u64, Ordering::Relaxed);

        if status.is_client_error() || status.is_server_error() {
            OperationResult::failure(ErrorKind::Protocol, format!("status {status}"))
                .with_read(is_read)
                .with_duration(duration)
        } else {
            let mut result = OperationResult::success(is_read, duration);
            if is_read {
                result = result.with_value(body.to_vec());
            }
            result
        }
    }

    async fn close(&self) -> Result<(), Error> {
        let _ = self.client.write().take();
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        let Some(client) = self.client.read().clone() else {
            return Err(Error::Internal {
                details: "health check before connect".to_owned(),
            });
        };
        let _ = client
            .get(self.config.url.as_str())
            .send()
            .await
            .map_err(|e| Error::ConnectFailed {
                protocol: "http".to_owned(),
                details: e.to_string(),
            })?;
        Ok(())
    }

    fn protocol_metrics(&self) -> HashMap<String, serde_json::Value> {
        let mut metrics = HashMap::new();
        let _ = metrics.insert(
            "requests".to_owned(),
            serde_json::json!(self.requests.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "bytes_received".to_owned(),
            serde_json::json!(self.bytes_received.load(Ordering::Relaxed)),
        );
        for class in 1..=5usize {
            let count = self.status_classes[class].load(Ordering::Relaxed);
            if count > 0 {
                let _ = metrics.insert(format!("status_{class}xx"), serde_json::json!(count));
            }
        }
        metrics
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;

    #[test]
    fn status_classes_are_bucketed() {
        let adapter = HttpAdapter::new(HttpConfig::default());
        adapter.count_status(200);
        adapter.count_status(201);
        adapter.count_status(404);
        adapter.count_status(503);

        let metrics = adapter.protocol_metrics();
        assert_eq!(metrics["status_2xx"], serde_json::json!(2));
        assert_eq!(metrics["status_4xx"], serde_json::json!(1));
        assert_eq!(metrics["status_5xx"], serde_json::json!(1));
        assert!(!metrics.contains_key("status_3xx"));
    }

    #[tokio::test]
    async fn execute_before_connect_is_internal() {
        let adapter = HttpAdapter::new(HttpConfig::default());
        let result = adapter.execute(Operation::new("get").with_read_hint(true)).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Internal));
    }

    #[tokio::test]
    async fn invalid_header_rejected_at_connect() {
        let mut config = HttpConfig::default();
        let _ = config
            .headers
            .insert("bad header".to_owned(), "x".to_owned());
        let adapter = HttpAdapter::new(config);
        let err = adapter.connect().await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn request_against_dead_port_is_a_protocol_failure() {
        let adapter = HttpAdapter::new(HttpConfig {
            url: "http://127.0.0.1:1/".to_owned(),
            ..HttpConfig::default()
        });
        adapter.connect().await.expect("client builds");
        let result = adapter.execute(Operation::new("get").with_read_hint(true)).await;
        assert!(!result.success);
        assert_eq!(result.error_kind(), Some(ErrorKind::Protocol));
    }
}
