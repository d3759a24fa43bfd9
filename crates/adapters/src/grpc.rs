// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! gRPC adapter.
//!
//! Operation: `health_check`, a unary call against the standard
//! `grpc.health.v1.Health` service every conformant server exposes. The
//! channel is HTTP/2-multiplexed, so one shared channel serves all
//! workers.

use async_trait::async_trait;
use blitz_engine::{Error, ErrorKind, Operation, OperationResult, ProtocolAdapter};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tonic::transport::{Channel, Endpoint};
use tonic_health::pb::HealthCheckRequest;
use tonic_health::pb::health_check_response::ServingStatus;
use tonic_health::pb::health_client::HealthClient;

/// Connection settings for the gRPC adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrpcConfig {
    /// Target endpoint, `http://host:port`.
    pub endpoint: String,
    /// Service name passed to the health check; empty checks the server
    /// as a whole.
    pub service: String,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        GrpcConfig {
            endpoint: "http://127.0.0.1:50051".to_owned(),
            service: String::new(),
        }
    }
}

/// gRPC adapter over a shared multiplexed channel.
pub struct GrpcAdapter {
    config: GrpcConfig,
    channel: RwLock<Option<Channel>>,
    checks: AtomicU64,
    serving: AtomicU64,
    not_serving: AtomicU64,
}

impl GrpcAdapter {
    /// Creates an unconnected adapter.
    #[must_use]
    pub fn new(config: GrpcConfig) -> Self {
        GrpcAdapter {
            config,
            channel: RwLock::new(None),
            checks: AtomicU64::new(0),
            serving: AtomicU64::new(0),
            not_serving: AtomicU64::new(0),
        }
    }
}

fn status_error_kind(status: &tonic::Status) -> ErrorKind {
    match status.code() {
        tonic::Code::DeadlineExceeded => ErrorKind::Timeout,
        _ => ErrorKind::Protocol,
    }
}

#[async_trait]
impl ProtocolAdapter for GrpcAdapter {
    fn name(&self) -> &str {
        "grpc"
    }

    async fn connect(&self) -> Result<(), Error> {
        let endpoint =
            Endpoint::from_shared(self.config.endpoint.clone()).map_err(|e| {
                Error::InvalidConfig {
                    details: format!("invalid endpoint `{}`: {e}", self.config.endpoint),
                }
            })?;
        let channel = endpoint.connect().await.map_err(|e| Error::ConnectFailed {
            protocol: "grpc".to_owned(),
            details: format!("{}: {e}", self.config.endpoint),
        })?;
        *self.channel.write() = Some(channel);
        tracing::debug!(endpoint = %self.config.endpoint, "grpc channel connected");
        Ok(())
    }

    async fn execute(&self, op: Operation) -> OperationResult {
        if op.op_type != "health_check" {
            return OperationResult::failure(
                ErrorKind::Internal,
                format!("grpc adapter does not implement `{}`", op.op_type),
            );
        }
        let Some(channel) = self.channel.read().clone() else {
            return OperationResult::failure(ErrorKind::Internal, "execute before connect");
        };
        let is_read = op.is_read_hint();

        let mut client = HealthClient::new(channel);
        let request = HealthCheckRequest {
            service: self.config.service.clone(),
        };
        let _ = self.checks.fetch_add(1, Ordering::Relaxed);
        let started = Instant::now();
        match client.check(request).await {
            Ok(response) => {
                let duration = started.elapsed();
                if response.into_inner().status == ServingStatus::Serving as i32 {
                    let _ = self.serving.fetch_add(1, Ordering::Relaxed);
                    OperationResult::success(is_read, duration)
                } else {
                    let _ = self.not_serving.fetch_add(1, Ordering::Relaxed);
                    OperationResult::failure(ErrorKind::Protocol, "service not serving")
                        .with_read(is_read)
                        .with_duration(duration)
                }
            }
            Err(status) => OperationResult::failure(status_error_kind(&status), status.to_string())
                .with_read(is_read)
                .with_duration(started.elapsed()),
        }
    }

    async fn close(&self) -> Result<(), Error> {
        let _ = self.channel.write().take();
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        let result = self
            .execute(Operation::new("health_check").with_read_hint(true))
            .await;
        match result.error {
            None => Ok(()),
            Some(err) => Err(Error::ConnectFailed {
                protocol: "grpc".to_owned(),
                details: err.message,
            }),
        }
    }

    fn protocol_metrics(&self) -> HashMap<String, serde_json::Value> {
        let mut metrics = HashMap::new();
        let _ = metrics.insert(
            "health_checks".to_owned(),
            serde_json::json!(self.checks.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "serving".to_owned(),
            serde_json::json!(self.serving.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "not_serving".to_owned(),
            serde_json::json!(self.not_serving.load(Ordering::Relaxed)),
        );
        metrics
    }
}
