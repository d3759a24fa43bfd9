// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Kafka adapter.
//!
//! Operation: `produce`. The duration is measured from initiating the send
//! to the broker's delivery acknowledgement, so it covers batching, the
//! in-flight request and the ack, not merely the local enqueue. Each ack's
//! partition and offset are tagged onto the result and surface in the
//! snapshot's protocol layer.
//!
//! librdkafka connects lazily: creating the producer succeeds even when no
//! broker is reachable, and connectivity problems surface as delivery
//! errors on the first produced messages.

use async_trait::async_trait;
use blitz_engine::{Error, ErrorKind, Operation, OperationResult, ProtocolAdapter};
use parking_lot::RwLock;
use rdkafka::ClientConfig;
use rdkafka::error::KafkaError;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Connection settings for the Kafka adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Comma-separated bootstrap servers.
    pub brokers: String,
    /// Topic produced to.
    pub topic: String,
    /// Client id reported to the brokers.
    pub client_id: String,
    /// Producer acks setting (`0`, `1` or `all`).
    pub acks: String,
    /// librdkafka message timeout; deliveries unacked after this fail.
    #[serde(with = "humantime_serde")]
    pub message_timeout: Duration,
    /// Optional compression codec (`gzip`, `lz4`, `zstd`, ...).
    pub compression: Option<String>,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        KafkaConfig {
            brokers: "127.0.0.1:9092".to_owned(),
            topic: "blitz".to_owned(),
            client_id: "blitz".to_owned(),
            acks: "1".to_owned(),
            message_timeout: Duration::from_secs(5),
            compression: None,
        }
    }
}

impl KafkaConfig {
    fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        let _ = config
            .set("bootstrap.servers", &self.brokers)
            .set("client.id", &self.client_id)
            .set("acks", &self.acks)
            .set(
                "message.timeout.ms",
                self.message_timeout.as_millis().to_string(),
            );
        if let Some(codec) = &self.compression {
            let _ = config.set("compression.codec", codec);
        }
        config
    }
}

/// Kafka adapter over a shared future producer.
pub struct KafkaAdapter {
    config: KafkaConfig,
    producer: RwLock<Option<FutureProducer>>,
    messages_produced: AtomicU64,
    bytes_produced: AtomicU64,
    delivery_errors: AtomicU64,
}

impl KafkaAdapter {
    /// Creates an unconnected adapter.
    #[must_use]
    pub fn new(config: KafkaConfig) -> Self {
        KafkaAdapter {
            config,
            producer: RwLock::new(None),
            messages_produced: AtomicU64::new(0),
            bytes_produced: AtomicU64::new(0),
            delivery_errors: AtomicU64::new(0),
        }
    }
}

fn kafka_error_kind(err: &KafkaError) -> ErrorKind {
    match err {
        KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut)
        | KafkaError::MessageProduction(RDKafkaErrorCode::RequestTimedOut) => ErrorKind::Timeout,
        _ => ErrorKind::Protocol,
    }
}

#[async_trait]
impl ProtocolAdapter for KafkaAdapter {
    fn name(&self) -> &str {
        "kafka"
    }

    async fn connect(&self) -> Result<(), Error> {
        let producer: FutureProducer =
            self.config
                .client_config()
                .create()
                .map_err(|e| Error::ConnectFailed {
                    protocol: "kafka".to_owned(),
                    details: e.to_string(),
                })?;
        *self.producer.write() = Some(producer);
        tracing::debug!(brokers = %self.config.brokers, topic = %self.config.topic, "kafka producer ready");
        Ok(())
    }

    async fn execute(&self, op: Operation) -> OperationResult {
        if op.op_type != "produce" {
            return OperationResult::failure(
                ErrorKind::Internal,
                format!("kafka adapter does not implement `{}`", op.op_type),
            );
        }
        let Some(producer) = self.producer.read().clone() else {
            return OperationResult::failure(ErrorKind::Internal, "execute before connect");
        };

        let payload = op.value.clone().unwrap_or_default();
        let key = op.key.clone().unwrap_or_default();
        let mut record = FutureRecord::to(&self.config.topic)
            .payload(&payload)
            .key(&key);
        if let Some(partition) = op.params.get("partition").and_then(|v| v.as_i64()) {
            record = record.partition(partition as i32);
        }

        let started = Instant::now();
        match producer.send(record, Timeout::Never).await {
            Ok((partition, offset)) => {
                let _ = self.messages_produced.fetch_add(1, Ordering::Relaxed);
                let _ = self
                    .bytes_produced
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
                OperationResult::success(false, started.elapsed())
                    .with_metadata("last_partition", serde_json::json!(partition))
                    .with_metadata("last_offset", serde_json::json!(offset))
            }
            Err((err, _message)) => {
                let _ = self.delivery_errors.fetch_add(1, Ordering::Relaxed);
                OperationResult::failure(kafka_error_kind(&err), err.to_string())
                    .with_duration(started.elapsed())
            }
        }
    }

    async fn close(&self) -> Result<(), Error> {
        let Some(producer) = self.producer.write().take() else {
            return Ok(());
        };
        // Flush blocks inside librdkafka; keep it off the async runtime.
        let flushed = tokio::task::spawn_blocking(move || {
            producer.flush(Timeout::After(Duration::from_secs(5)))
        })
        .await;
        match flushed {
            Ok(Ok(())) => Ok(()),
            Ok(Err(err)) => {
                tracing::warn!(%err, "kafka flush failed on close");
                Ok(())
            }
            Err(err) => Err(Error::Internal {
                details: format!("kafka flush task failed: {err}"),
            }),
        }
    }

    fn protocol_metrics(&self) -> HashMap<String, serde_json::Value> {
        let mut metrics = HashMap::new();
        let _ = metrics.insert(
            "messages_produced".to_owned(),
            serde_json::json!(self.messages_produced.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "bytes_produced".to_owned(),
            serde_json::json!(self.bytes_produced.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "delivery_errors".to_owned(),
            serde_json::json!(self.delivery_errors.load(Ordering::Relaxed)),
        );
        metrics
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;

    #[test]
    fn client_config_carries_settings() {
        let config = KafkaConfig {
            brokers: "broker-1:9092,broker-2:9092".to_owned(),
            acks: "all".to_owned(),
            compression: Some("zstd".to_owned()),
            ..KafkaConfig::default()
        };
        let client = config.client_config();
        assert_eq!(client.get("bootstrap.servers"), Some("broker-1:9092,broker-2:9092"));
        assert_eq!(client.get("acks"), Some("all"));
        assert_eq!(client.get("compression.codec"), Some("zstd"));
        assert_eq!(client.get("message.timeout.ms"), Some("5000"));
    }

    #[tokio::test]
    async fn execute_before_connect_is_internal() {
        let adapter = KafkaAdapter::new(KafkaConfig::default());
        let result = adapter.execute(Operation::new("produce")).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Internal));
    }

    #[tokio::test]
    async fn unsupported_operation_is_internal() {
        let adapter = KafkaAdapter::new(KafkaConfig::default());
        let result = adapter.execute(Operation::new("consume")).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Internal));
    }

    #[test]
    fn timeout_codes_map_to_timeout_kind() {
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::MessageTimedOut);
        assert_eq!(kafka_error_kind(&err), ErrorKind::Timeout);
        let err = KafkaError::MessageProduction(RDKafkaErrorCode::QueueFull);
        assert_eq!(kafka_error_kind(&err), ErrorKind::Protocol);
    }
}
