// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Raw TCP adapter.
//!
//! Operations: `send` writes the payload; `echo` writes the payload and
//! reads the same number of bytes back, verifying them against the
//! deterministic payload pattern. Connections are striped; a failed
//! stream is dropped in place and re-dialed on next checkout.

use crate::striped::Striped;
use async_trait::async_trait;
use blitz_engine::{Error, ErrorKind, Operation, OperationResult, ProtocolAdapter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connection settings for the TCP adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TcpConfig {
    /// Target address, `host:port`.
    pub addr: String,
    /// Number of striped connections.
    pub pool_size: usize,
    /// Whether to disable Nagle's algorithm.
    pub nodelay: bool,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            addr: "127.0.0.1:9000".to_owned(),
            pool_size: 16,
            nodelay: true,
        }
    }
}

/// TCP adapter over a striped connection pool.
pub struct TcpAdapter {
    config: TcpConfig,
    pool: Striped<TcpStream>,
    bytes_sent: AtomicU64,
    bytes_received: AtomicU64,
    reconnects: AtomicU64,
    echo_mismatches: AtomicU64,
}

impl TcpAdapter {
    /// Creates an unconnected adapter.
    #[must_use]
    pub fn new(config: TcpConfig) -> Self {
        let pool = Striped::new(config.pool_size);
        TcpAdapter {
            config,
            pool,
            bytes_sent: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
            echo_mismatches: AtomicU64::new(0),
        }
    }

    async fn dial(&self) -> Result<TcpStream, Error> {
        let stream = TcpStream::connect(&self.config.addr)
            .await
            .map_err(|e| Error::ConnectFailed {
                protocol: "tcp".to_owned(),
                details: format!("{}: {e}", self.config.addr),
            })?;
        if self.config.nodelay {
            stream.set_nodelay(true).map_err(|e| Error::ConnectFailed {
                protocol: "tcp".to_owned(),
                details: format!("set_nodelay: {e}"),
            })?;
        }
        Ok(stream)
    }

    async fn exchange(&self, stream: &mut TcpStream, payload: &[u8], echo: bool)
        -> Result<u64, std::io::Error>
    {
        stream.write_all(payload).await?;
        stream.flush().await?;
        let _ = self.bytes_sent.fetch_add(payload.len() as u64, Ordering::Relaxed);
        if !echo {
            return Ok(0);
        }
        let mut reply = vec![0u8; payload.len()];
        let _ = stream.read_exact(&mut reply).await?;
        let _ = self
            .bytes_received
            .fetch_add(reply.len() as u64, Ordering::Relaxed);
        if reply != payload {
            let _ = self.echo_mismatches.fetch_add(1, Ordering::Relaxed);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "echo reply does not match payload",
            ));
        }
        Ok(reply.len() as u64)
    }
}

fn io_error_kind(err: &std::io::Error) -> ErrorKind {
    match err.kind() {
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => ErrorKind::Timeout,
        _ => ErrorKind::Protocol,
    }
}

#[async_trait]
impl ProtocolAdapter for TcpAdapter {
    fn name(&self) -> &str {
        "tcp"
    }

    async fn connect(&self) -> Result<(), Error> {
        for slot in self.pool.iter() {
            *slot.lock().await = Some(self.dial().await?);
        }
        tracing::debug!(addr = %self.config.addr, pool = self.pool.len(), "tcp pool connected");
        Ok(())
    }

    async fn execute(&self, op: Operation) -> OperationResult {
        let echo = match op.op_type.as_str() {
            "send" => false,
            "echo" => true,
            other => {
                return OperationResult::failure(
                    ErrorKind::Internal,
                    format!("tcp adapter does not implement `{other}`"),
                );
            }
        };
        let is_read = op.is_read_hint();
        let payload = op.value.unwrap_or_default();

        let slot = self.pool.slot();
        let mut guard = slot.lock().await;
        if guard.is_none() {
            let _ = self.reconnects.fetch_add(1, Ordering::Relaxed);
            match self.dial().await {
                Ok(stream) => *guard = Some(stream),
                Err(err) => {
                    return OperationResult::failure(
                        ErrorKind::Protocol,
                        format!("reconnect failed: {err}"),
                    )
                    .with_read(is_read);
                }
            }
        }
        let Some(stream) = guard.as_mut() else {
            return OperationResult::failure(ErrorKind::Internal, "empty connection slot");
        };

        let started = Instant::now();
        match self.exchange(stream, &payload, echo).await {
            Ok(_) => OperationResult::success(is_read, started.elapsed()),
            Err(err) => {
                // The stream state is unknown after an error; re-dial later.
                *guard = None;
                OperationResult::failure(io_error_kind(&err), err.to_string())
                    .with_read(is_read)
                    .with_duration(started.elapsed())
            }
        }
    }

    async fn close(&self) -> Result<(), Error> {
        for slot in self.pool.iter() {
            let _ = slot.lock().await.take();
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), Error> {
        let _ = self.dial().await?;
        Ok(())
    }

    fn protocol_metrics(&self) -> HashMap<String, serde_json::Value> {
        let mut metrics = HashMap::new();
        let _ = metrics.insert(
            "bytes_sent".to_owned(),
            serde_json::json!(self.bytes_sent.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "bytes_received".to_owned(),
            serde_json::json!(self.bytes_received.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "reconnects".to_owned(),
            serde_json::json!(self.reconnects.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "echo_mismatches".to_owned(),
            serde_json::json!(self.echo_mismatches.load(Ordering::Relaxed)),
        );
        metrics
    }
}

#[cfg(test)]
mod tests {
    #![allow(missing_docs)]
    use super::*;
    use tokio::net::TcpListener;

    async fn echo_server() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr").to_string();
        let _server = tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    return;
                };
                let _client = tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => {
                                if socket.write_all(&buf[..n]).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                });
            }
        });
        addr
    }

    fn op(op_type: &str, payload: &[u8]) -> Operation {
        Operation::new(op_type)
            .with_read_hint(false)
            .with_value(payload.to_vec())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn echo_round_trip_succeeds() {
        let addr = echo_server().await;
        let adapter = TcpAdapter::new(TcpConfig {
            addr,
            pool_size: 2,
            nodelay: true,
        });
        adapter.connect().await.expect("connect");

        let result = adapter.execute(op("echo", b"ABCDEFGH")).await;
        assert!(result.success, "echo failed: {:?}", result.error);
        assert!(result.duration.is_some());

        let metrics = adapter.protocol_metrics();
        assert_eq!(metrics["bytes_sent"], serde_json::json!(8));
        assert_eq!(metrics["bytes_received"], serde_json::json!(8));
        adapter.close().await.expect("close");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn send_does_not_wait_for_a_reply() {
        let addr = echo_server().await;
        let adapter = TcpAdapter::new(TcpConfig {
            addr,
            pool_size: 1,
            nodelay: true,
        });
        adapter.connect().await.expect("connect");
        let result = adapter.execute(op("send", b"payload")).await;
        assert!(result.success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connect_failure_is_fatal() {
        let adapter = TcpAdapter::new(TcpConfig {
            // Reserved port that nothing listens on.
            addr: "127.0.0.1:1".to_owned(),
            pool_size: 1,
            nodelay: true,
        });
        let err = adapter.connect().await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Connect);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn unsupported_operation_is_internal() {
        let addr = echo_server().await;
        let adapter = TcpAdapter::new(TcpConfig {
            addr,
            pool_size: 1,
            nodelay: true,
        });
        adapter.connect().await.expect("connect");
        let result = adapter.execute(op("publish", b"x")).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Internal));
    }
}
