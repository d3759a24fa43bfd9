// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! UDP adapter.
//!
//! Operations: `packet_send` fires a datagram and returns; `echo` fires a
//! datagram and waits for the reply under the adapter's receive deadline,
//! feeding the packet-loss counters. Sockets are striped so concurrent
//! echoes never steal each other's replies.

use crate::striped::Striped;
use async_trait::async_trait;
use blitz_engine::{Error, ErrorKind, Operation, OperationResult, ProtocolAdapter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;

/// Connection settings for the UDP adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UdpConfig {
    /// Target address, `host:port`.
    pub addr: String,
    /// Local bind address.
    pub bind_addr: String,
    /// Number of striped sockets.
    pub pool_size: usize,
    /// How long `echo` waits for the reply before counting the packet as
    /// lost. Kept below the per-operation timeout so loss is attributed
    /// here, not synthesized by the engine.
    #[serde(with = "humantime_serde")]
    pub recv_timeout: Duration,
}

impl Default for UdpConfig {
    fn default() -> Self {
        UdpConfig {
            addr: "127.0.0.1:9100".to_owned(),
            bind_addr: "0.0.0.0:0".to_owned(),
            pool_size: 16,
            recv_timeout: Duration::from_millis(500),
        }
    }
}

/// UDP adapter over striped connected sockets.
pub struct UdpAdapter {
    config: UdpConfig,
    pool: Striped<UdpSocket>,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,
    echoes_sent: AtomicU64,
    echoes_lost: AtomicU64,
    echo_mismatches: AtomicU64,
}

impl UdpAdapter {
    /// Creates an unconnected adapter.
    #[must_use]
    pub fn new(config: UdpConfig) -> Self {
        let pool = Striped::new(config.pool_size);
        UdpAdapter {
            config,
            pool,
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            echoes_sent: AtomicU64::new(0),
            echoes_lost: AtomicU64::new(0),
            echo_mismatches: AtomicU64::new(0),
        }
    }

    async fn open_socket(&self) -> Result<UdpSocket, Error> {
        let socket = UdpSocket::bind(&self.config.bind_addr)
            .await
            .map_err(|e| Error::ConnectFailed {
                protocol: "udp".to_owned(),
                details: format!("bind {}: {e}", self.config.bind_addr),
            })?;
        socket
            .connect(&self.config.addr)
            .await
            .map_err(|e| Error::ConnectFailed {
                protocol: "udp".to_owned(),
                details: format!("{}: {e}", self.config.addr),
            })?;
        Ok(socket)
    }

    async fn echo(&self, socket: &UdpSocket, payload: &[u8], is_read: bool) -> OperationResult {
        let started = Instant::now();
        if let Err(err) = socket.send(payload).await {
            return OperationResult::failure(ErrorKind::Protocol, err.to_string())
                .with_read(is_read)
                .with_duration(started.elapsed());
        }
        let _ = self.packets_sent.fetch_add(1, Ordering::Relaxed);
        let _ = self.echoes_sent.fetch_add(1, Ordering::Relaxed);

        let mut reply = vec![0u8; payload.len().max(1)];
        match tokio::time::timeout(self.config.recv_timeout, socket.recv(&mut reply)).await {
            Ok(Ok(n)) => {
                let _ = self.packets_received.fetch_add(1, Ordering::Relaxed);
                if &reply[..n] != payload {
                    let _ = self.echo_mismatches.fetch_add(1, Ordering::Relaxed);
                    return OperationResult::failure(
                        ErrorKind::Protocol,
                        "echo reply does not match payload",
                    )
                    .with_read(is_read)
                    .with_duration(started.elapsed());
                }
                OperationResult::success(is_read, started.elapsed())
            }
            Ok(Err(err)) => OperationResult::failure(ErrorKind::Protocol, err.to_string())
                .with_read(is_read)
                .with_duration(started.elapsed()),
            Err(_) => {
                let _ = self.echoes_lost.fetch_add(1, Ordering::Relaxed);
                OperationResult::failure(ErrorKind::Timeout, "no echo reply within deadline")
                    .with_read(is_read)
                    .with_duration(self.config.recv_timeout)
            }
        }
    }
}

#[async_trait]
impl ProtocolAdapter for UdpAdapter {
    fn name(&self) -> &str {
        "udp"
    }

    async fn connect(&self) -> Result<(), Error> {
        for slot in self.pool.iter() {
            *slot.lock().await = Some(self.open_socket().await?);
        }
        tracing::debug!(addr = %self.config.addr, pool = self.pool.len(), "udp sockets ready");
        Ok(())
    }

    async fn execute(&self, op: Operation) -> OperationResult {
        let is_read = op.is_read_hint();
        let payload = op.value.clone().unwrap_or_default();
        let slot = self.pool.slot();
        let mut guard = slot.lock().await;
        if guard.is_none() {
            match self.open_socket().await {
                Ok(socket) => *guard = Some(socket),
                Err(err) => {
                    return OperationResult::failure(
                        ErrorKind::Protocol,
                        format!("socket reopen failed: {err}"),
                    );
                }
            }
        }
        let Some(socket) = guard.as_ref() else {
            return OperationResult::failure(ErrorKind::Internal, "empty socket slot");
        };

        match op.op_type.as_str() {
            "packet_send" => {
                let started = Instant::now();
                match socket.send(&payload).await {
                    Ok(_) => {
                        let _ = self.packets_sent.fetch_add(1, Ordering::Relaxed);
                        OperationResult::success(is_read, started.elapsed())
                    }
                    Err(err) => OperationResult::failure(ErrorKind::Protocol, err.to_string())
                        .with_read(is_read)
                        .with_duration(started.elapsed()),
                }
            }
            "echo" => self.echo(socket, &payload, is_read).await,
            other => OperationResult::failure(
                ErrorKind::Internal,
                format!("udp adapter does not implement `{other}`"),
            ),
        }
    }

    async fn close(&self) -> Result<(), Error> {
        for slot in self.pool.iter() {
            let _ = slot.lock().await.take();
        }
        Ok(())
    }

    fn protocol_metrics(&self) -> HashMap<String, serde_json::Value> {
        let sent = self.packets_sent.load(Ordering::Relaxed);
        let received = self.packets_received.load(Ordering::Relaxed);
        let echoes = self.echoes_sent.load(Ordering::Relaxed);
        let lost = self.echoes_lost.load(Ordering::Relaxed);
        let loss_rate = if echoes > 0 {
            lost as f64 / echoes as f64
        } else {
            0.0
        };

        let mut metrics = HashMap::new();
        let _ = metrics.insert("packets_sent".to_owned(), serde_json::json!(sent));
        let _ = metrics.insert("packets_received".to_owned(), serde_json::json!(received));
        let _ = metrics.insert("packet_loss_rate".to_owned(), serde_json::json!(loss_rate));
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

    async fn echo_server() -> String {
        let socket = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        let addr = socket.local_addr().expect("local addr").to_string();
        let _server = tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            while let Ok((n, peer)) = socket.recv_from(&mut buf).await {
                let _ = socket.send_to(&buf[..n], peer).await;
            }
        });
        addr
    }

    fn config(addr: String) -> UdpConfig {
        UdpConfig {
            addr,
            pool_size: 2,
            recv_timeout: Duration::from_millis(200),
            ..UdpConfig::default()
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn echo_round_trip_succeeds() {
        let adapter = UdpAdapter::new(config(echo_server().await));
        adapter.connect().await.expect("connect");
        let op = Operation::new("echo").with_value(b"ABCDEFGH".to_vec());
        let result = adapter.execute(op).await;
        assert!(result.success, "echo failed: {:?}", result.error);

        let metrics = adapter.protocol_metrics();
        assert_eq!(metrics["packets_sent"], serde_json::json!(1));
        assert_eq!(metrics["packet_loss_rate"], serde_json::json!(0.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lost_echo_counts_toward_loss_rate() {
        // Nothing listens on this socket's peer; the reply never comes.
        let silent = UdpSocket::bind("127.0.0.1:0").await.expect("bind");
        let addr = silent.local_addr().expect("local addr").to_string();
        let adapter = UdpAdapter::new(config(addr));
        adapter.connect().await.expect("connect");

        let result = adapter.execute(Operation::new("echo").with_value(b"x".to_vec())).await;
        assert_eq!(result.error_kind(), Some(ErrorKind::Timeout));

        let metrics = adapter.protocol_metrics();
        assert_eq!(metrics["packet_loss_rate"], serde_json::json!(1.0));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn packet_send_is_fire_and_forget() {
        let adapter = UdpAdapter::new(config(echo_server().await));
        adapter.connect().await.expect("connect");
        let result = adapter
            .execute(Operation::new("packet_send").with_value(b"payload".to_vec()))
            .await;
        assert!(result.success);
        assert!(result.duration.expect("measured") < Duration::from_millis(100));
    }
}
