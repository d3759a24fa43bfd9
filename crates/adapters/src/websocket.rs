// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! WebSocket adapter.
//!
//! Operations: `message` sends one binary frame; `echo` sends a frame and
//! awaits the echoed reply. Streams are striped so concurrent echoes never
//! consume each other's replies.

use crate::striped::Striped;
use async_trait::async_trait;
use blitz_engine::{Error, ErrorKind, Operation, OperationResult, ProtocolAdapter};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Connection settings for the WebSocket adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketConfig {
    /// Target URL, `ws://...` or `wss://...`.
    pub url: String,
    /// Number of striped streams.
    pub pool_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        WebSocketConfig {
            url: "ws://127.0.0.1:9300/".to_owned(),
            pool_size: 16,
        }
    }
}

/// WebSocket adapter over striped client streams.
pub struct WebSocketAdapter {
    config: WebSocketConfig,
    pool: Striped<WsStream>,
    messages_sent: AtomicU64,
    messages_received: AtomicU64,
    echo_mismatches: AtomicU64,
}

impl WebSocketAdapter {
    /// Creates an unconnected adapter.
    #[must_use]
    pub fn new(config: WebSocketConfig) -> Self {
        let pool = Striped::new(config.pool_size);
        WebSocketAdapter {
            config,
            pool,
            messages_sent: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            echo_mismatches: AtomicU64::new(0),
        }
    }

    async fn dial(&self) -> Result<WsStream, Error> {
        let (stream, _response) =
            connect_async(self.config.url.as_str())
                .await
                .map_err(|e| Error::ConnectFailed {
                    protocol: "websocket".to_owned(),
                    details: format!("{}: {e}", self.config.url),
                })?;
        Ok(stream)
    }

    async fn send_frame(
        &self,
        stream: &mut WsStream,
        payload: Vec<u8>,
    ) -> Result<(), tokio_tungstenite::tungstenite::Error> {
        stream.send(Message::Binary(payload)).await?;
        let _ = self.messages_sent.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[async_trait]
impl ProtocolAdapter for WebSocketAdapter {
    fn name(&self) -> &str {
        "websocket"
    }

    async fn connect(&self) -> Result<(), Error> {
        for slot in self.pool.iter() {
            *slot.lock().await = Some(self.dial().await?);
        }
        tracing::debug!(url = %self.config.url, pool = self.pool.len(), "websocket streams connected");
        Ok(())
    }

    async fn execute(&self, op: Operation) -> OperationResult {
        let echo = match op.op_type.as_str() {
            "message" => false,
            "echo" => true,
            other => {
                return OperationResult::failure(
                    ErrorKind::Internal,
                    format!("websocket adapter does not implement `{other}`"),
                );
            }
        };
        let is_read = op.is_read_hint();
        let payload = op.value.unwrap_or_default();

        let slot = self.pool.slot();
        let mut guard = slot.lock().await;
        if guard.is_none() {
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
            return OperationResult::failure(ErrorKind::Internal, "empty stream slot");
        };

        let started = Instant::now();
        if let Err(err) = self.send_frame(stream, payload.clone()).await {
            *guard = None;
            return OperationResult::failure(ErrorKind::Protocol, err.to_string())
                .with_read(is_read)
                .with_duration(started.elapsed());
        }
        if !echo {
            return OperationResult::success(is_read, started.elapsed());
        }

        match stream.next().await {
            Some(Ok(reply)) => {
                let _ = self.messages_received.fetch_add(1, Ordering::Relaxed);
                let duration = started.elapsed();
                if reply.into_data() == payload {
                    OperationResult::success(is_read, duration)
                } else {
                    let _ = self.echo_mismatches.fetch_add(1, Ordering::Relaxed);
                    OperationResult::failure(ErrorKind::Protocol, "echo reply does not match payload")
                        .with_read(is_read)
                        .with_duration(duration)
                }
            }
            Some(Err(err)) => {
                *guard = None;
                OperationResult::failure(ErrorKind::Protocol, err.to_string())
                    .with_read(is_read)
                    .with_duration(started.elapsed())
            }
            None => {
                *guard = None;
                OperationResult::failure(ErrorKind::Protocol, "stream closed awaiting echo")
                    .with_read(is_read)
                    .with_duration(started.elapsed())
            }
        }
    }

    async fn close(&self) -> Result<(), Error> {
        for slot in self.pool.iter() {
            if let Some(mut stream) = slot.lock().await.take() {
                if let Err(err) = stream.close(None).await {
                    tracing::debug!(%err, "websocket close handshake failed");
                }
            }
        }
        Ok(())
    }

    fn protocol_metrics(&self) -> HashMap<String, serde_json::Value> {
        let mut metrics = HashMap::new();
        let _ = metrics.insert(
            "messages_sent".to_owned(),
            serde_json::json!(self.messages_sent.load(Ordering::Relaxed)),
        );
        let _ = metrics.insert(
            "messages_received".to_owned(),
            serde_json::json!(self.messages_received.load(Ordering::Relaxed)),
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
        let addr = listener.local_addr().expect("local addr");
        let _server = tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let _client = tokio::spawn(async move {
                    let Ok(mut ws) = tokio_tungstenite::accept_async(socket).await else {
                        return;
                    };
                    while let Some(Ok(msg)) = ws.next().await {
                        if msg.is_binary() || msg.is_text() {
                            if ws.send(msg).await.is_err() {
                                return;
                            }
                        }
                    }
                });
            }
        });
        format!("ws://{addr}/")
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn echo_round_trip_succeeds() {
        let adapter = WebSocketAdapter::new(WebSocketConfig {
            url: echo_server().await,
            pool_size: 2,
        });
        adapter.connect().await.expect("connect");

        let op = Operation::new("echo").with_value(b"ABCDEFGH".to_vec());
        let result = adapter.execute(op).await;
        assert!(result.success, "echo failed: {:?}", result.error);

        let metrics = adapter.protocol_metrics();
        assert_eq!(metrics["messages_sent"], serde_json::json!(1));
        assert_eq!(metrics["messages_received"], serde_json::json!(1));
        adapter.close().await.expect("close");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn fire_and_forget_message() {
        let adapter = WebSocketAdapter::new(WebSocketConfig {
            url: echo_server().await,
            pool_size: 1,
        });
        adapter.connect().await.expect("connect");
        let result = adapter
            .execute(Operation::new("message").with_value(b"payload".to_vec()))
            .await;
        assert!(result.success);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn connect_failure_is_fatal() {
        let adapter = WebSocketAdapter::new(WebSocketConfig {
            url: "ws://127.0.0.1:1/".to_owned(),
            pool_size: 1,
        });
        let err = adapter.connect().await.expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::Connect);
    }
}
