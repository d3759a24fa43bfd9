// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Protocol adapters for the blitz load generator.
//!
//! Each module implements [`blitz_engine::ProtocolAdapter`] for one wire
//! protocol and owns three things: its connection configuration (the
//! `connection` section of the protocol YAML layer), its client state
//! (pooled or striped, safe for concurrent `execute` calls), and its
//! protocol-specific counters, exported into the snapshot's protocol
//! layer.
//!
//! Adapters translate client errors into the engine's error kinds and
//! report operation failures in-band; they never panic on malformed input.

pub mod grpc;
pub mod http;
pub mod kafka;
pub mod redis;
mod striped;
pub mod tcp;
pub mod udp;
pub mod websocket;

pub use grpc::{GrpcAdapter, GrpcConfig};
pub use http::{HttpAdapter, HttpConfig};
pub use kafka::{KafkaAdapter, KafkaConfig};
pub use redis::{RedisAdapter, RedisConfig};
pub use tcp::{TcpAdapter, TcpConfig};
pub use udp::{UdpAdapter, UdpConfig};
pub use websocket::{WebSocketAdapter, WebSocketConfig};

use blitz_engine::Error;
use serde::de::DeserializeOwned;

/// Deserializes a protocol `connection` section into a typed adapter
/// config. A null/absent section yields the config's defaults.
pub fn connection_config<T>(value: &serde_yaml::Value) -> Result<T, Error>
where
    T: DeserializeOwned + Default,
{
    if value.is_null() {
        return Ok(T::default());
    }
    serde_yaml::from_value(value.clone()).map_err(|e| Error::InvalidConfig {
        details: format!("invalid connection section: {e}"),
    })
}
