// Copyright The blitz authors
// SPDX-License-Identifier: Apache-2.0

//! Command-line surface: one subcommand per protocol, a shared benchmark
//! flag set, and the overlay of flags onto file-based configuration
//! (flags win).

use blitz_adapters::{
    GrpcAdapter, GrpcConfig, HttpAdapter, HttpConfig, KafkaAdapter, KafkaConfig, RedisAdapter,
    RedisConfig, TcpAdapter, TcpConfig, UdpAdapter, UdpConfig, WebSocketAdapter, WebSocketConfig,
    connection_config,
};
use blitz_config::{ProtocolDocument, WorkloadConfig};
use blitz_engine::{
    Error, FixedOpFactory, OperationFactory, ProtocolAdapter, ReadWriteMixFactory,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Multi-protocol load generator and benchmark harness.
#[derive(Debug, Parser)]
#[command(name = "blitz", version, about)]
pub struct Cli {
    /// Path to the shared core config file (logging, reports, monitor,
    /// latency sampling).
    #[arg(long, global = true, value_name = "FILE")]
    pub core_config: Option<PathBuf>,

    /// Protocol to drive.
    #[command(subcommand)]
    pub protocol: ProtocolCommand,
}

/// Benchmark flags shared by every protocol subcommand. Each flag
/// overrides the corresponding field of the protocol config file.
#[derive(Debug, Clone, Default, Args)]
pub struct BenchArgs {
    /// Total operations to execute.
    #[arg(short = 'n', long = "requests", value_name = "COUNT")]
    pub requests: Option<u64>,

    /// Number of concurrent workers.
    #[arg(short = 'c', long, value_name = "COUNT")]
    pub concurrency: Option<usize>,

    /// Payload size in bytes.
    #[arg(short = 'd', long = "data-size", value_name = "BYTES")]
    pub data_size: Option<usize>,

    /// Run for a wall-clock window instead of (or on top of) a total,
    /// e.g. `30s` or `5m`.
    #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION")]
    pub duration: Option<Duration>,

    /// Stagger worker start over this window.
    #[arg(long = "ramp-up", value_parser = humantime::parse_duration, value_name = "DURATION")]
    pub ramp_up: Option<Duration>,

    /// Per-operation timeout.
    #[arg(long, value_parser = humantime::parse_duration, value_name = "DURATION")]
    pub timeout: Option<Duration>,

    /// Read share of the operation mix, 0..=100.
    #[arg(short = 'R', long = "read-ratio", value_name = "PERCENT")]
    pub read_ratio: Option<u8>,

    /// Operation-mix selector understood by the protocol adapter.
    #[arg(short = 't', long = "test-case", value_name = "NAME")]
    pub test_case: Option<String>,

    /// Path to the protocol config file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

impl BenchArgs {
    /// Overlays these flags onto a file-derived workload; flags win.
    pub fn overlay(&self, workload: &mut WorkloadConfig) {
        if let Some(requests) = self.requests {
            workload.total = requests;
        }
        if let Some(concurrency) = self.concurrency {
            workload.parallels = concurrency;
        }
        if let Some(data_size) = self.data_size {
            workload.data_size = data_size;
        }
        if let Some(duration) = self.duration {
            workload.duration = Some(duration);
        }
        if let Some(ramp_up) = self.ramp_up {
            workload.ramp_up = Some(ramp_up);
        }
        if let Some(timeout) = self.timeout {
            workload.timeout = timeout;
        }
        if let Some(read_ratio) = self.read_ratio {
            workload.read_percent = read_ratio;
        }
        if let Some(test_case) = &self.test_case {
            workload.test_case = test_case.clone();
        }
    }
}

/// One subcommand per protocol.
#[derive(Debug, Subcommand)]
pub enum ProtocolCommand {
    /// Benchmark a Redis server.
    Redis {
        /// Shared benchmark flags.
        #[command(flatten)]
        bench: BenchArgs,
        /// Target address, `host:port`.
        #[arg(long, value_name = "ADDR")]
        addr: Option<String>,
        /// ACL user name.
        #[arg(long, value_name = "USER")]
        username: Option<String>,
        /// Password.
        #[arg(long, value_name = "PASSWORD")]
        password: Option<String>,
        /// Logical database index.
        #[arg(long, value_name = "DB")]
        db: Option<i64>,
    },
    /// Benchmark an HTTP endpoint.
    Http {
        /// Shared benchmark flags.
        #[command(flatten)]
        bench: BenchArgs,
        /// Target URL.
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
    /// Benchmark a Kafka cluster (producer path).
    Kafka {
        /// Shared benchmark flags.
        #[command(flatten)]
        bench: BenchArgs,
        /// Comma-separated bootstrap servers.
        #[arg(long, value_name = "BROKERS")]
        brokers: Option<String>,
        /// Topic to produce to.
        #[arg(long, value_name = "TOPIC")]
        topic: Option<String>,
        /// Producer acks setting.
        #[arg(long, value_name = "ACKS")]
        acks: Option<String>,
    },
    /// Benchmark a raw TCP endpoint.
    Tcp {
        /// Shared benchmark flags.
        #[command(flatten)]
        bench: BenchArgs,
        /// Target address, `host:port`.
        #[arg(long, value_name = "ADDR")]
        addr: Option<String>,
    },
    /// Benchmark a UDP endpoint.
    Udp {
        /// Shared benchmark flags.
        #[command(flatten)]
        bench: BenchArgs,
        /// Target address, `host:port`.
        #[arg(long, value_name = "ADDR")]
        addr: Option<String>,
    },
    /// Benchmark a WebSocket endpoint.
    Websocket {
        /// Shared benchmark flags.
        #[command(flatten)]
        bench: BenchArgs,
        /// Target URL, `ws://...`.
        #[arg(long, value_name = "URL")]
        url: Option<String>,
    },
    /// Benchmark a gRPC server via the standard health service.
    Grpc {
        /// Shared benchmark flags.
        #[command(flatten)]
        bench: BenchArgs,
        /// Target endpoint, `http://host:port`.
        #[arg(long, value_name = "ENDPOINT")]
        endpoint: Option<String>,
        /// Service name to health-check; empty checks the whole server.
        #[arg(long, value_name = "SERVICE")]
        service: Option<String>,
    },
}

impl ProtocolCommand {
    /// The shared benchmark flags of this subcommand.
    pub fn bench(&self) -> &BenchArgs {
        match self {
            ProtocolCommand::Redis { bench, .. }
            | ProtocolCommand::Http { bench, .. }
            | ProtocolCommand::Kafka { bench, .. }
            | ProtocolCommand::Tcp { bench, .. }
            | ProtocolCommand::Udp { bench, .. }
            | ProtocolCommand::Websocket { bench, .. }
            | ProtocolCommand::Grpc { bench, .. } => bench,
        }
    }
}

/// Everything a run needs: the adapter, the workload and the factory.
pub struct RunPlan {
    /// The protocol adapter, connected by the runner.
    pub adapter: Arc<dyn ProtocolAdapter>,
    /// The effective workload after file + flag overlay.
    pub workload: WorkloadConfig,
    /// The operation factory matching the test case.
    pub factory: Arc<dyn OperationFactory>,
}

impl std::fmt::Debug for RunPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunPlan")
            .field("adapter", &"<dyn ProtocolAdapter>")
            .field("workload", &self.workload)
            .field("factory", &"<dyn OperationFactory>")
            .finish()
    }
}

/// Resolves the protocol document, applies flag overrides and builds the
/// adapter and factory for the selected protocol and test case.
pub fn build_plan(command: &ProtocolCommand) -> Result<RunPlan, Error> {
    let bench = command.bench();
    let document = match &bench.config {
        Some(path) => ProtocolDocument::from_yaml_file(path)?,
        None => ProtocolDocument::default(),
    };
    let mut workload = document.benchmark.clone();
    bench.overlay(&mut workload);
    workload.validate().map_err(Error::from)?;

    let (adapter, factory): (Arc<dyn ProtocolAdapter>, Arc<dyn OperationFactory>) = match command {
        ProtocolCommand::Redis {
            addr,
            username,
            password,
            db,
            ..
        } => {
            let mut config: RedisConfig = connection_config(&document.connection)?;
            if let Some(addr) = addr {
                config.addr = addr.clone();
            }
            if let Some(username) = username {
                config.username = Some(username.clone());
            }
            if let Some(password) = password {
                config.password = Some(password.clone());
            }
            if let Some(db) = db {
                config.db = *db;
            }
            let factory = redis_factory(&workload)?;
            (Arc::new(RedisAdapter::new(config)), factory)
        }
        ProtocolCommand::Http { url, .. } => {
            let mut config: HttpConfig = connection_config(&document.connection)?;
            if let Some(url) = url {
                config.url = url.clone();
            }
            let factory = http_factory(&workload)?;
            (Arc::new(HttpAdapter::new(config)), factory)
        }
        ProtocolCommand::Kafka {
            brokers,
            topic,
            acks,
            ..
        } => {
            let mut config: KafkaConfig = connection_config(&document.connection)?;
            if let Some(brokers) = brokers {
                config.brokers = brokers.clone();
            }
            if let Some(topic) = topic {
                config.topic = topic.clone();
            }
            if let Some(acks) = acks {
                config.acks = acks.clone();
            }
            let factory = fixed_case(&workload, &[("produce", "produce", false)])?;
            (Arc::new(KafkaAdapter::new(config)), factory)
        }
        ProtocolCommand::Tcp { addr, .. } => {
            let mut config: TcpConfig = connection_config(&document.connection)?;
            if let Some(addr) = addr {
                config.addr = addr.clone();
            }
            config.pool_size = config.pool_size.max(workload.parallels);
            let factory = fixed_case(
                &workload,
                &[("echo", "echo", false), ("send", "send", false)],
            )?;
            (Arc::new(TcpAdapter::new(config)), factory)
        }
        ProtocolCommand::Udp { addr, .. } => {
            let mut config: UdpConfig = connection_config(&document.connection)?;
            if let Some(addr) = addr {
                config.addr = addr.clone();
            }
            config.pool_size = config.pool_size.max(workload.parallels);
            let factory = fixed_case(
                &workload,
                &[("echo", "echo", false), ("packet_send", "packet_send", false)],
            )?;
            (Arc::new(UdpAdapter::new(config)), factory)
        }
        ProtocolCommand::Websocket { url, .. } => {
            let mut config: WebSocketConfig = connection_config(&document.connection)?;
            if let Some(url) = url {
                config.url = url.clone();
            }
            config.pool_size = config.pool_size.max(workload.parallels);
            let factory = fixed_case(
                &workload,
                &[("echo", "echo", false), ("message", "message", false)],
            )?;
            (Arc::new(WebSocketAdapter::new(config)), factory)
        }
        ProtocolCommand::Grpc {
            endpoint, service, ..
        } => {
            let mut config: GrpcConfig = connection_config(&document.connection)?;
            if let Some(endpoint) = endpoint {
                config.endpoint = endpoint.clone();
            }
            if let Some(service) = service {
                config.service = service.clone();
            }
            let factory = fixed_case(&workload, &[("health_check", "health_check", true)])?;
            (Arc::new(GrpcAdapter::new(config)), factory)
        }
    };

    Ok(RunPlan {
        adapter,
        workload,
        factory,
    })
}

/// The effective test case: the configured one, or the protocol default
/// (the first entry of its case table) when left at `default`.
fn effective_case<'a>(workload: &'a WorkloadConfig, fallback: &'a str) -> &'a str {
    if workload.test_case == "default" {
        fallback
    } else {
        workload.test_case.as_str()
    }
}

/// Builds a fixed-op factory from a `(case, op_type, is_read)` table.
fn fixed_case(
    workload: &WorkloadConfig,
    cases: &[(&str, &str, bool)],
) -> Result<Arc<dyn OperationFactory>, Error> {
    let case = effective_case(workload, cases[0].0);
    for (name, op_type, is_read) in cases {
        if case == *name {
            return Ok(Arc::new(FixedOpFactory::new(*op_type, *is_read, workload)));
        }
    }
    Err(Error::InvalidConfig {
        details: format!(
            "unknown test case `{case}`; expected one of: {}",
            cases
                .iter()
                .map(|(name, _, _)| *name)
                .collect::<Vec<_>>()
                .join(", ")
        ),
    })
}

fn redis_factory(workload: &WorkloadConfig) -> Result<Arc<dyn OperationFactory>, Error> {
    match effective_case(workload, "set_get") {
        "set_get" => Ok(Arc::new(ReadWriteMixFactory::new("set", "get", workload))),
        "set" => Ok(Arc::new(FixedOpFactory::new("set", false, workload))),
        "get" => Ok(Arc::new(FixedOpFactory::new("get", true, workload))),
        "incr" => Ok(Arc::new(FixedOpFactory::new("incr", false, workload))),
        "del" => Ok(Arc::new(FixedOpFactory::new("del", false, workload))),
        other => Err(Error::InvalidConfig {
            details: format!(
                "unknown test case `{other}`; expected one of: set_get, set, get, incr, del"
            ),
        }),
    }
}

fn http_factory(workload: &WorkloadConfig) -> Result<Arc<dyn OperationFactory>, Error> {
    match effective_case(workload, "get") {
        "get" => Ok(Arc::new(FixedOpFactory::new("get", true, workload))),
        "post" => Ok(Arc::new(FixedOpFactory::new("post", false, workload))),
        "mixed" => Ok(Arc::new(ReadWriteMixFactory::new("post", "get", workload))),
        other => Err(Error::InvalidConfig {
            details: format!("unknown test case `{other}`; expected one of: get, post, mixed"),
        }),
    }
}
