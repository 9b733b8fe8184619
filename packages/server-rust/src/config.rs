//! Command-line and environment configuration for the sidecar process.

use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::telemetry::LogFormat;

/// Protocol spoken by the local application for relayed events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ServiceProtocol {
    #[default]
    Http,
    Rpc,
    Grpc,
}

impl ServiceProtocol {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Rpc => "rpc",
            Self::Grpc => "grpc",
        }
    }
}

/// Every setting accepts a flag or the environment variable of the same name.
#[derive(Debug, Clone, Parser)]
#[command(name = "sidecar", about = "Pub/sub, state, and secrets sidecar")]
pub struct SidecarArgs {
    #[arg(long, env = "NAMESPACE", default_value = "default")]
    pub namespace: String,

    #[arg(long, env = "NAME", default_value = "sidecar")]
    pub name: String,

    #[arg(long, env = "VERSION", default_value = "v0.1.0")]
    pub version: String,

    #[arg(long, env = "HTTP_ADDRESS", default_value = ":3501")]
    pub http_address: String,

    #[arg(long, env = "RPC_ADDRESS", default_value = ":3502")]
    pub rpc_address: String,

    #[arg(long, env = "GRPC_ADDRESS", default_value = ":3503")]
    pub grpc_address: String,

    /// Host of the local application.
    #[arg(long, env = "SERVICE_NAME", default_value = "localhost")]
    pub service_name: String,

    #[arg(long, env = "SERVICE_PORT", default_value_t = 3000)]
    pub service_port: u16,

    #[arg(long, env = "SERVICE_PROTOCOL", value_enum, default_value_t = ServiceProtocol::Http)]
    pub service_protocol: ServiceProtocol,

    /// Store backend kind (`memory`, `cockroach`, `postgres`). Empty disables stores.
    #[arg(long, env = "STORE", default_value = "")]
    pub store: String,

    #[arg(long, env = "STORE_ADDRESS", default_value = "")]
    pub store_address: String,

    #[arg(long, env = "DB", default_value = "")]
    pub db: String,

    /// Comma-separated store ids.
    #[arg(long, env = "STORES", default_value = "")]
    pub stores: String,

    /// Broker backend kind (`memory`). Empty disables pub/sub.
    #[arg(long, env = "BROKER", default_value = "")]
    pub broker: String,

    #[arg(long, env = "BROKER_ADDRESS", default_value = "")]
    pub broker_address: String,

    /// Comma-separated topics the application publishes to.
    #[arg(long, env = "PRODUCERS", default_value = "")]
    pub producers: String,

    /// Comma-separated consumer groups relayed to the application.
    #[arg(long, env = "CONSUMERS", default_value = "")]
    pub consumers: String,

    /// Secret backend kind (`env`). Empty disables secrets.
    #[arg(long, env = "SECRET", default_value = "")]
    pub secret: String,

    #[arg(long, env = "SECRET_ADDRESS", default_value = "")]
    pub secret_address: String,

    #[arg(long, env = "SECRET_PREFIX", default_value = "")]
    pub secret_prefix: String,

    /// Explicit relay routes as `eventName=target` pairs, comma separated.
    #[arg(long, env = "ROUTES", default_value = "")]
    pub routes: String,

    /// Service name used to derive RPC relay methods.
    #[arg(long, env = "RELAY_SERVICE")]
    pub relay_service: Option<String>,

    #[arg(long, env = "RELAY_TIMEOUT_MS", default_value_t = 5000)]
    pub relay_timeout_ms: u64,

    #[arg(long, env = "TRACE_BUFFER", default_value_t = 1024)]
    pub trace_buffer: usize,

    #[arg(long, env = "SHUTDOWN_TIMEOUT_SECS", default_value_t = 30)]
    pub shutdown_timeout_secs: u64,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,
}

impl SidecarArgs {
    /// `namespace.name:version`, attached to every log line.
    #[must_use]
    pub fn prefix(&self) -> String {
        format!("{}.{}:{}", self.namespace, self.name, self.version)
    }

    #[must_use]
    pub fn store_ids(&self) -> Vec<String> {
        split_list(&self.stores)
    }

    #[must_use]
    pub fn producer_topics(&self) -> Vec<String> {
        split_list(&self.producers)
    }

    #[must_use]
    pub fn consumer_groups(&self) -> Vec<String> {
        split_list(&self.consumers)
    }

    #[must_use]
    pub fn relay_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_timeout_ms)
    }

    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Splits a comma-separated list, trimming items and dropping empty ones.
#[must_use]
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Turns `:port` into `0.0.0.0:port`; anything else is returned unchanged.
#[must_use]
pub fn bind_address(addr: &str) -> String {
    if addr.starts_with(':') {
        format!("0.0.0.0{addr}")
    } else {
        addr.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> SidecarArgs {
        let mut argv = vec!["sidecar"];
        argv.extend_from_slice(args);
        SidecarArgs::try_parse_from(argv).unwrap()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]);
        assert_eq!(args.http_address, ":3501");
        assert_eq!(args.rpc_address, ":3502");
        assert_eq!(args.grpc_address, ":3503");
        assert_eq!(args.service_port, 3000);
        assert_eq!(args.service_protocol, ServiceProtocol::Http);
        assert_eq!(args.relay_timeout(), Duration::from_secs(5));
        assert_eq!(args.shutdown_timeout(), Duration::from_secs(30));
        assert_eq!(args.trace_buffer, 1024);
        assert!(args.relay_service.is_none());
        assert!(args.store_ids().is_empty());
    }

    #[test]
    fn lists_skip_empty_items() {
        let args = parse(&["--stores", "s1,, s2 ,", "--consumers", "orders"]);
        assert_eq!(args.store_ids(), vec!["s1", "s2"]);
        assert_eq!(args.consumer_groups(), vec!["orders"]);
    }

    #[test]
    fn protocol_and_format_parse() {
        let args = parse(&["--service-protocol", "grpc", "--log-format", "json"]);
        assert_eq!(args.service_protocol, ServiceProtocol::Grpc);
        assert_eq!(args.log_format, LogFormat::Json);
    }

    #[test]
    fn unknown_protocol_rejected() {
        assert!(SidecarArgs::try_parse_from(["sidecar", "--service-protocol", "smtp"]).is_err());
    }

    #[test]
    fn prefix_format() {
        let args = parse(&["--namespace", "prod", "--name", "orders", "--version", "v2"]);
        assert_eq!(args.prefix(), "prod.orders:v2");
    }

    #[test]
    fn bind_address_expands_bare_port() {
        assert_eq!(bind_address(":3501"), "0.0.0.0:3501");
        assert_eq!(bind_address("127.0.0.1:0"), "127.0.0.1:0");
    }
}
