//! Command-line interface.
//!
//! Every flag is optional so values from `--config` survive unless
//! overridden. Built-in defaults come from [`GateConfig::default`].

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::schema::{parse_duration, DEFAULT_MAX_CONNECTIONS, DEFAULT_PORT};
use crate::config::validation::{
    connections_description, parse_connections, parse_port, port_description,
};
use crate::config::{read_config, ConfigError, GateConfig, LogFormat};

#[derive(Debug, Parser)]
#[command(name = "portgate")]
#[command(about = "Admission-controlled TCP gateway", long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    /// IP address or host name to listen on (default all interfaces)
    #[arg(long)]
    pub host: Option<String>,

    #[arg(long, value_parser = parse_port, help = port_description(DEFAULT_PORT))]
    pub port: Option<u16>,

    /// File with `user password` lines; enables authentication
    #[arg(long)]
    pub auth: Option<PathBuf>,

    /// IP address of the DNS server (default system resolver)
    #[arg(long)]
    pub dns: Option<String>,

    /// Idle timeout of connections, in seconds or e.g. `500ms` (default 15)
    #[arg(long = "ti", value_name = "DURATION", value_parser = parse_duration)]
    pub idle_timeout: Option<Duration>,

    /// Timeout of DNS lookups, in seconds or e.g. `500ms` (default 5)
    #[arg(long = "td", value_name = "DURATION", value_parser = parse_duration)]
    pub dns_timeout: Option<Duration>,

    /// TCP keep-alive time of upstream connections, in seconds or e.g. `1m` (default 30)
    #[arg(long = "tk", value_name = "DURATION", value_parser = parse_duration)]
    pub keepalive: Option<Duration>,

    /// Timeout of upstream connects, in seconds or e.g. `500ms` (default 5)
    #[arg(long = "tc", value_name = "DURATION", value_parser = parse_duration)]
    pub connect_timeout: Option<Duration>,

    #[arg(
        long,
        value_parser = parse_connections,
        help = connections_description(DEFAULT_MAX_CONNECTIONS)
    )]
    pub connections: Option<usize>,

    /// Upstream `host:port` every connection is relayed to
    #[arg(long)]
    pub upstream: Option<String>,

    /// How long to wait for connections on shutdown before closing them
    #[arg(long, value_name = "DURATION", value_parser = parse_duration)]
    pub drain_timeout: Option<Duration>,

    /// TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    /// Log output format
    #[arg(long, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Serve Prometheus metrics on this address
    #[arg(long)]
    pub metrics_address: Option<String>,

    /// Print version and exit
    #[arg(long)]
    pub version: bool,
}

impl Cli {
    /// Read `--config` (or start from defaults), apply flags, validate.
    pub fn load_config(&self) -> Result<GateConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => read_config(path)?,
            None => GateConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut GateConfig) {
        if let Some(host) = &self.host {
            config.listener.host = host.clone();
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        if let Some(connections) = self.connections {
            config.listener.max_connections = connections;
        }
        if let Some(limit) = self.drain_timeout {
            config.listener.drain_timeout = Some(limit);
        }

        if let Some(timeout) = self.idle_timeout {
            config.timeouts.idle = timeout;
        }
        if let Some(timeout) = self.dns_timeout {
            config.timeouts.dns = timeout;
        }
        if let Some(keepalive) = self.keepalive {
            config.timeouts.keepalive = keepalive;
        }
        if let Some(timeout) = self.connect_timeout {
            config.timeouts.connect = timeout;
        }

        if let Some(path) = &self.auth {
            config.auth.file = Some(path.clone());
        }
        if let Some(dns) = &self.dns {
            config.dns.server = Some(dns.clone());
        }
        if let Some(upstream) = &self.upstream {
            config.upstream.address = Some(upstream.clone());
        }

        if self.debug {
            config.observability.debug = true;
        }
        if let Some(format) = self.log_format {
            config.observability.log_format = format;
        }
        if let Some(addr) = &self.metrics_address {
            config.observability.metrics_enabled = true;
            config.observability.metrics_address = addr.clone();
        }
    }
}
