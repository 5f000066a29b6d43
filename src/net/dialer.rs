//! Outbound connections for protocol handlers.
//!
//! # Responsibilities
//! - Resolve the target host through the configured resolver
//! - Bound the connect attempt by the connect timeout
//! - Enable TCP keep-alive
//! - Wrap the result with the outbound idle timeout
//!
//! No retries: the caller owns retry policy.

use std::net::SocketAddr;
use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use thiserror::Error;
use tokio::net::TcpStream;

use crate::dns::{NameResolver, ResolveError};
use crate::net::idle::IdleTimeoutStream;
use crate::observability::metrics;

/// Connection produced by [`Dialer::dial`].
pub type OutboundConnection = IdleTimeoutStream<TcpStream>;

#[derive(Debug, Error)]
pub enum DialError {
    #[error("unsupported network {0:?}")]
    UnsupportedNetwork(String),
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error("failed to dial {addr}: {source}")]
    Resolve {
        addr: String,
        #[source]
        source: ResolveError,
    },
    #[error("failed to dial {addr}: no suitable address for network {network}")]
    NoAddress { addr: String, network: String },
    #[error("failed to dial {addr}: connect timed out after {timeout:?}")]
    Timeout { addr: String, timeout: Duration },
    #[error("failed to dial {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}

/// Timeouts applied to every outbound connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DialerConfig {
    /// Bound on the TCP handshake. Zero disables it.
    pub connect_timeout: Duration,
    /// Keep-alive idle time. Zero leaves keep-alive off.
    pub keepalive: Duration,
    /// Idle timeout of the returned connection.
    pub idle_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Dialer {
    config: DialerConfig,
    resolver: NameResolver,
}

impl Dialer {
    pub fn new(config: DialerConfig, resolver: NameResolver) -> Self {
        Self { config, resolver }
    }

    pub fn config(&self) -> &DialerConfig {
        &self.config
    }

    /// Connect to `addr` (`host:port`) over `network` (`tcp`, `tcp4` or `tcp6`).
    pub async fn dial(&self, network: &str, addr: &str) -> Result<OutboundConnection, DialError> {
        let result = self.connect(network, addr).await;
        metrics::record_dial(result.is_ok());
        let stream = result?;

        if !self.config.keepalive.is_zero() {
            let keepalive = TcpKeepalive::new()
                .with_time(self.config.keepalive)
                .with_interval(self.config.keepalive);
            if let Err(e) = SockRef::from(&stream).set_tcp_keepalive(&keepalive) {
                tracing::debug!(addr, error = %e, "TCP keepalive setup failed");
            }
        }

        tracing::debug!(network, addr, "dialed upstream");
        Ok(IdleTimeoutStream::from_tcp(stream, self.config.idle_timeout))
    }

    async fn connect(&self, network: &str, addr: &str) -> Result<TcpStream, DialError> {
        let family = match network {
            "tcp" => None,
            "tcp4" => Some(true),
            "tcp6" => Some(false),
            other => return Err(DialError::UnsupportedNetwork(other.to_string())),
        };

        let (host, port) = split_host_port(addr)?;
        let ip = self
            .resolver
            .resolve(host)
            .await
            .map_err(|source| DialError::Resolve {
                addr: addr.to_string(),
                source,
            })?
            .filter(|ip| family.map_or(true, |v4| ip.is_ipv4() == v4))
            .ok_or_else(|| DialError::NoAddress {
                addr: addr.to_string(),
                network: network.to_string(),
            })?;

        let target = SocketAddr::new(ip, port);
        let connect = TcpStream::connect(target);
        let timeout = self.config.connect_timeout;
        let connected = if timeout.is_zero() {
            connect.await
        } else {
            tokio::time::timeout(timeout, connect)
                .await
                .map_err(|_| DialError::Timeout {
                    addr: addr.to_string(),
                    timeout,
                })?
        };
        connected.map_err(|source| DialError::Connect {
            addr: addr.to_string(),
            source,
        })
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts.
fn split_host_port(addr: &str) -> Result<(&str, u16), DialError> {
    let invalid = || DialError::InvalidAddress(addr.to_string());
    let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
    let port: u16 = port.parse().map_err(|_| invalid())?;
    let host = match host.strip_prefix('[') {
        Some(rest) => rest.strip_suffix(']').ok_or_else(invalid)?,
        None if host.contains(':') => return Err(invalid()),
        None => host,
    };
    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host, port))
}

impl From<&crate::config::GateConfig> for DialerConfig {
    fn from(config: &crate::config::GateConfig) -> Self {
        Self {
            connect_timeout: config.timeouts.connect(),
            keepalive: config.timeouts.keepalive(),
            idle_timeout: config.timeouts.upstream_idle(),
        }
    }
}
