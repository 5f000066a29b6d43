//! Configuration validation.
//!
//! Serde handles syntax; this module checks value ranges and references to
//! the filesystem. Every problem is reported, not just the first.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use thiserror::Error;

use crate::config::schema::GateConfig;

pub const MIN_PORT: u16 = 1;
pub const MAX_PORT: u16 = 65535;
pub const MIN_CONNECTIONS: usize = 1;
pub const MAX_CONNECTIONS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("port {0} is out of range [{min}, {max}]", min = MIN_PORT, max = MAX_PORT)]
    PortOutOfRange(u16),
    #[error(
        "max connections {0} is out of range [{min}, {max}]",
        min = MIN_CONNECTIONS,
        max = MAX_CONNECTIONS
    )]
    ConnectionsOutOfRange(usize),
    #[error("auth file {path}: {reason}")]
    AuthFile { path: PathBuf, reason: String },
    #[error("DNS host {0:?} is not an IP address")]
    DnsHost(String),
    #[error("upstream address is required")]
    MissingUpstream,
    #[error("upstream address {0:?} is not host:port")]
    Upstream(String),
    #[error("metrics address {0:?} is not a socket address")]
    MetricsAddress(String),
}

/// Validate a complete configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.port < MIN_PORT {
        errors.push(ValidationError::PortOutOfRange(config.listener.port));
    }
    if let Err(e) = check_connections(config.listener.max_connections) {
        errors.push(e);
    }

    if let Some(path) = &config.auth.file {
        match std::fs::metadata(path) {
            Ok(meta) if meta.is_dir() => errors.push(ValidationError::AuthFile {
                path: path.clone(),
                reason: "it is a directory".to_string(),
            }),
            Ok(_) => {}
            Err(e) => errors.push(ValidationError::AuthFile {
                path: path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    if let Some(host) = config.dns.server.as_deref().map(str::trim) {
        if !host.is_empty() && host.parse::<IpAddr>().is_err() {
            errors.push(ValidationError::DnsHost(host.to_string()));
        }
    }

    match config.upstream.address.as_deref() {
        None | Some("") => errors.push(ValidationError::MissingUpstream),
        Some(addr) => {
            let valid = addr
                .rsplit_once(':')
                .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
            if !valid {
                errors.push(ValidationError::Upstream(addr.to_string()));
            }
        }
    }

    let metrics_address = &config.observability.metrics_address;
    if config.observability.metrics_enabled && metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::MetricsAddress(metrics_address.clone()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_connections(value: usize) -> Result<usize, ValidationError> {
    if (MIN_CONNECTIONS..=MAX_CONNECTIONS).contains(&value) {
        Ok(value)
    } else {
        Err(ValidationError::ConnectionsOutOfRange(value))
    }
}

/// Command-line parser for a listen port.
pub fn parse_port(value: &str) -> Result<u16, String> {
    let port: u64 = value.parse().map_err(|e| format!("{e}"))?;
    if port < MIN_PORT as u64 || port > MAX_PORT as u64 {
        return Err("port is out of range".to_string());
    }
    Ok(port as u16)
}

/// Command-line parser for the connection limit.
pub fn parse_connections(value: &str) -> Result<usize, String> {
    let connections: usize = value.parse().map_err(|e| format!("{e}"))?;
    check_connections(connections).map_err(|_| "value is out of range".to_string())
}

pub fn port_description(default: u16) -> String {
    format!(
        "TCP port number to listen on in range [{MIN_PORT}, {MAX_PORT}] (default {default})"
    )
}

pub fn connections_description(default: usize) -> String {
    format!(
        "number of concurrent connections in range [{MIN_CONNECTIONS}, {MAX_CONNECTIONS}] (default {default})"
    )
}
