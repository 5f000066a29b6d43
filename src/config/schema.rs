//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::auth::credentials::default_allowed_roots;

pub const DEFAULT_PORT: u16 = 1080;
pub const DEFAULT_MAX_CONNECTIONS: usize = 1024;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, admission limit).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Client credential file.
    pub auth: AuthConfig,

    /// Name resolution settings.
    pub dns: DnsConfig,

    /// Where accepted connections are forwarded.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ListenerConfig {
    /// Host to bind; empty binds every interface.
    pub host: String,

    /// TCP port to listen on.
    pub port: u16,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,

    /// Upper bound on shutdown drain; unset waits for every connection.
    #[serde(alias = "drain_timeout_secs", with = "duration::option")]
    pub drain_timeout: Option<Duration>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: DEFAULT_PORT,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            drain_timeout: None,
        }
    }
}

impl ListenerConfig {
    /// `host:port` to bind, bracketing IPv6 hosts.
    pub fn bind_address(&self) -> String {
        let host = self.host.trim();
        if host.is_empty() {
            format!("0.0.0.0:{}", self.port)
        } else if host.contains(':') && !host.starts_with('[') {
            format!("[{}]:{}", host, self.port)
        } else {
            format!("{}:{}", host, self.port)
        }
    }

    pub fn drain_timeout(&self) -> Option<Duration> {
        self.drain_timeout
    }
}

/// Timeout configuration for various operations.
///
/// Values are integer seconds (`15`) or human-readable durations
/// (`"500ms"`, `"1m 30s"`).
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Idle timeout of inbound connections.
    #[serde(alias = "idle_secs", with = "duration")]
    pub idle: Duration,

    /// Idle timeout of upstream connections; defaults to `idle`.
    #[serde(alias = "upstream_idle_secs", with = "duration::option")]
    pub upstream_idle: Option<Duration>,

    /// Connection establishment timeout.
    #[serde(alias = "connect_secs", with = "duration")]
    pub connect: Duration,

    /// TCP keep-alive time for upstream connections.
    #[serde(alias = "keepalive_secs", with = "duration")]
    pub keepalive: Duration,

    /// DNS lookup timeout.
    #[serde(alias = "dns_secs", with = "duration")]
    pub dns: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            idle: Duration::from_secs(15),
            upstream_idle: None,
            connect: Duration::from_secs(5),
            keepalive: Duration::from_secs(30),
            dns: Duration::from_secs(5),
        }
    }
}

impl TimeoutConfig {
    pub fn idle(&self) -> Duration {
        self.idle
    }

    pub fn upstream_idle(&self) -> Duration {
        self.upstream_idle.unwrap_or(self.idle)
    }

    pub fn connect(&self) -> Duration {
        self.connect
    }

    pub fn keepalive(&self) -> Duration {
        self.keepalive
    }

    pub fn dns(&self) -> Duration {
        self.dns
    }
}

/// Parse a duration flag or config value: bare integers are seconds,
/// anything else goes through [`humantime`].
pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(value).map_err(|e| format!("invalid duration {value:?}: {e}"))
}

/// Serde adapters for durations written as seconds or humantime strings.
mod duration {
    use std::time::Duration;

    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Secs(u64),
        Text(String),
    }

    impl Raw {
        fn into_duration<E: de::Error>(self) -> Result<Duration, E> {
            match self {
                Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
                Raw::Text(text) => super::parse_duration(&text).map_err(E::custom),
            }
        }
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&humantime::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Raw::deserialize(deserializer)?.into_duration()
    }

    pub mod option {
        use super::*;

        pub fn serialize<S: Serializer>(
            value: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => super::serialize(value, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<Raw>::deserialize(deserializer)?
                .map(Raw::into_duration)
                .transpose()
        }
    }
}

/// Credential file settings.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AuthConfig {
    /// Path to the `user password` file; unset disables authentication.
    pub file: Option<PathBuf>,

    /// Directories the auth file must live under.
    pub allowed_roots: Vec<PathBuf>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            file: None,
            allowed_roots: default_allowed_roots(),
        }
    }
}

/// Name resolution settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct DnsConfig {
    /// Literal IP of a DNS server; unset uses the system resolver.
    pub server: Option<String>,
}

/// Forwarding target of the built-in handler.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Upstream `host:port`.
    pub address: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Debug-level logging for this crate.
    pub debug: bool,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            debug: false,
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_cli_defaults() {
        let config = GateConfig::default();
        assert_eq!(config.listener.port, 1080);
        assert_eq!(config.listener.max_connections, 1024);
        assert_eq!(config.timeouts.idle(), Duration::from_secs(15));
        assert_eq!(config.timeouts.upstream_idle(), Duration::from_secs(15));
        assert_eq!(config.timeouts.keepalive(), Duration::from_secs(30));
        assert!(config.auth.file.is_none());
        assert!(config.listener.drain_timeout().is_none());
    }

    #[test]
    fn bind_address_formats_hosts() {
        let mut listener = ListenerConfig::default();
        assert_eq!(listener.bind_address(), "0.0.0.0:1080");

        listener.host = "localhost".into();
        listener.port = 8080;
        assert_eq!(listener.bind_address(), "localhost:8080");

        listener.host = "::1".into();
        assert_eq!(listener.bind_address(), "[::1]:8080");
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: GateConfig = toml::from_str(
            r#"
            [listener]
            port = 2080

            [timeouts]
            upstream_idle_secs = 60

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.port, 2080);
        assert_eq!(config.listener.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.timeouts.idle(), Duration::from_secs(15));
        assert_eq!(config.timeouts.upstream_idle(), Duration::from_secs(60));
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn timeouts_accept_sub_second_values() {
        let config: GateConfig = toml::from_str(
            r#"
            [listener]
            drain_timeout = "750ms"

            [timeouts]
            idle = "500ms"
            connect = 2
            dns = "1s 250ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.listener.drain_timeout(), Some(Duration::from_millis(750)));
        assert_eq!(config.timeouts.idle(), Duration::from_millis(500));
        assert_eq!(config.timeouts.upstream_idle(), Duration::from_millis(500));
        assert_eq!(config.timeouts.connect(), Duration::from_secs(2));
        assert_eq!(config.timeouts.dns(), Duration::from_millis(1250));

        let err = toml::from_str::<GateConfig>("[timeouts]\nidle = \"soon\"\n").unwrap_err();
        assert!(err.to_string().contains("invalid duration"), "{err}");
    }

    #[test]
    fn parse_duration_takes_seconds_or_units() {
        assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("250ms"), Ok(Duration::from_millis(250)));
        assert_eq!(parse_duration("0"), Ok(Duration::ZERO));
        assert!(parse_duration("-1").is_err());
        assert!(parse_duration("").is_err());
    }
}
