//! Host name resolution for outbound dials.

use std::fmt;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use hickory_resolver::config::{
    LookupIpStrategy, NameServerConfigGroup, ResolverConfig, ResolverOpts,
};
use hickory_resolver::error::{ResolveError as LookupError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use thiserror::Error;

/// Port queried on a custom DNS server.
pub const DNS_PORT: u16 = 53;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("DNS host is not an IP address: {0:?}")]
    HostNotIp(String),
    #[error("lookup of {name} failed: {source}")]
    Lookup {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("lookup of {name} failed: {source}")]
    Dns {
        name: String,
        #[source]
        source: LookupError,
    },
    #[error("lookup of {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },
    #[error("no such host: {0}")]
    NotFound(String),
}

/// Resolves host names to a single IP address.
#[derive(Clone)]
pub enum NameResolver {
    /// The operating system resolver.
    System { timeout: Duration },
    /// A specific DNS server. Truncated UDP answers are retried over TCP and
    /// the hosts file is consulted first.
    Custom {
        server: SocketAddr,
        timeout: Duration,
        resolver: TokioAsyncResolver,
    },
}

impl fmt::Debug for NameResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::System { timeout } => f.debug_struct("System").field("timeout", timeout).finish(),
            Self::Custom { server, timeout, .. } => f
                .debug_struct("Custom")
                .field("server", server)
                .field("timeout", timeout)
                .finish(),
        }
    }
}

impl NameResolver {
    /// Build a resolver from the configured DNS host.
    ///
    /// An empty host selects the system resolver. Anything else must be a
    /// literal IP address; it is queried on port 53.
    pub fn new(dns_host: Option<&str>, timeout: Duration) -> Result<Self, ResolveError> {
        let host = match dns_host.map(str::trim) {
            None | Some("") => {
                tracing::info!("use default DNS name resolver");
                return Ok(Self::System { timeout });
            }
            Some(host) => host,
        };

        let ip: IpAddr = host
            .parse()
            .map_err(|_| ResolveError::HostNotIp(host.to_string()))?;
        let server = SocketAddr::new(ip, DNS_PORT);
        tracing::info!(%server, "using DNS server");
        Ok(Self::custom(server, timeout))
    }

    /// Query `server` directly, over UDP with TCP fallback.
    pub fn custom(server: SocketAddr, timeout: Duration) -> Self {
        let name_servers = NameServerConfigGroup::from_ips_clear(&[server.ip()], server.port(), true);
        let config = ResolverConfig::from_parts(None, vec![], name_servers);

        let mut opts = ResolverOpts::default();
        opts.ip_strategy = LookupIpStrategy::Ipv4thenIpv6;
        opts.attempts = 1;
        if !timeout.is_zero() {
            opts.timeout = timeout;
        }

        Self::Custom {
            server,
            timeout,
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Self::System { timeout } | Self::Custom { timeout, .. } => *timeout,
        }
    }

    /// Resolve `name`, returning the first address found.
    ///
    /// `Ok(None)` means the name exists but has no address records.
    pub async fn resolve(&self, name: &str) -> Result<Option<IpAddr>, ResolveError> {
        if let Ok(ip) = name.trim_start_matches('[').trim_end_matches(']').parse::<IpAddr>() {
            return Ok(Some(ip));
        }

        let timeout = self.timeout();
        let lookup = async {
            match self {
                Self::System { .. } => lookup_system(name).await,
                Self::Custom { server, resolver, .. } => {
                    tracing::debug!(%server, name, "querying DNS server");
                    lookup_custom(resolver, name).await
                }
            }
        };

        if timeout.is_zero() {
            return lookup.await;
        }
        tokio::time::timeout(timeout, lookup)
            .await
            .map_err(|_| ResolveError::Timeout {
                name: name.to_string(),
                timeout,
            })?
    }
}

async fn lookup_system(name: &str) -> Result<Option<IpAddr>, ResolveError> {
    let mut addrs = tokio::net::lookup_host((name, 0))
        .await
        .map_err(|source| ResolveError::Lookup {
            name: name.to_string(),
            source,
        })?;
    Ok(addrs.next().map(|addr| addr.ip()))
}

async fn lookup_custom(
    resolver: &TokioAsyncResolver,
    name: &str,
) -> Result<Option<IpAddr>, ResolveError> {
    let error = match resolver.lookup_ip(name).await {
        Ok(found) => return Ok(found.iter().next()),
        Err(e) => e,
    };

    if let ResolveErrorKind::NoRecordsFound { response_code, .. } = error.kind() {
        return if *response_code == ResponseCode::NXDomain {
            Err(ResolveError::NotFound(name.to_string()))
        } else {
            Ok(None)
        };
    }
    Err(ResolveError::Dns {
        name: name.to_string(),
        source: error,
    })
}
