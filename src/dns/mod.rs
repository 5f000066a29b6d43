//! Name resolution subsystem.
//!
//! # Data Flow
//! ```text
//! Dialer gets "host:port"
//!     → resolver.rs (literal IP? use it)
//!     → system resolver, or
//!     → hickory resolver pinned to the configured server on port 53
//!       (hosts file first, UDP with TCP retry on truncation)
//! ```
//!
//! # Design Decisions
//! - Custom DNS host must be a literal IP, checked at startup
//! - Every lookup is bounded by the DNS timeout
//! - A then AAAA; the first address wins

pub mod resolver;

pub use resolver::{NameResolver, ResolveError};
