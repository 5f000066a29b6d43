//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (permit acquired before accept)
//!     → connection.rs (registered for drain tracking)
//!     → idle.rs (read/write deadlines refreshed on progress)
//!     → Hand off to the connection handler
//!
//! Outbound:
//!     dialer.rs (resolve → connect with timeout → keep-alive → idle.rs)
//! ```
//!
//! # Design Decisions
//! - Admission is bounded by a permit pool, not by an accept queue
//! - Each connection tracked for graceful shutdown
//! - Idle timeouts are surfaced as `TimedOut` I/O errors

pub mod connection;
pub mod dialer;
pub mod idle;
pub mod listener;

pub use dialer::{DialError, Dialer, DialerConfig, OutboundConnection};
pub use idle::IdleTimeoutStream;
