//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - The subscriber is installed once by the binary; components only emit
//! - Connection IDs flow through the per-connection span
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
