//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind listener → settle Readiness (listening or failed)
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/SIGQUIT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Readiness always settles, even when binding fails
//! - Ordered shutdown: stop accept, confirm loop exit, drain, return
//! - Drain deadline is optional; by default every connection finishes

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::TerminationSignals;
pub use startup::{ReadyState, Readiness};
