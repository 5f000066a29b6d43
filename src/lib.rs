//! Admission-controlled TCP gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ net::listener ──▶ server::worker ──▶ ConnectionHandler ──▶ net::dialer ──▶ Upstream
//!                (permit pool)     (idle deadline,    (ForwardHandler)      (resolve via dns,
//!                                   drain tracking)                          connect timeout)
//!
//!     lifecycle: signals → Shutdown → stop accepting → drain → exit
//!                Readiness settles once the bind succeeds or fails
//! ```

// Core subsystems
pub mod config;
pub mod net;
pub mod server;

// Supporting services
pub mod auth;
pub mod dns;

// Cross-cutting concerns
pub mod cli;
pub mod lifecycle;
pub mod observability;
pub mod version;

pub use config::schema::GateConfig;
pub use lifecycle::{Readiness, ReadyState, Shutdown};
pub use server::{ConnectionHandler, ForwardHandler, HandlerError, Params, Server, ServerError};
