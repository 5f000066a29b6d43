//! Client credential store.
//!
//! Loaded once at startup and handed to the protocol handler. Protocol-level
//! authentication itself belongs to the handler.

pub mod credentials;

pub use credentials::{AuthError, Credentials};
