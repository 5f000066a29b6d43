//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, optional)
//!     → loader.rs (parse & deserialize)
//!     → command-line overrides (cli.rs)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{read_config, ConfigError};
pub use schema::{
    AuthConfig, DnsConfig, GateConfig, ListenerConfig, LogFormat, ObservabilityConfig,
    TimeoutConfig, UpstreamConfig,
};
pub use validation::ValidationError;
