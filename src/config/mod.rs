//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! optional config file (TOML, named by GATEWAY_CONFIG)
//!     → loader.rs (parse & deserialize)
//!     → environment overlay (PORT, *_SERVICE_URL, JWT_SECRET, ...)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; routes are built from it exactly once
//! - All tunables have defaults; deployment values come from the environment
//! - Any error here is fatal before a listener is bound

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_with, ConfigError};
pub use schema::{
    AuthConfig, CorsConfig, GatewayConfig, ListenerConfig, ObservabilityConfig, PolicyConfig,
    RateLimitConfig, ShutdownConfig, TimeoutConfig, UpstreamsConfig,
};
pub use validation::{validate_config, ValidationError};
