//! Top-level error type for running the gateway.

use thiserror::Error;

use crate::config::ConfigError;
use crate::http::BuildError;
use crate::lifecycle::LifecycleError;

/// Any failure that stops the gateway from serving.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("startup error: {0}")]
    Build(#[from] BuildError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}
