//! Edge API gateway library.
//!
//! Fronts the auth, templates and pdf services: every request is routed,
//! rate limited, authenticated where required, and relayed to its upstream.

pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod proxy;
pub mod routing;
pub mod security;

use std::future::Future;

pub use config::GatewayConfig;
pub use error::GatewayError;
pub use http::GatewayServer;
pub use lifecycle::{Lifecycle, Shutdown, StopOutcome};

/// Build the gateway from `config` and serve until `stop` resolves.
///
/// Routes and upstreams are validated before the listener is bound, so a
/// misconfigured gateway never accepts a connection.
pub async fn run<F>(config: GatewayConfig, stop: F) -> Result<StopOutcome, GatewayError>
where
    F: Future<Output = ()>,
{
    let server = GatewayServer::from_config(&config)?;
    let lifecycle = Lifecycle::new(config.shutdown.grace_period());
    Ok(lifecycle
        .run(&config.listener.bind_address, server, stop)
        .await?)
}
