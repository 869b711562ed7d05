//! Edge API gateway.
//!
//! ```text
//!     Client ──▶ request id ─▶ CORS / security headers ─▶ access log
//!                                                            │
//!                                                            ▼
//!                     RouteTable ─▶ rate limit ─▶ auth ─▶ forward ──▶ auth / templates / pdf
//!                                                            │
//!                                                            └──▶ healthcheck, logout (local)
//! ```

use std::net::SocketAddr;
use std::process::ExitCode;

use edge_gateway::{
    config::{self, schema::is_production_env},
    lifecycle::wait_for_signal,
    observability::{init_logging, metrics},
    StopOutcome,
};

#[tokio::main]
async fn main() -> ExitCode {
    let env = std::env::var(config::loader::ENV_KEY).unwrap_or_default();
    init_logging(is_production_env(&env));

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "edge-gateway starting");

    let config = match config::load_config() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "Failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(
        env = %config.env,
        bind_address = %config.listener.bind_address,
        auth = %config.upstreams.auth,
        templates = %config.upstreams.templates,
        pdf = %config.upstreams.pdf,
        rate_limit = config.rate_limit.enabled,
        "Configuration loaded"
    );

    if let Some(address) = &config.observability.metrics_address {
        match address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(e) = metrics::init_metrics(addr) {
                    tracing::error!(error = %e, "Failed to start metrics exporter");
                }
            }
            Err(e) => {
                tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address")
            }
        }
    }

    match edge_gateway::run(config, wait_for_signal()).await {
        Ok(StopOutcome::Clean) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Ok(StopOutcome::Forced) => {
            tracing::warn!("Shutdown forced after grace period");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
