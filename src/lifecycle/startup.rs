//! Startup and shutdown orchestration.
//!
//! # Responsibilities
//! - Bind the listener and begin accepting traffic
//! - Start background tasks (bucket sweeper)
//! - On the stop signal: stop accepting, drain, then force if the grace
//!   period runs out
//! - Publish the current phase on a watch channel
//!
//! # Design Decisions
//! - Fail fast: a bind error is returned before any traffic is served
//! - Forced shutdown is explicit: the abort handle cancels in-flight
//!   upstream requests so they resolve to 503 instead of hanging

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;

use crate::config::schema::MAX_GRACE_PERIOD_SECS;
use crate::http::GatewayServer;
use crate::lifecycle::Shutdown;

/// How long cancelled requests get to flush their 503 after a forced stop.
const ABORT_FLUSH: Duration = Duration::from_secs(1);

/// Lifecycle phase, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Listening,
    ShuttingDown,
    Stopped,
}

/// How the server came to a stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Every in-flight request finished within the grace period.
    Clean,
    /// The grace period elapsed and in-flight work was cancelled.
    Forced,
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] io::Error),
}

/// Drives one gateway instance from bind to stop.
#[derive(Debug)]
pub struct Lifecycle {
    phase: watch::Sender<Phase>,
    grace: Duration,
}

impl Lifecycle {
    /// `grace` is clamped to the hard upper bound.
    pub fn new(grace: Duration) -> Self {
        let (phase, _) = watch::channel(Phase::Starting);
        Self {
            phase,
            grace: grace.min(Duration::from_secs(MAX_GRACE_PERIOD_SECS)),
        }
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Observe phase transitions.
    pub fn subscribe(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    pub fn grace_period(&self) -> Duration {
        self.grace
    }

    fn enter(&self, phase: Phase) {
        self.phase.send_replace(phase);
        tracing::debug!(phase = ?phase, "Lifecycle phase changed");
    }

    /// Bind the listener on `address`.
    pub async fn bind(&self, address: &str) -> Result<TcpListener, LifecycleError> {
        TcpListener::bind(address).await.map_err(|source| {
            tracing::error!(address, error = %source, "Failed to bind listener");
            self.enter(Phase::Stopped);
            LifecycleError::Bind {
                address: address.to_string(),
                source,
            }
        })
    }

    /// Bind `address` and serve until `stop` resolves.
    pub async fn run<F>(
        &self,
        address: &str,
        server: GatewayServer,
        stop: F,
    ) -> Result<StopOutcome, LifecycleError>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind(address).await?;
        self.serve(listener, server, stop).await
    }

    /// Serve on an already bound listener until `stop` resolves, then drain.
    pub async fn serve<F>(
        &self,
        listener: TcpListener,
        server: GatewayServer,
        stop: F,
    ) -> Result<StopOutcome, LifecycleError>
    where
        F: Future<Output = ()>,
    {
        let address = listener.local_addr().map_err(LifecycleError::Serve)?;
        let abort = server.abort_handle();
        let drain = Shutdown::new();
        let sweeper = server.spawn_sweeper(drain.clone());

        let app = server
            .into_router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let graceful = {
            let drain = drain.clone();
            async move { drain.triggered().await }
        };
        let mut serve_task = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(graceful)
                .await
        });

        self.enter(Phase::Listening);
        tracing::info!(address = %address, "Gateway listening");

        tokio::select! {
            _ = stop => {}
            result = &mut serve_task => {
                drain.trigger();
                self.enter(Phase::Stopped);
                return match result {
                    Ok(Ok(())) => Ok(StopOutcome::Clean),
                    Ok(Err(e)) => Err(LifecycleError::Serve(e)),
                    Err(e) => Err(LifecycleError::Serve(io::Error::other(e))),
                };
            }
        }

        self.enter(Phase::ShuttingDown);
        tracing::info!(
            grace_secs = self.grace.as_secs(),
            "Shutdown signal received, draining connections"
        );
        drain.trigger();

        let outcome = match tokio::time::timeout(self.grace, &mut serve_task).await {
            Ok(result) => {
                match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::error!(error = %e, "Server exited with error during drain"),
                    Err(e) => tracing::error!(error = %e, "Server task failed during drain"),
                }
                StopOutcome::Clean
            }
            Err(_) => {
                tracing::warn!(
                    grace_secs = self.grace.as_secs(),
                    "Grace period elapsed, cancelling in-flight requests"
                );
                abort.trigger();
                if tokio::time::timeout(ABORT_FLUSH, &mut serve_task).await.is_err() {
                    serve_task.abort();
                }
                StopOutcome::Forced
            }
        };

        if let Some(sweeper) = sweeper {
            let _ = sweeper.await;
        }
        self.enter(Phase::Stopped);
        tracing::info!(outcome = ?outcome, "Gateway stopped");
        Ok(outcome)
    }
}
