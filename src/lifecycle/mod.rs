//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Bind listener → Start sweeper → Listening
//!
//! Shutdown (startup.rs + shutdown.rs):
//!     Stop signal → Stop accepting → Drain in-flight → Stopped
//!     Grace period elapsed → abort in-flight forwards → Stopped (forced)
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then routes, then listener
//! - Ordered shutdown: stop accept, drain, close
//! - Shutdown has a bounded grace period (at most 60 s)

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
pub use startup::{Lifecycle, LifecycleError, Phase, StopOutcome};
