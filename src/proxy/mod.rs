//! Reverse-proxy subsystem.
//!
//! # Data Flow
//! ```text
//! Authenticated / admitted request
//!     → upstream.rs (base URL → scheme, authority, joined path)
//!     → forwarder.rs (header rewrite, bounded client call)
//!     → upstream response streamed back, or 5xx {"error": ...}
//! ```

pub mod forwarder;
pub mod upstream;

pub use forwarder::{Forwarder, UpstreamError};
pub use upstream::{UpstreamTarget, UpstreamTargetError};
