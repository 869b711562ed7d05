//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (CORS, security response headers)
//!     → [router selects route]
//!     → rate_limit.rs (per route group + client IP admission)
//!     → Pass to auth stage
//! ```
//!
//! # Design Decisions
//! - Fail closed: a rejected admission never reaches auth or the upstream
//! - Rejections are terminal HTTP responses, never errors

pub mod headers;
pub mod rate_limit;

pub use rate_limit::{BucketKey, Decision, RateLimitPolicy, RateLimiter};
