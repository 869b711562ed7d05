//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming Request (method, path)
//!     → router.rs (route lookup)
//!     → matcher.rs (evaluate method filter and path pattern)
//!     → Return: matched Route (target + policies) or None
//!
//! Route Compilation (at startup):
//!     GatewayConfig
//!     → Parse upstream targets
//!     → Compile patterns, attach auth and rate-limit policies
//!     → Sort by specificity, freeze as immutable RouteTable
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path
//! - Deterministic: most specific pattern wins, then declaration order

pub mod matcher;
pub mod router;

pub use matcher::{MethodFilter, PathPattern, PatternError};
pub use router::{
    RateLimitRule, Route, RouteError, RouteTable, RouteTarget, DEFAULT_GROUP, PREVIEW_GROUP,
};
