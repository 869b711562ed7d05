//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files; the
//! environment overlay in `loader.rs` fills in the deployment-specific values.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::security::rate_limit::RateLimitPolicy;

/// Upper bound on the shutdown grace period, whatever the configuration says.
pub const MAX_GRACE_PERIOD_SECS: u64 = 60;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Deployment environment name ("dev", "prod", ...).
    pub env: String,

    /// Listener configuration (bind address, body limit).
    pub listener: ListenerConfig,

    /// Base URLs of the internal services.
    pub upstreams: UpstreamsConfig,

    /// Credential verification settings.
    pub auth: AuthConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Rate limiting configuration.
    pub rate_limit: RateLimitConfig,

    /// CORS settings.
    pub cors: CorsConfig,

    /// Graceful shutdown settings.
    pub shutdown: ShutdownConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            env: "dev".to_string(),
            listener: ListenerConfig::default(),
            upstreams: UpstreamsConfig::default(),
            auth: AuthConfig::default(),
            timeouts: TimeoutConfig::default(),
            rate_limit: RateLimitConfig::default(),
            cors: CorsConfig::default(),
            shutdown: ShutdownConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Production deployments log JSON.
    pub fn is_production(&self) -> bool {
        is_production_env(&self.env)
    }
}

pub fn is_production_env(env: &str) -> bool {
    matches!(env, "prod" | "production")
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum accepted request body size in bytes.
    pub max_body_bytes: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_bytes: 10 * 1024 * 1024,
        }
    }
}

/// Base URLs of the services the gateway fronts.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamsConfig {
    pub auth: String,
    pub templates: String,
    pub pdf: String,
}

/// Credential verification settings.
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Shared HMAC signing secret.
    #[serde(skip_serializing)]
    pub jwt_secret: String,

    /// `Secure` attribute for the session cookie; required.
    pub cookie_secure: Option<bool>,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("cookie_secure", &self.cookie_secure)
            .finish()
    }
}

/// Timeout configuration for upstream and inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time allowed for the upstream to produce response headers, in seconds.
    pub response_header_secs: u64,

    /// Overall inbound request timeout (until response headers) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            response_header_secs: 5,
            request_secs: 60,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_secs)
    }

    pub fn response_header(&self) -> Duration {
        Duration::from_secs(self.response_header_secs)
    }

    pub fn request(&self) -> Duration {
        Duration::from_secs(self.request_secs)
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Enable rate limiting.
    pub enabled: bool,

    /// Ceiling for general traffic.
    pub default: PolicyConfig,

    /// Ceiling for the high-volume preview endpoint.
    pub preview: PolicyConfig,

    /// How often expired buckets are swept, in seconds.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default: PolicyConfig {
                max_requests: 50,
                window_secs: 60,
            },
            preview: PolicyConfig {
                max_requests: 1000,
                window_secs: 60,
            },
            sweep_interval_secs: 60,
        }
    }
}

/// A fixed-window request ceiling.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
pub struct PolicyConfig {
    /// Requests admitted per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,
}

impl PolicyConfig {
    pub fn policy(&self) -> RateLimitPolicy {
        RateLimitPolicy::new(self.max_requests, Duration::from_secs(self.window_secs))
    }
}

/// CORS configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct CorsConfig {
    /// The single frontend origin allowed to call the gateway with credentials.
    pub allowed_origin: String,
}

/// Graceful shutdown configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Time in-flight requests get to finish after an interrupt, in seconds.
    pub grace_period_secs: u64,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            grace_period_secs: 10,
        }
    }
}

impl ShutdownConfig {
    /// Grace period, clamped to [`MAX_GRACE_PERIOD_SECS`].
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs.min(MAX_GRACE_PERIOD_SECS))
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Prometheus exporter bind address; metrics are not exported when unset.
    pub metrics_address: Option<String>,
}
