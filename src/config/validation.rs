//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Upstream base URLs parse into forwardable targets
//! - The CORS origin is a single explicit origin (no wildcard)
//! - Value ranges (timeouts > 0, rate-limit ceilings > 0, bounded grace period)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GatewayConfig → Result<(), Vec<ValidationError>>
//! - Runs before any listener is bound

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{GatewayConfig, PolicyConfig, MAX_GRACE_PERIOD_SECS};
use crate::proxy::upstream::UpstreamTarget;
use crate::security::headers::{parse_origin, OriginError};

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("upstreams.{name}: invalid url '{value}': {reason}")]
    InvalidUpstream {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("listener.bind_address: '{0}' is not a socket address")]
    InvalidBindAddress(String),

    #[error("cors.allowed_origin: '{value}' is not a valid origin: {reason}")]
    InvalidOrigin { value: String, reason: String },

    #[error("cors.allowed_origin: '{0}' is a wildcard; credentialed CORS needs an explicit origin")]
    WildcardOrigin(String),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    #[error("shutdown.grace_period_secs: {value} exceeds the {max}s upper bound")]
    GracePeriodTooLong { value: u64, max: u64 },
}

/// Validate a fully assembled configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidBindAddress(
            config.listener.bind_address.clone(),
        ));
    }

    for (name, value) in [
        ("auth", &config.upstreams.auth),
        ("templates", &config.upstreams.templates),
        ("pdf", &config.upstreams.pdf),
    ] {
        if let Err(e) = UpstreamTarget::parse(name, value) {
            errors.push(ValidationError::InvalidUpstream {
                name,
                value: value.clone(),
                reason: e.to_string(),
            });
        }
    }

    match parse_origin(&config.cors.allowed_origin) {
        Ok(_) => {}
        Err(OriginError::Wildcard) => {
            errors.push(ValidationError::WildcardOrigin(config.cors.allowed_origin.clone()));
        }
        Err(OriginError::Malformed(reason)) => errors.push(ValidationError::InvalidOrigin {
            value: config.cors.allowed_origin.clone(),
            reason,
        }),
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.connect_secs"));
    }
    if config.timeouts.response_header_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.response_header_secs"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::Zero("timeouts.request_secs"));
    }

    check_policy(
        &config.rate_limit.default,
        ("rate_limit.default.max_requests", "rate_limit.default.window_secs"),
        &mut errors,
    );
    check_policy(
        &config.rate_limit.preview,
        ("rate_limit.preview.max_requests", "rate_limit.preview.window_secs"),
        &mut errors,
    );
    if config.rate_limit.sweep_interval_secs == 0 {
        errors.push(ValidationError::Zero("rate_limit.sweep_interval_secs"));
    }

    if config.shutdown.grace_period_secs > MAX_GRACE_PERIOD_SECS {
        errors.push(ValidationError::GracePeriodTooLong {
            value: config.shutdown.grace_period_secs,
            max: MAX_GRACE_PERIOD_SECS,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_policy(
    policy: &PolicyConfig,
    fields: (&'static str, &'static str),
    errors: &mut Vec<ValidationError>,
) {
    if policy.max_requests == 0 {
        errors.push(ValidationError::Zero(fields.0));
    }
    if policy.window_secs == 0 {
        errors.push(ValidationError::Zero(fields.1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.upstreams.auth = "http://127.0.0.1:8081".into();
        config.upstreams.templates = "http://templates.internal:8082/api".into();
        config.upstreams.pdf = "http://pdf".into();
        config.cors.allowed_origin = "http://localhost:3000".into();
        config
    }

    #[test]
    fn test_valid_config_passes() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_all_errors_are_collected() {
        let mut config = valid();
        config.upstreams.auth = "::not-a-url".into();
        config.upstreams.pdf = "ftp://pdf".into();
        config.timeouts.connect_secs = 0;
        config.rate_limit.preview.window_secs = 0;
        config.shutdown.grace_period_secs = 600;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 5);
        assert!(matches!(
            errors[0],
            ValidationError::InvalidUpstream { name: "auth", .. }
        ));
        assert!(matches!(
            errors[1],
            ValidationError::InvalidUpstream { name: "pdf", .. }
        ));
        assert!(errors.contains(&ValidationError::Zero("timeouts.connect_secs")));
        assert!(errors.contains(&ValidationError::Zero("rate_limit.preview.window_secs")));
        assert!(errors.contains(&ValidationError::GracePeriodTooLong { value: 600, max: 60 }));
    }

    #[test]
    fn test_bind_address_must_parse() {
        let mut config = valid();
        config.listener.bind_address = "localhost".into();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(
            errors,
            vec![ValidationError::InvalidBindAddress("localhost".into())]
        );
    }

    #[test]
    fn test_wildcard_origin_is_rejected() {
        let mut config = valid();
        config.cors.allowed_origin = "*".into();
        assert_eq!(
            validate_config(&config),
            Err(vec![ValidationError::WildcardOrigin("*".into())])
        );
    }

    #[test]
    fn test_origin_must_not_carry_a_path() {
        let mut config = valid();
        config.cors.allowed_origin = "http://localhost:3000/app".into();
        let errors = validate_config(&config).unwrap_err();
        assert!(matches!(
            errors.as_slice(),
            [ValidationError::InvalidOrigin { value, .. }] if value == "http://localhost:3000/app"
        ));
    }
}
