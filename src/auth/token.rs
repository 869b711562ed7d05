//! Bearer token verification.
//!
//! # Responsibilities
//! - Verify the HMAC signature against the shared secret
//! - Accept only the HMAC algorithm family (HS256/HS384/HS512)
//! - Require a non-empty string `sub`; reject an expired `exp` when one is
//!   present
//!
//! # Design Decisions
//! - The algorithm is allow-listed from the token header before any
//!   signature work, so RS*/ES*/PS*/EdDSA and `none` never reach the
//!   verifier even if well-formed
//! - No leeway on expiry

use std::fmt;

use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// The only algorithms a gateway token may be signed with.
pub const ALLOWED_ALGORITHMS: [Algorithm; 3] = [Algorithm::HS256, Algorithm::HS384, Algorithm::HS512];

/// The caller's verified identity, attached to the request after auth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: String,
}

/// Claims read from a gateway token. `exp` is checked by the validator on
/// the raw payload, so only the subject is deserialized here.
#[derive(Debug, Deserialize)]
pub struct Claims {
    #[serde(default)]
    pub sub: Option<Value>,
}

/// Reason a token was rejected. Callers surface all of them the same way.
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("signing algorithm {0:?} is not allowed")]
    DisallowedAlgorithm(Algorithm),

    #[error("token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("subject claim missing, empty or not a string")]
    InvalidSubject,
}

/// Capability that turns a bearer credential into an identity.
pub trait TokenVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, TokenError>;
}

/// Verifies HMAC-signed JWTs with a shared secret.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &[u8]) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.algorithms = ALLOWED_ALGORITHMS.to_vec();
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_aud = false;
        validation.set_required_spec_claims::<&str>(&[]);

        Self {
            key: DecodingKey::from_secret(secret),
            validation,
        }
    }
}

impl fmt::Debug for JwtVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtVerifier")
            .field("algorithms", &self.validation.algorithms)
            .finish_non_exhaustive()
    }
}

impl TokenVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, TokenError> {
        let header = decode_header(token)?;
        if !ALLOWED_ALGORITHMS.contains(&header.alg) {
            return Err(TokenError::DisallowedAlgorithm(header.alg));
        }

        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        match data.claims.sub {
            Some(Value::String(subject)) if !subject.is_empty() => Ok(Identity { subject }),
            _ => Err(TokenError::InvalidSubject),
        }
    }
}
