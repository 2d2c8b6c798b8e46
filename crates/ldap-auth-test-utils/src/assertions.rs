//! Custom test assertions for expressive tests
//!
//! Provides trait-based assertions for room tokens.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use common::jwt::{peek_claims, RoomClaims};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

/// Custom assertions for minted tokens
///
/// # Example
/// ```rust,ignore
/// token
///     .assert_valid_jwt("HS256")
///     .assert_for_subject("alice")
///     .assert_permissions(&["present", "message"]);
/// ```
pub trait TokenAssertions {
    /// Assert compact JWS shape with the given `alg` and `typ: JWT`
    fn assert_valid_jwt(&self, alg: &str) -> &Self;

    /// Assert the `sub` claim
    fn assert_for_subject(&self, subject: &str) -> &Self;

    /// Assert the `aud` claim
    fn assert_audience(&self, audience: &str) -> &Self;

    /// Assert the exact permission list
    fn assert_permissions(&self, expected: &[&str]) -> &Self;

    /// Assert `exp - iat`
    fn assert_lifetime(&self, seconds: i64) -> &Self;

    /// Assert the signature verifies under `key`
    fn assert_verifies_with(&self, key: &DecodingKey, algorithm: Algorithm) -> &Self;

    /// Assert the signature does not verify under `key`
    fn assert_rejected_by(&self, key: &DecodingKey, algorithm: Algorithm) -> &Self;
}

fn claims(token: &str) -> RoomClaims {
    peek_claims(token).expect("token payload must decode")
}

fn validation(token: &str, algorithm: Algorithm) -> Validation {
    let mut validation = Validation::new(algorithm);
    validation.required_spec_claims.clear();
    match claims(token).aud {
        Some(aud) => validation.set_audience(&[aud]),
        None => validation.validate_aud = false,
    }
    validation
}

impl TokenAssertions for str {
    fn assert_valid_jwt(&self, alg: &str) -> &Self {
        let parts: Vec<_> = self.split('.').collect();
        assert_eq!(
            parts.len(),
            3,
            "JWT must have 3 parts (header.payload.signature), got {}",
            parts.len()
        );

        let header = URL_SAFE_NO_PAD
            .decode(parts[0])
            .expect("Failed to base64 decode JWT header");
        let header: serde_json::Value =
            serde_json::from_slice(&header).expect("Failed to parse JWT header JSON");

        assert_eq!(header["alg"], alg, "Unexpected algorithm");
        assert_eq!(header["typ"], "JWT", "Expected JWT type");
        self
    }

    fn assert_for_subject(&self, subject: &str) -> &Self {
        assert_eq!(claims(self).sub.as_deref(), Some(subject), "Unexpected subject");
        self
    }

    fn assert_audience(&self, audience: &str) -> &Self {
        assert_eq!(claims(self).aud.as_deref(), Some(audience), "Unexpected audience");
        self
    }

    fn assert_permissions(&self, expected: &[&str]) -> &Self {
        assert_eq!(claims(self).permissions, expected, "Unexpected permissions");
        self
    }

    fn assert_lifetime(&self, seconds: i64) -> &Self {
        let claims = claims(self);
        assert_eq!(claims.exp - claims.iat, seconds, "Unexpected token lifetime");
        self
    }

    fn assert_verifies_with(&self, key: &DecodingKey, algorithm: Algorithm) -> &Self {
        let result = decode::<RoomClaims>(self, key, &validation(self, algorithm));
        assert!(result.is_ok(), "Token failed to verify: {:?}", result.err());
        self
    }

    fn assert_rejected_by(&self, key: &DecodingKey, algorithm: Algorithm) -> &Self {
        let result = decode::<RoomClaims>(self, key, &validation(self, algorithm));
        assert!(result.is_err(), "Token unexpectedly verified");
        self
    }
}
