//! Room token claims shared between the issuer and its test tooling.
//!
//! A room token is a compact JWS granting `permissions` on one room
//! (`aud`, the room location URL) to one user (`sub`). Tokens are meant to
//! be exchanged immediately by the conferencing server, so their lifetime is
//! deliberately tiny.
//!
//! # Security
//!
//! - The `sub` field is redacted in Debug output
//! - [`peek_claims`] does NOT verify the signature; it exists for logging
//!   and test assertions only

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Seconds a room token stays valid after minting.
pub const TOKEN_LIFETIME_SECONDS: i64 = 30;

/// Seconds `iat` is backdated to tolerate clock skew between issuer and verifier.
pub const ISSUED_AT_BACKDATE_SECONDS: i64 = 1;

/// Permissions granted when neither the caller nor the configuration supplies any.
pub const FALLBACK_PERMISSIONS: &[&str] = &["present", "message"];

/// Maximum token size accepted by [`peek_claims`] (8KB).
pub const MAX_JWT_SIZE_BYTES: usize = 8192;

// =============================================================================
// Error Types
// =============================================================================

/// Errors returned when inspecting a token without verifying it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JwtDecodeError {
    /// Token size exceeds maximum allowed.
    #[error("token exceeds {MAX_JWT_SIZE_BYTES} bytes")]
    TokenTooLarge,

    /// Token is not three base64url segments carrying JSON.
    #[error("token is malformed")]
    MalformedToken,
}

// =============================================================================
// Claims Types
// =============================================================================

/// Claims carried by a room token.
///
/// Optional string claims are omitted from the serialized form when absent,
/// so an empty location or username never produces `"aud": ""`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomClaims {
    /// Issuer, when one is configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,

    /// Audience: the room location URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,

    /// Subject: the directory identifier - redacted in Debug output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,

    /// Room permissions granted to the subject.
    pub permissions: Vec<String>,

    /// Issued-at timestamp (Unix epoch seconds).
    pub iat: i64,

    /// Expiration timestamp (Unix epoch seconds).
    pub exp: i64,
}

impl fmt::Debug for RoomClaims {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoomClaims")
            .field("iss", &self.iss)
            .field("aud", &self.aud)
            .field("sub", &self.sub.as_ref().map(|_| "[REDACTED]"))
            .field("permissions", &self.permissions)
            .field("iat", &self.iat)
            .field("exp", &self.exp)
            .finish()
    }
}

impl RoomClaims {
    /// Build claims for a token minted at `now` (Unix epoch seconds).
    ///
    /// Empty strings are treated as absent.
    #[must_use]
    pub fn issued_at(
        now: i64,
        issuer: Option<&str>,
        location: &str,
        subject: &str,
        permissions: Vec<String>,
    ) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());
        Self {
            iss: issuer.and_then(non_empty),
            aud: non_empty(location),
            sub: non_empty(subject),
            permissions,
            iat: now - ISSUED_AT_BACKDATE_SECONDS,
            exp: now + TOKEN_LIFETIME_SECONDS,
        }
    }
}

/// The fallback permission list as owned strings.
#[must_use]
pub fn fallback_permissions() -> Vec<String> {
    FALLBACK_PERMISSIONS.iter().map(ToString::to_string).collect()
}

// =============================================================================
// Functions
// =============================================================================

/// Decode the claims segment of a token without verifying its signature.
///
/// # Errors
///
/// - `TokenTooLarge` - Token exceeds `MAX_JWT_SIZE_BYTES`
/// - `MalformedToken` - Wrong structure, bad base64 or invalid claims JSON
pub fn peek_claims(token: &str) -> Result<RoomClaims, JwtDecodeError> {
    if token.len() > MAX_JWT_SIZE_BYTES {
        return Err(JwtDecodeError::TokenTooLarge);
    }

    let mut parts = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(JwtDecodeError::MalformedToken);
    };

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| JwtDecodeError::MalformedToken)?;

    serde_json::from_slice(&payload_bytes).map_err(|_| JwtDecodeError::MalformedToken)
}
