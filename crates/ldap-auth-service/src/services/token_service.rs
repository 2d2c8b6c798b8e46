//! Room token minting.
//!
//! Tokens carry the room as audience, the user as subject and a short
//! lifetime, and are signed with the single key loaded at startup.

use crate::crypto::SigningKey;
use crate::errors::AuthError;
use crate::observability::metrics::record_token_issuance;
use chrono::Utc;
use common::jwt::{fallback_permissions, RoomClaims};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, instrument};

/// Signs room tokens with the key chosen at startup.
#[derive(Debug, Clone)]
pub struct TokenMinter {
    key: Arc<SigningKey>,
    issuer: Option<String>,
    default_permissions: Option<Vec<String>>,
}

impl TokenMinter {
    pub fn new(
        key: Arc<SigningKey>,
        issuer: Option<String>,
        default_permissions: Option<Vec<String>>,
    ) -> Self {
        Self {
            key,
            issuer,
            default_permissions,
        }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.key
    }

    /// Mint a token for `identifier` to join `location`.
    ///
    /// Permissions come from `permissions`, else the configured default, else
    /// `["present", "message"]`.
    pub fn mint(
        &self,
        location: &str,
        identifier: &str,
        permissions: Option<&[String]>,
    ) -> Result<String, AuthError> {
        self.mint_at(Utc::now().timestamp(), location, identifier, permissions)
    }

    /// Mint with an explicit issue time (Unix seconds).
    #[instrument(skip_all, fields(algorithm = self.key.algorithm().as_str()))]
    pub fn mint_at(
        &self,
        now: i64,
        location: &str,
        identifier: &str,
        permissions: Option<&[String]>,
    ) -> Result<String, AuthError> {
        let start = Instant::now();
        let algorithm = self.key.algorithm().as_str();

        let permissions = permissions
            .map(<[String]>::to_vec)
            .or_else(|| self.default_permissions.clone())
            .unwrap_or_else(fallback_permissions);

        let claims = RoomClaims::issued_at(
            now,
            self.issuer.as_deref(),
            location,
            identifier,
            permissions,
        );

        match self.key.sign(&claims) {
            Ok(token) => {
                record_token_issuance(algorithm, "success", start.elapsed());
                Ok(token)
            }
            Err(e) => {
                error!(target: "ldap_auth.crypto", error = %e, "Failed to sign token");
                record_token_issuance(algorithm, "error", start.elapsed());
                Err(AuthError::Signing(e.to_string()))
            }
        }
    }
}
