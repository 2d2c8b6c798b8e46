//! Observability for the LDAP auth service.
//!
//! # Privacy by Default
//!
//! Fields are categorized as:
//! - **SAFE**: Can be logged in plaintext (outcomes, algorithm names, group names)
//! - **HASHED**: Must be hashed for correlation (usernames)
//! - **NEVER**: Must never appear in logs (passwords, tokens, key material)

pub mod metrics;

use sha2::{Digest, Sha256};

/// Hash a field value for correlation in logs (SHA-256, first 8 hex chars)
///
/// This is a one-way hash for correlation only, not protection for secrets.
pub fn hash_for_correlation(value: &str) -> String {
    let digest = Sha256::digest(value.as_bytes());
    hex::encode(digest.get(..4).unwrap_or_default())
}
