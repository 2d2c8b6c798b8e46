//! Deterministic signing-key fixtures
//!
//! Fixed JWKs so tokens minted in tests can be verified with known material.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use ldap_auth_service::crypto::{parse_signing_key, KeyDescriptor, SigningKey};

pub const HS256_JWK: &str = r#"{"alg":"HS256","k":"ZUtxl5wJ1db-erWkLYAYCxx3d0PdFDL8f903SF8k08M","key_ops":["sign","verify"],"kty":"oct"}"#;

pub const HS384_JWK: &str = r#"{"alg":"HS384","k":"_u5991ROm0v4KTcdZVWGWmH3ol3vyYCnCVkNlAnaDXPKWvuUAV3xwH9WJ22jeSqv","key_ops":["sign","verify"],"kty":"oct"}"#;

pub const HS512_JWK: &str = r#"{"alg":"HS512","k":"YHtmwudhfEDeEYxiVaHjHGlH3epeKB4CL8mot5XKMTvAuSq0H2bp9ZEYi6s4pkwwYS20WophkdvujORLWaowaA","key_ops":["sign","verify"],"kty":"oct"}"#;

pub const ES256_JWK: &str = r#"{"alg":"ES256","crv":"P-256","d":"c1kE6PgP6ik1Ga4KvQ9srvuZ8435UOi4cyzQOc2Dx_g","key_ops":["sign","verify"],"kty":"EC","x":"HyZNurU1941I0u9CFXKzd6g31SbHRHqpPA9dlHb9Plo","y":"neERCfvQ-SIX8D7V-HqcRAZb8Ixyvu0wNgj_URWR8r8"}"#;

/// Every supported algorithm, as `(alg, jwk)`.
pub const ALL_JWKS: [(&str, &str); 4] = [
    ("HS256", HS256_JWK),
    ("HS384", HS384_JWK),
    ("HS512", HS512_JWK),
    ("ES256", ES256_JWK),
];

/// Decode a JWK fixture into a descriptor.
pub fn key_descriptor(jwk: &str) -> KeyDescriptor {
    serde_json::from_str(jwk).expect("fixture JWK must be valid JSON")
}

/// Parse a JWK fixture into a signing key.
pub fn signing_key(jwk: &str) -> SigningKey {
    parse_signing_key(&key_descriptor(jwk)).expect("fixture JWK must parse")
}

/// Raw bytes of the HS256 fixture key.
pub fn hs256_secret() -> Vec<u8> {
    URL_SAFE_NO_PAD
        .decode("ZUtxl5wJ1db-erWkLYAYCxx3d0PdFDL8f903SF8k08M")
        .expect("fixture key must be base64url")
}
