//! Signing key parsing and token signing.
//!
//! The signing key is described in configuration as a JWK-shaped object
//! (RFC 7517). It is parsed and validated exactly once, at startup; any
//! problem is a [`KeyError`] that prevents the service from starting.
//!
//! Supported keys:
//!
//! | `kty` | `alg`   | material                             |
//! |-------|---------|--------------------------------------|
//! | `oct` | `HS256` | `k`, 32 bytes                        |
//! | `oct` | `HS384` | `k`, 48 bytes                        |
//! | `oct` | `HS512` | `k`, 64 bytes                        |
//! | `EC`  | `ES256` | `crv=P-256`, `x`, `y` (32 bytes), `d` |
//!
//! An ES256 descriptor must carry its private scalar `d`: a bare public
//! point cannot sign. The point `(x, y)` is checked against the P-256 curve
//! equation and against the public key derived from `d`.

pub mod password;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use common::secret::{ExposeSecret, SecretBox, SecretString};
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use p256::elliptic_curve::sec1::FromEncodedPoint;
use p256::pkcs8::EncodePrivateKey;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tracing::instrument;

/// Errors produced while turning a key descriptor into a [`SigningKey`].
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("key member `{0}` not found")]
    MissingMember(&'static str),

    #[error("key member `{member}` is not valid base64url: {source}")]
    InvalidEncoding {
        member: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error("unknown key type `{0}`")]
    UnknownKeyType(String),

    #[error("unknown algorithm `{alg}` for key type `{kty}`")]
    UnknownAlgorithm { kty: String, alg: String },

    #[error("unknown curve `{0}`")]
    UnknownCurve(String),

    #[error("bad length for {member}: expected {expected} bytes, got {actual}")]
    BadLength {
        member: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("public point is not on curve P-256")]
    PointNotOnCurve,

    #[error("private key `d` is not a valid P-256 scalar")]
    InvalidPrivateKey,

    #[error("private key `d` does not match public point")]
    KeyPairMismatch,

    #[error("key encoding failed: {0}")]
    Encoding(String),
}

/// Declarative signing key description, as found under `key` in the
/// configuration file.
///
/// Members not listed here (`key_ops`, `use`, ...) are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct KeyDescriptor {
    #[serde(default)]
    pub kty: Option<String>,
    #[serde(default)]
    pub alg: Option<String>,
    #[serde(default)]
    pub kid: Option<String>,
    #[serde(default)]
    pub k: Option<SecretString>,
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
    #[serde(default)]
    pub d: Option<SecretString>,
}

/// Signature algorithm, fixed for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningAlgorithm {
    Hs256,
    Hs384,
    Hs512,
    Es256,
}

impl SigningAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            SigningAlgorithm::Hs256 => "HS256",
            SigningAlgorithm::Hs384 => "HS384",
            SigningAlgorithm::Hs512 => "HS512",
            SigningAlgorithm::Es256 => "ES256",
        }
    }

    pub fn jwt_algorithm(&self) -> Algorithm {
        match self {
            SigningAlgorithm::Hs256 => Algorithm::HS256,
            SigningAlgorithm::Hs384 => Algorithm::HS384,
            SigningAlgorithm::Hs512 => Algorithm::HS512,
            SigningAlgorithm::Es256 => Algorithm::ES256,
        }
    }

    /// Mandated key length of the symmetric tiers.
    fn symmetric_key_len(alg: &str) -> Option<(Self, usize)> {
        match alg {
            "HS256" => Some((SigningAlgorithm::Hs256, 32)),
            "HS384" => Some((SigningAlgorithm::Hs384, 48)),
            "HS512" => Some((SigningAlgorithm::Hs512, 64)),
            _ => None,
        }
    }
}

/// A validated signing key.
///
/// Immutable after startup and shared by every minting operation.
pub struct SigningKey {
    algorithm: SigningAlgorithm,
    key_id: Option<String>,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

/// Custom Debug implementation that never prints key material.
impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("algorithm", &self.algorithm)
            .field("key_id", &self.key_id)
            .field("material", &"[REDACTED]")
            .finish()
    }
}

impl SigningKey {
    pub fn algorithm(&self) -> SigningAlgorithm {
        self.algorithm
    }

    /// Key that verifies signatures produced by this key.
    pub fn verification_key(&self) -> &DecodingKey {
        &self.decoding_key
    }

    /// Sign `claims` as a compact JWS.
    #[instrument(skip_all, fields(alg = self.algorithm.as_str()))]
    pub fn sign<T: Serialize>(&self, claims: &T) -> Result<String, jsonwebtoken::errors::Error> {
        let mut header = Header::new(self.algorithm.jwt_algorithm());
        header.typ = Some("JWT".to_string());
        header.kid.clone_from(&self.key_id);

        encode(&header, claims, &self.encoding_key)
    }
}

fn required<'a>(value: Option<&'a str>, member: &'static str) -> Result<&'a str, KeyError> {
    value.ok_or(KeyError::MissingMember(member))
}

fn decode_member(value: &str, member: &'static str) -> Result<Vec<u8>, KeyError> {
    URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|source| KeyError::InvalidEncoding { member, source })
}

fn check_len(bytes: &[u8], member: &'static str, expected: usize) -> Result<(), KeyError> {
    if bytes.len() != expected {
        return Err(KeyError::BadLength {
            member,
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Parse and validate a signing key descriptor.
///
/// # Errors
///
/// Returns a [`KeyError`] for a missing member, bad encoding, wrong length,
/// off-curve point, mismatched key pair, or unknown type/algorithm/curve.
#[instrument(skip_all)]
pub fn parse_signing_key(descriptor: &KeyDescriptor) -> Result<SigningKey, KeyError> {
    let kty = required(descriptor.kty.as_deref(), "kty")?;
    let alg = required(descriptor.alg.as_deref(), "alg")?;

    let key = match kty {
        "oct" => parse_symmetric(descriptor, alg)?,
        "EC" => parse_ec(descriptor, alg)?,
        other => return Err(KeyError::UnknownKeyType(other.to_string())),
    };

    tracing::info!(
        target: "ldap_auth.crypto",
        alg = key.algorithm.as_str(),
        kid = ?key.key_id,
        "Signing key loaded"
    );

    Ok(key)
}

fn parse_symmetric(descriptor: &KeyDescriptor, alg: &str) -> Result<SigningKey, KeyError> {
    let (algorithm, length) =
        SigningAlgorithm::symmetric_key_len(alg).ok_or_else(|| KeyError::UnknownAlgorithm {
            kty: "oct".to_string(),
            alg: alg.to_string(),
        })?;

    let encoded = descriptor
        .k
        .as_ref()
        .ok_or(KeyError::MissingMember("k"))?;
    let material = SecretBox::new(Box::new(decode_member(encoded.expose_secret(), "k")?));
    check_len(material.expose_secret(), "k", length)?;

    Ok(SigningKey {
        algorithm,
        key_id: descriptor.kid.clone(),
        encoding_key: EncodingKey::from_secret(material.expose_secret()),
        decoding_key: DecodingKey::from_secret(material.expose_secret()),
    })
}

fn parse_ec(descriptor: &KeyDescriptor, alg: &str) -> Result<SigningKey, KeyError> {
    if alg != "ES256" {
        return Err(KeyError::UnknownAlgorithm {
            kty: "EC".to_string(),
            alg: alg.to_string(),
        });
    }

    let crv = required(descriptor.crv.as_deref(), "crv")?;
    if crv != "P-256" {
        return Err(KeyError::UnknownCurve(crv.to_string()));
    }

    let x_encoded = required(descriptor.x.as_deref(), "x")?;
    let y_encoded = required(descriptor.y.as_deref(), "y")?;
    let x = decode_member(x_encoded, "x")?;
    let y = decode_member(y_encoded, "y")?;
    check_len(&x, "x", 32)?;
    check_len(&y, "y", 32)?;

    let point = p256::EncodedPoint::from_affine_coordinates(
        p256::FieldBytes::from_slice(&x),
        p256::FieldBytes::from_slice(&y),
        false,
    );
    let public_key = Option::<p256::PublicKey>::from(p256::PublicKey::from_encoded_point(&point))
        .ok_or(KeyError::PointNotOnCurve)?;

    let d_encoded = descriptor
        .d
        .as_ref()
        .ok_or(KeyError::MissingMember("d"))?;
    let d = SecretBox::new(Box::new(decode_member(d_encoded.expose_secret(), "d")?));
    check_len(d.expose_secret(), "d", 32)?;

    let secret_key =
        p256::SecretKey::from_slice(d.expose_secret()).map_err(|_| KeyError::InvalidPrivateKey)?;
    if secret_key.public_key() != public_key {
        return Err(KeyError::KeyPairMismatch);
    }

    let pkcs8 = secret_key
        .to_pkcs8_der()
        .map_err(|e| KeyError::Encoding(format!("PKCS#8 encoding failed: {e}")))?;
    let decoding_key = DecodingKey::from_ec_components(x_encoded, y_encoded)
        .map_err(|e| KeyError::Encoding(format!("verification key rejected: {e}")))?;

    Ok(SigningKey {
        algorithm: SigningAlgorithm::Es256,
        key_id: descriptor.kid.clone(),
        encoding_key: EncodingKey::from_ec_der(pkcs8.as_bytes()),
        decoding_key,
    })
}
