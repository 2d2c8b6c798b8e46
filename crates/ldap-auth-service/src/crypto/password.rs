//! Verification of stored `userPassword` values for client-side validation.
//!
//! Only values tagged `{CRYPT}` (RFC 2307) are understood. The crypt(3)
//! string that follows selects the algorithm by its `$id$` prefix:
//!
//! - `$1$` MD5-crypt
//! - `$5$` SHA-256-crypt
//! - `$6$` SHA-512-crypt
//! - `$2a$`, `$2b$`, `$2y$` bcrypt

use thiserror::Error;
use tracing::instrument;

const CRYPT_TAG: &str = "{CRYPT}";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PasswordHashError {
    /// The stored value does not carry a `{CRYPT}$` prefix.
    #[error("unsupported password format")]
    UnsupportedScheme,

    /// The crypt string names an algorithm we do not implement.
    #[error("unsupported crypt algorithm `{0}`")]
    UnsupportedAlgorithm(String),

    /// The crypt string is structurally invalid.
    #[error("malformed password hash")]
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CryptAlgorithm {
    Md5,
    Sha256,
    Sha512,
    Bcrypt,
}

impl CryptAlgorithm {
    fn from_id(id: &str) -> Result<Self, PasswordHashError> {
        match id {
            "1" => Ok(CryptAlgorithm::Md5),
            "5" => Ok(CryptAlgorithm::Sha256),
            "6" => Ok(CryptAlgorithm::Sha512),
            "2a" | "2b" | "2y" => Ok(CryptAlgorithm::Bcrypt),
            other => Err(PasswordHashError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

/// Strip the scheme tag and identify the crypt algorithm.
fn parse_stored(stored: &str) -> Result<(CryptAlgorithm, &str), PasswordHashError> {
    let tag = stored
        .get(..CRYPT_TAG.len())
        .ok_or(PasswordHashError::UnsupportedScheme)?;
    if !tag.eq_ignore_ascii_case(CRYPT_TAG) {
        return Err(PasswordHashError::UnsupportedScheme);
    }

    let hashed = stored
        .get(CRYPT_TAG.len()..)
        .ok_or(PasswordHashError::UnsupportedScheme)?;
    let rest = hashed
        .strip_prefix('$')
        .ok_or(PasswordHashError::UnsupportedScheme)?;

    // "$id$params-or-salt$..." - at least one segment must follow the id
    let (id, body) = rest.split_once('$').ok_or(PasswordHashError::Malformed)?;
    if id.is_empty() || body.is_empty() {
        return Err(PasswordHashError::Malformed);
    }

    Ok((CryptAlgorithm::from_id(id)?, hashed))
}

/// Compare `password` against a stored `{CRYPT}` value.
///
/// Returns `Ok(false)` on a mismatch; errors are reserved for values we
/// cannot interpret at all.
///
/// # Errors
///
/// [`PasswordHashError`] when the stored value is untagged, names an
/// unsupported algorithm, or is malformed.
#[instrument(skip_all)]
pub fn verify_stored_password(stored: &str, password: &str) -> Result<bool, PasswordHashError> {
    let (algorithm, hashed) = parse_stored(stored)?;

    let matches = match algorithm {
        CryptAlgorithm::Md5 => pwhash::md5_crypt::verify(password, hashed),
        CryptAlgorithm::Sha256 => pwhash::sha256_crypt::verify(password, hashed),
        CryptAlgorithm::Sha512 => pwhash::sha512_crypt::verify(password, hashed),
        CryptAlgorithm::Bcrypt => {
            bcrypt::verify(password, hashed).map_err(|e| {
                tracing::debug!(target: "ldap_auth.crypto", error = %e, "bcrypt hash rejected");
                PasswordHashError::Malformed
            })?
        }
    };

    Ok(matches)
}
