//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Every password
//! that crosses the gateway, the directory bind secret and the signing key
//! material travel through these wrappers so that `{:?}` and tracing output
//! never contain them.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct BindCredentials {
//!     dn: String,
//!     password: SecretString,
//! }
//!
//! let creds = BindCredentials {
//!     dn: "cn=admin,dc=example,dc=org".to_string(),
//!     password: SecretString::from("hunter2"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("hunter2"));
//! assert_eq!(creds.password.expose_secret(), "hunter2");
//! ```
//!
//! # Usage Guidelines
//!
//! Use `SecretString` for:
//! - User passwords submitted for verification
//! - The directory admin bind password
//! - Encoded key material read from configuration (`k`, `d`)
//!
//! Use `SecretBox<T>` for:
//! - Decoded binary key material (`SecretBox<Vec<u8>>`)
//!
//! # Serde Integration
//!
//! With the `serde` feature enabled, secrets deserialize straight out of the
//! configuration file:
//!
//! ```rust
//! use serde::Deserialize;
//! use common::secret::SecretString;
//!
//! #[derive(Debug, Deserialize)]
//! struct DirectoryAuth {
//!     #[serde(rename = "ldapAuthDN")]
//!     dn: String,
//!     #[serde(rename = "ldapAuthPassword")]
//!     password: SecretString,
//! }
//!
//! let json = r#"{"ldapAuthDN": "cn=admin", "ldapAuthPassword": "s3cret"}"#;
//! let auth: DirectoryAuth = serde_json::from_str(json).unwrap();
//! assert!(!format!("{auth:?}").contains("s3cret"));
//! ```

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretBox, SecretString};
