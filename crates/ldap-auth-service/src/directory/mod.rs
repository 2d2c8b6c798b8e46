//! Directory connection abstraction.
//!
//! The verification actor talks to the directory only through these traits,
//! so the retry and identity-restoration logic can be exercised against an
//! in-memory directory ([`mock::MockDirectory`]) as well as a real LDAP
//! server ([`ldap::LdapConnector`]).

pub mod ldap;
pub mod mock;

use async_trait::async_trait;
use common::secret::SecretString;
use std::collections::HashMap;
use thiserror::Error;

/// LDAP result code for a rejected simple bind.
pub const RESULT_INVALID_CREDENTIALS: u32 = 49;

/// Attribute holding the stored password hash.
pub const PASSWORD_ATTRIBUTE: &str = "userPassword";

/// Attribute matched against the submitted identifier.
pub const IDENTIFIER_ATTRIBUTE: &str = "uid";

/// Raw directory failures, before the actor classifies them.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The connection itself is unusable (I/O error, closed stream, timeout).
    #[error("directory network error: {0}")]
    Network(String),

    /// A bind was rejected with invalidCredentials.
    #[error("directory rejected credentials")]
    InvalidCredentials,

    /// Any other non-success result.
    #[error("directory returned result code {code}: {message}")]
    Protocol { code: u32, message: String },
}

impl DirectoryError {
    pub fn is_network(&self) -> bool {
        matches!(self, DirectoryError::Network(_))
    }
}

/// Identity the connection is bound as between requests.
#[derive(Debug, Clone)]
pub enum ServiceIdentity {
    Anonymous,
    Admin { dn: String, password: SecretString },
}

/// Lookup of a single entry by identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// Base DN; the search covers the whole subtree.
    pub base: String,
    /// Required `objectClass` of matching entries.
    pub object_class: String,
    /// Value matched against the `uid` attribute.
    pub identifier: String,
    /// Attributes to return in addition to the DN.
    pub attributes: Vec<String>,
}

impl SearchRequest {
    /// RFC 4515 filter with both values escaped.
    pub fn filter(&self) -> String {
        format!(
            "(&(objectClass={})({}={}))",
            escape_filter_value(&self.object_class),
            IDENTIFIER_ATTRIBUTE,
            escape_filter_value(&self.identifier)
        )
    }
}

/// Escape a filter assertion value per RFC 4515 section 3.
pub fn escape_filter_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '*' | '(' | ')' | '\\' | '\0' => {
                escaped.push_str(&format!("\\{:02x}", u32::from(ch)));
            }
            // UTF-8 need not be escaped
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// An entry returned by a search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    /// First value of `name`; attribute names compare case-insensitively.
    pub fn first_value(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .and_then(|(_, values)| values.first())
            .map(String::as_str)
    }
}

/// An established directory connection.
///
/// Owned by exactly one task; every method takes `&mut self`.
#[async_trait]
pub trait DirectoryConnection: Send {
    /// Search the subtree under `request.base`.
    async fn search(&mut self, request: &SearchRequest)
        -> Result<Vec<DirectoryEntry>, DirectoryError>;

    /// Simple bind; changes the connection's identity on success.
    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError>;

    /// Return the connection to the anonymous identity.
    async fn anonymous_bind(&mut self) -> Result<(), DirectoryError> {
        self.simple_bind("", "").await
    }

    /// Close the connection. Errors are not interesting at this point.
    async fn close(&mut self);
}

/// Factory for directory connections.
#[async_trait]
pub trait DirectoryConnector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError>;
}
