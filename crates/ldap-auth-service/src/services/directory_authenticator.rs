//! One verification attempt against an established directory connection.
//!
//! Two strategies are supported:
//!
//! - **Delegated bind**: look the user up, bind as their DN with the
//!   submitted secret, then restore the connection's service identity.
//! - **Client-side comparison**: fetch `userPassword` and compare the secret
//!   against the stored `{CRYPT}` hash locally. The bound identity is never
//!   changed.
//!
//! Errors are returned raw as [`AttemptError`]; the verification actor
//! decides what they mean for the connection and the caller.

use crate::config::Config;
use crate::crypto::password::{verify_stored_password, PasswordHashError};
use crate::directory::{
    DirectoryConnection, DirectoryError, SearchRequest, ServiceIdentity, PASSWORD_ATTRIBUTE,
};
use crate::errors::AuthError;
use common::secret::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, instrument};

/// How a submitted secret is checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStrategy {
    DelegatedBind,
    ClientSide,
}

/// Outcome of a verification that completed without error.
///
/// An entry that was not found is never valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Verification {
    found: bool,
    valid: bool,
}

impl Verification {
    pub fn not_found() -> Self {
        Self {
            found: false,
            valid: false,
        }
    }

    /// Exactly one entry matched; `valid` says whether the secret was accepted.
    pub fn found(valid: bool) -> Self {
        Self { found: true, valid }
    }

    pub fn is_found(&self) -> bool {
        self.found
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    /// Bounded label for metrics and logs.
    pub fn outcome(&self) -> &'static str {
        match (self.found, self.valid) {
            (false, _) => "not_found",
            (true, false) => "invalid",
            (true, true) => "valid",
        }
    }
}

/// Failure of a single attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AttemptError {
    /// A search or user bind failed at the directory.
    #[error(transparent)]
    Directory(DirectoryError),

    /// The connection could not be returned to the service identity.
    #[error("failed to restore service identity: {0}")]
    IdentityRestore(DirectoryError),

    #[error(transparent)]
    PasswordHash(PasswordHashError),

    #[error("entry has no userPassword attribute")]
    MissingPassword,
}

impl AttemptError {
    /// Whether the connection dropped underneath the attempt.
    ///
    /// Only these failures are eligible for a retry on a fresh connection.
    pub fn is_network(&self) -> bool {
        matches!(self, AttemptError::Directory(e) if e.is_network())
    }

    /// Bounded label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Directory(e) if e.is_network() => "network",
            AttemptError::Directory(_) => "directory",
            AttemptError::IdentityRestore(_) => "identity_restore",
            AttemptError::PasswordHash(_) => "password_hash",
            AttemptError::MissingPassword => "missing_password",
        }
    }
}

impl From<AttemptError> for AuthError {
    fn from(error: AttemptError) -> Self {
        if error.is_network() {
            AuthError::DirectoryConnection(error.to_string())
        } else {
            AuthError::DirectoryProtocol(error.to_string())
        }
    }
}

/// Runs verification attempts for one directory subtree.
#[derive(Debug, Clone)]
pub struct DirectoryAuthenticator {
    base: String,
    object_class: String,
    strategy: VerificationStrategy,
    service_identity: ServiceIdentity,
}

impl DirectoryAuthenticator {
    pub fn new(
        base: impl Into<String>,
        object_class: impl Into<String>,
        strategy: VerificationStrategy,
        service_identity: ServiceIdentity,
    ) -> Self {
        Self {
            base: base.into(),
            object_class: object_class.into(),
            strategy,
            service_identity,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        let strategy = if config.ldap_client_side_validate {
            VerificationStrategy::ClientSide
        } else {
            VerificationStrategy::DelegatedBind
        };

        // Validation pairs the DN with a non-empty password
        let service_identity = match (&config.ldap_auth_dn, &config.ldap_auth_password) {
            (Some(dn), Some(password)) => ServiceIdentity::Admin {
                dn: dn.clone(),
                password: password.clone(),
            },
            _ => ServiceIdentity::Anonymous,
        };

        Self::new(
            config.ldap_base.clone(),
            config.ldap_object_class.clone(),
            strategy,
            service_identity,
        )
    }

    pub fn strategy(&self) -> VerificationStrategy {
        self.strategy
    }

    /// Bind a freshly opened connection as the admin identity, if one is configured.
    ///
    /// New connections start anonymous, so nothing is sent otherwise.
    pub async fn bind_service_identity(
        &self,
        conn: &mut dyn DirectoryConnection,
    ) -> Result<(), DirectoryError> {
        match &self.service_identity {
            ServiceIdentity::Admin { dn, password } => {
                conn.simple_bind(dn, password.expose_secret()).await
            }
            ServiceIdentity::Anonymous => Ok(()),
        }
    }

    async fn restore_service_identity(
        &self,
        conn: &mut dyn DirectoryConnection,
    ) -> Result<(), DirectoryError> {
        match &self.service_identity {
            ServiceIdentity::Admin { dn, password } => {
                conn.simple_bind(dn, password.expose_secret()).await
            }
            ServiceIdentity::Anonymous => conn.anonymous_bind().await,
        }
    }

    fn search_request(&self, identifier: &str) -> SearchRequest {
        let mut attributes = vec!["dn".to_string()];
        if self.strategy == VerificationStrategy::ClientSide {
            attributes.push(PASSWORD_ATTRIBUTE.to_string());
        }

        SearchRequest {
            base: self.base.clone(),
            object_class: self.object_class.clone(),
            identifier: identifier.to_string(),
            attributes,
        }
    }

    /// Check `secret` for the entry whose `uid` is `identifier`.
    ///
    /// Zero or several matching entries yield [`Verification::not_found`].
    #[instrument(skip_all, fields(strategy = ?self.strategy))]
    pub async fn verify(
        &self,
        conn: &mut dyn DirectoryConnection,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<Verification, AttemptError> {
        let mut entries = conn
            .search(&self.search_request(identifier))
            .await
            .map_err(AttemptError::Directory)?;

        if entries.len() != 1 {
            debug!(
                target: "ldap_auth.directory",
                matches = entries.len(),
                "Lookup did not yield exactly one entry"
            );
            return Ok(Verification::not_found());
        }
        let Some(entry) = entries.pop() else {
            return Ok(Verification::not_found());
        };

        // An empty password would be an unauthenticated bind, which succeeds
        if secret.expose_secret().is_empty() {
            return Ok(Verification::found(false));
        }

        match self.strategy {
            VerificationStrategy::DelegatedBind => {
                let valid = match conn.simple_bind(&entry.dn, secret.expose_secret()).await {
                    Ok(()) => true,
                    Err(DirectoryError::InvalidCredentials) => false,
                    Err(e) => return Err(AttemptError::Directory(e)),
                };

                self.restore_service_identity(conn)
                    .await
                    .map_err(AttemptError::IdentityRestore)?;

                Ok(Verification::found(valid))
            }
            VerificationStrategy::ClientSide => {
                let stored = entry
                    .first_value(PASSWORD_ATTRIBUTE)
                    .ok_or(AttemptError::MissingPassword)?;
                let valid = verify_stored_password(stored, secret.expose_secret())
                    .map_err(AttemptError::PasswordHash)?;

                Ok(Verification::found(valid))
            }
        }
    }
}
