use crate::crypto::{parse_signing_key, KeyDescriptor, KeyError, SigningKey};
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the configuration file inside the data directory.
pub const CONFIG_FILE_NAME: &str = "galene-ldap.json";

const DEFAULT_HTTP_ADDRESS: &str = "0.0.0.0:8443";
const DEFAULT_OBJECT_CLASS: &str = "inetOrgPerson";
const DEFAULT_LDAP_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_VERIFY_TIMEOUT_SECONDS: u64 = 45;
const DEFAULT_VERIFIER_QUEUE_DEPTH: usize = 1;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    /// Groups for which tokens are issued.
    #[serde(default)]
    pub groups: HashSet<String>,

    /// Defer to the conferencing server's own password check when this
    /// service has no opinion.
    #[serde(default)]
    pub password_fallback: bool,

    #[serde(default = "default_http_address")]
    pub http_address: String,

    /// Serve plain HTTP.
    #[serde(default)]
    pub insecure: bool,

    pub key: KeyDescriptor,

    pub ldap_server: String,

    pub ldap_base: String,

    #[serde(default, rename = "ldapAuthDN")]
    pub ldap_auth_dn: Option<String>,

    #[serde(default)]
    pub ldap_auth_password: Option<SecretString>,

    #[serde(default)]
    pub ldap_client_side_validate: bool,

    /// `None` when absent; `Some(vec![])` is an explicit empty grant.
    #[serde(default)]
    pub default_permissions: Option<Vec<String>>,

    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default = "default_object_class")]
    pub ldap_object_class: String,

    /// Seconds.
    #[serde(default = "default_ldap_timeout")]
    pub ldap_timeout: u64,

    /// Seconds.
    #[serde(default = "default_verify_timeout")]
    pub verify_timeout: u64,

    #[serde(default = "default_verifier_queue_depth")]
    pub verifier_queue_depth: usize,

    #[serde(default)]
    pub metrics_address: Option<String>,
}

fn default_http_address() -> String {
    DEFAULT_HTTP_ADDRESS.to_string()
}

fn default_object_class() -> String {
    DEFAULT_OBJECT_CLASS.to_string()
}

fn default_ldap_timeout() -> u64 {
    DEFAULT_LDAP_TIMEOUT_SECONDS
}

fn default_verify_timeout() -> u64 {
    DEFAULT_VERIFY_TIMEOUT_SECONDS
}

fn default_verifier_queue_depth() -> usize {
    DEFAULT_VERIFIER_QUEUE_DEPTH
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Missing required configuration field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Invalid signing key: {0}")]
    SigningKey(#[from] KeyError),
}

impl Config {
    /// Load `<data_dir>/galene-ldap.json`.
    pub fn from_data_dir(data_dir: &Path) -> Result<Self, ConfigError> {
        Self::from_file(&data_dir.join(CONFIG_FILE_NAME))
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&contents)
    }

    /// Parse and validate a configuration document (for testing and `from_file`).
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_json::from_str(json)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    fn normalize(&mut self) {
        // ":8443" listens on every interface
        if self.http_address.starts_with(':') {
            self.http_address = format!("0.0.0.0{}", self.http_address);
        }
        if self.ldap_auth_dn.as_deref() == Some("") {
            self.ldap_auth_dn = None;
        }
        if self
            .ldap_auth_password
            .as_ref()
            .is_some_and(|p| p.expose_secret().is_empty())
        {
            self.ldap_auth_password = None;
        }
        if self.issuer.as_deref() == Some("") {
            self.issuer = None;
        }
        if self.metrics_address.as_deref() == Some("") {
            self.metrics_address = None;
        }
        self.verifier_queue_depth = self.verifier_queue_depth.max(1);
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ldap_server.is_empty() {
            return Err(ConfigError::MissingField("ldapServer"));
        }
        if self.ldap_base.is_empty() {
            return Err(ConfigError::MissingField("ldapBase"));
        }
        if self.ldap_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "ldapTimeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.verify_timeout == 0 {
            return Err(ConfigError::InvalidValue {
                field: "verifyTimeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        // An empty password would make the admin bind an unauthenticated one
        match (&self.ldap_auth_dn, &self.ldap_auth_password) {
            (Some(_), None) => Err(ConfigError::InvalidValue {
                field: "ldapAuthPassword",
                reason: "required with ldapAuthDN".to_string(),
            }),
            (None, Some(_)) => Err(ConfigError::InvalidValue {
                field: "ldapAuthPassword",
                reason: "set without ldapAuthDN".to_string(),
            }),
            _ => Ok(()),
        }
    }

    /// Parse the configured key descriptor.
    pub fn signing_key(&self) -> Result<SigningKey, ConfigError> {
        Ok(parse_signing_key(&self.key)?)
    }

    pub fn ldap_timeout(&self) -> Duration {
        Duration::from_secs(self.ldap_timeout)
    }

    pub fn verify_timeout(&self) -> Duration {
        Duration::from_secs(self.verify_timeout)
    }

    /// Whether `group` is one we issue tokens for.
    pub fn is_known_group(&self, group: &str) -> bool {
        self.groups.contains(group)
    }
}
