//! Certificate provider for HTTPS.
//!
//! The certificate and key are read from PEM files in the data directory and
//! re-read whenever either file's modification time changes, so a renewed
//! certificate is picked up without a restart.

use rustls::crypto::ring::{default_provider, sign::any_supported_type};
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;
use rustls::ServerConfig;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{info, warn};

pub const CERTIFICATE_FILE_NAME: &str = "cert.pem";
pub const PRIVATE_KEY_FILE_NAME: &str = "key.pem";

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid PEM in {path}: {reason}")]
    Pem { path: PathBuf, reason: String },

    #[error("No certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("Unsupported private key: {0}")]
    UnsupportedKey(String),

    #[error("TLS configuration error: {0}")]
    Config(#[from] rustls::Error),
}

/// Supplies the certificate presented during each handshake.
pub trait CertificateProvider: Send + Sync {
    fn current(&self) -> Result<Arc<CertifiedKey>, TlsError>;
}

#[derive(Debug)]
struct CachedCertificate {
    cert_modified: SystemTime,
    key_modified: SystemTime,
    key: Arc<CertifiedKey>,
}

/// [`CertificateProvider`] backed by a certificate chain and key on disk.
#[derive(Debug)]
pub struct FileCertificateProvider {
    cert_path: PathBuf,
    key_path: PathBuf,
    cached: Mutex<Option<CachedCertificate>>,
}

impl FileCertificateProvider {
    pub fn new(cert_path: impl Into<PathBuf>, key_path: impl Into<PathBuf>) -> Self {
        Self {
            cert_path: cert_path.into(),
            key_path: key_path.into(),
            cached: Mutex::new(None),
        }
    }

    /// `<data_dir>/cert.pem` and `<data_dir>/key.pem`.
    pub fn from_data_dir(data_dir: &Path) -> Self {
        Self::new(
            data_dir.join(CERTIFICATE_FILE_NAME),
            data_dir.join(PRIVATE_KEY_FILE_NAME),
        )
    }

    fn load(&self) -> Result<Arc<CertifiedKey>, TlsError> {
        let certs = CertificateDer::pem_file_iter(&self.cert_path)
            .and_then(|iter| iter.collect::<Result<Vec<_>, _>>())
            .map_err(|e| TlsError::Pem {
                path: self.cert_path.clone(),
                reason: e.to_string(),
            })?;
        if certs.is_empty() {
            return Err(TlsError::NoCertificates(self.cert_path.clone()));
        }

        let key_der = PrivateKeyDer::from_pem_file(&self.key_path).map_err(|e| TlsError::Pem {
            path: self.key_path.clone(),
            reason: e.to_string(),
        })?;
        let signing_key =
            any_supported_type(&key_der).map_err(|e| TlsError::UnsupportedKey(e.to_string()))?;

        Ok(Arc::new(CertifiedKey::new(certs, signing_key)))
    }
}

fn modified(path: &Path) -> Result<SystemTime, TlsError> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .map_err(|source| TlsError::Io {
            path: path.to_path_buf(),
            source,
        })
}

impl CertificateProvider for FileCertificateProvider {
    fn current(&self) -> Result<Arc<CertifiedKey>, TlsError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);

        let stamps = modified(&self.cert_path).and_then(|c| Ok((c, modified(&self.key_path)?)));

        if let (Ok((cert_modified, key_modified)), Some(entry)) = (&stamps, cached.as_ref()) {
            if entry.cert_modified == *cert_modified && entry.key_modified == *key_modified {
                return Ok(Arc::clone(&entry.key));
            }
        }

        match stamps.and_then(|stamps| Ok((stamps, self.load()?))) {
            Ok(((cert_modified, key_modified), key)) => {
                info!(
                    target: "ldap_auth.tls",
                    cert = %self.cert_path.display(),
                    "Loaded TLS certificate"
                );
                *cached = Some(CachedCertificate {
                    cert_modified,
                    key_modified,
                    key: Arc::clone(&key),
                });
                Ok(key)
            }
            Err(e) => match cached.as_ref() {
                Some(entry) => {
                    warn!(
                        target: "ldap_auth.tls",
                        error = %e,
                        "Failed to reload TLS certificate, keeping the previous one"
                    );
                    Ok(Arc::clone(&entry.key))
                }
                None => Err(e),
            },
        }
    }
}

impl ResolvesServerCert for FileCertificateProvider {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        match self.current() {
            Ok(key) => Some(key),
            Err(e) => {
                warn!(target: "ldap_auth.tls", error = %e, "No TLS certificate available");
                None
            }
        }
    }
}

/// Server configuration that asks `resolver` for a certificate on every handshake.
pub fn server_config(resolver: Arc<dyn ResolvesServerCert>) -> Result<ServerConfig, TlsError> {
    let mut config = ServerConfig::builder_with_provider(Arc::new(default_provider()))
        .with_safe_default_protocol_versions()?
        .with_no_client_auth()
        .with_cert_resolver(resolver);
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];
    Ok(config)
}
