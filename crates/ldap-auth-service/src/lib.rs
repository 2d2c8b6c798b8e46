//! LDAP Auth Service Library
//!
//! Verifies user credentials against an LDAP directory and issues
//! short-lived signed room tokens to the conferencing server.
//!
//! # Modules
//!
//! - `actors` - The verification actor that owns the directory connection
//! - `config` - Service configuration
//! - `crypto` - Signing key parsing and stored password hash verification
//! - `directory` - Directory connection abstraction and the LDAP client
//! - `errors` - Error types
//! - `handlers` - HTTP request handlers
//! - `observability` - Metrics and log field hashing
//! - `routes` - HTTP routing
//! - `services` - Directory authentication and token minting
//! - `tls` - Certificate provider for HTTPS

pub mod actors;
pub mod config;
pub mod crypto;
pub mod directory;
pub mod errors;
pub mod handlers;
pub mod observability;
pub mod routes;
pub mod services;
pub mod tls;
