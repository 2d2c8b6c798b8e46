//! Common utilities and types shared across the LDAP auth components.

#![warn(clippy::pedantic)]

/// Module for secret types that prevent accidental logging
pub mod secret;

/// Module for room token claims and lifetime constants
pub mod jwt;
