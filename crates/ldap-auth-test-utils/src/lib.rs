//! # LDAP Auth Test Utilities
//!
//! Shared test utilities for the LDAP auth service.
//!
//! This crate provides:
//! - Deterministic crypto fixtures (fixed JWKs for every supported algorithm)
//! - Gateway test harness (TestGateway over an in-memory directory)
//! - Custom assertions (TokenAssertions trait)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ldap_auth_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() -> anyhow::Result<()> {
//!     let gateway = TestGateway::spawn().await?;
//!     gateway.directory().add_user("alice", "secret");
//!
//!     let response = gateway.request_token("alice", "secret", TEST_LOCATION).await?;
//!     response
//!         .body
//!         .assert_valid_jwt("HS256")
//!         .assert_for_subject("alice");
//!     Ok(())
//! }
//! ```

pub mod assertions;
pub mod crypto_fixtures;
pub mod server_harness;

// Re-export commonly used items
pub use assertions::*;
pub use crypto_fixtures::*;
pub use server_harness::*;
