//! Verification actor against a scripted directory.
//!
//! Covers the outcome classification, the single transparent retry and the
//! bound identity between requests, for both verification strategies.

use common::secret::SecretString;
use ldap_auth_service::actors::VerifierActorHandle;
use ldap_auth_service::directory::mock::{MockDirectory, MockEntry};
use ldap_auth_service::directory::{DirectoryError, ServiceIdentity};
use ldap_auth_service::errors::AuthError;
use ldap_auth_service::services::{DirectoryAuthenticator, VerificationStrategy};
use ldap_auth_test_utils::TEST_BASE;
use std::sync::Arc;

const ADMIN_DN: &str = "cn=admin,dc=example,dc=org";
const ADMIN_PASSWORD: &str = "admin-secret";

fn admin_identity() -> ServiceIdentity {
    ServiceIdentity::Admin {
        dn: ADMIN_DN.to_string(),
        password: SecretString::from(ADMIN_PASSWORD),
    }
}

fn spawn(
    directory: &MockDirectory,
    strategy: VerificationStrategy,
    identity: ServiceIdentity,
) -> VerifierActorHandle {
    let authenticator = DirectoryAuthenticator::new(TEST_BASE, "inetOrgPerson", strategy, identity);
    let (handle, _task) = VerifierActorHandle::spawn(Arc::new(directory.clone()), authenticator, 1);
    handle
}

async fn verify(
    verifier: &VerifierActorHandle,
    identifier: &str,
    secret: &str,
) -> Result<ldap_auth_service::services::Verification, AuthError> {
    verifier
        .submit(identifier.to_string(), SecretString::from(secret))
        .await
}

/// Directory with alice under both a bind password and a stored hash.
fn populated_directory() -> Result<MockDirectory, anyhow::Error> {
    let directory = MockDirectory::new(TEST_BASE).with_admin(ADMIN_DN, ADMIN_PASSWORD);
    let hash = pwhash::sha256_crypt::hash("wonderland")?;
    directory.add_entry(MockEntry {
        dn: format!("uid=alice,{TEST_BASE}"),
        uid: "alice".to_string(),
        object_class: "inetOrgPerson".to_string(),
        bind_password: Some("wonderland".to_string()),
        stored_password: Some(format!("{{CRYPT}}{hash}")),
    });
    Ok(directory)
}

// ============================================================================
// Outcome Classification
// ============================================================================

#[tokio::test]
async fn test_correct_secret_is_valid_under_both_strategies() -> Result<(), anyhow::Error> {
    for strategy in [
        VerificationStrategy::DelegatedBind,
        VerificationStrategy::ClientSide,
    ] {
        let directory = populated_directory()?;
        let verifier = spawn(&directory, strategy, ServiceIdentity::Anonymous);

        let verification = verify(&verifier, "alice", "wonderland").await?;

        assert!(verification.is_found(), "{strategy:?}");
        assert!(verification.is_valid(), "{strategy:?}");
    }
    Ok(())
}

#[tokio::test]
async fn test_wrong_secret_is_invalid_under_both_strategies() -> Result<(), anyhow::Error> {
    for strategy in [
        VerificationStrategy::DelegatedBind,
        VerificationStrategy::ClientSide,
    ] {
        let directory = populated_directory()?;
        let verifier = spawn(&directory, strategy, ServiceIdentity::Anonymous);

        let verification = verify(&verifier, "alice", "looking-glass").await?;

        assert!(verification.is_found(), "{strategy:?}");
        assert!(!verification.is_valid(), "{strategy:?}");
    }
    Ok(())
}

#[tokio::test]
async fn test_zero_or_multiple_matches_are_not_found() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    directory.add_user("bob", "builder");
    directory.add_entry(MockEntry {
        dn: format!("uid=bob,ou=contractors,{TEST_BASE}"),
        uid: "bob".to_string(),
        object_class: "inetOrgPerson".to_string(),
        bind_password: Some("builder".to_string()),
        stored_password: None,
    });
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        ServiceIdentity::Anonymous,
    );

    let missing = verify(&verifier, "mallory", "whatever").await?;
    let ambiguous = verify(&verifier, "bob", "builder").await?;

    assert!(!missing.is_found() && !missing.is_valid());
    assert!(!ambiguous.is_found() && !ambiguous.is_valid());
    Ok(())
}

/// Filter metacharacters in the identifier cannot widen the search.
#[tokio::test]
async fn test_wildcard_identifier_is_not_found() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        ServiceIdentity::Anonymous,
    );

    let verification = verify(&verifier, "*", "wonderland").await?;

    assert!(!verification.is_found());
    Ok(())
}

// ============================================================================
// Retry Behaviour
// ============================================================================

/// A connection dropped between requests is replaced without the caller noticing.
#[tokio::test]
async fn test_network_failure_on_reused_connection_retries_once() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        ServiceIdentity::Anonymous,
    );
    assert!(verify(&verifier, "alice", "wonderland").await?.is_valid());

    directory.sever_connections();
    let verification = verify(&verifier, "alice", "wonderland").await?;

    assert!(verification.is_valid());
    assert_eq!(directory.connects(), 2);
    let status = verifier.status().await?;
    assert_eq!(status.retries, 1);
    assert!(status.connected);
    Ok(())
}

#[tokio::test]
async fn test_network_failure_on_fresh_connection_is_not_retried() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    directory.fail_next_search(DirectoryError::Network("reset".to_string()));
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        ServiceIdentity::Anonymous,
    );

    let result = verify(&verifier, "alice", "wonderland").await;

    assert!(matches!(result, Err(AuthError::DirectoryConnection(_))));
    assert_eq!(directory.connects(), 1);
    assert!(!verifier.status().await?.connected);
    Ok(())
}

/// The retry is the only one: a second network failure is surfaced.
#[tokio::test]
async fn test_network_failure_on_retry_is_surfaced() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        ServiceIdentity::Anonymous,
    );
    verify(&verifier, "alice", "wonderland").await?;

    directory.fail_next_search(DirectoryError::Network("reset".to_string()));
    directory.fail_next_search(DirectoryError::Network("reset".to_string()));
    let result = verify(&verifier, "alice", "wonderland").await;

    assert!(matches!(result, Err(AuthError::DirectoryConnection(_))));
    assert_eq!(directory.connects(), 2);
    Ok(())
}

/// Soft outcomes never trigger a retry.
#[tokio::test]
async fn test_rejection_is_not_retried() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        ServiceIdentity::Anonymous,
    );

    verify(&verifier, "alice", "looking-glass").await?;
    verify(&verifier, "mallory", "whatever").await?;

    assert_eq!(directory.connects(), 1);
    assert_eq!(directory.searches(), 2);
    assert_eq!(verifier.status().await?.retries, 0);
    Ok(())
}

// ============================================================================
// Bound Identity
// ============================================================================

#[tokio::test]
async fn test_delegated_bind_restores_admin_identity() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        admin_identity(),
    );

    for secret in ["wonderland", "looking-glass"] {
        verify(&verifier, "alice", secret).await?;
        assert_eq!(directory.bound_identity().as_deref(), Some(ADMIN_DN));
    }
    Ok(())
}

#[tokio::test]
async fn test_delegated_bind_restores_anonymous_identity() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        ServiceIdentity::Anonymous,
    );

    for secret in ["wonderland", "looking-glass"] {
        verify(&verifier, "alice", secret).await?;
        assert_eq!(directory.bound_identity().as_deref(), Some(""));
    }
    Ok(())
}

#[tokio::test]
async fn test_client_side_leaves_identity_untouched() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    let verifier = spawn(&directory, VerificationStrategy::ClientSide, admin_identity());

    verify(&verifier, "alice", "wonderland").await?;
    verify(&verifier, "alice", "looking-glass").await?;

    // Only the service bind when the connection was opened
    assert_eq!(directory.bind_log(), vec![ADMIN_DN.to_string()]);
    assert_eq!(directory.bound_identity().as_deref(), Some(ADMIN_DN));
    Ok(())
}

/// Failing to restore the identity tears the connection down.
#[tokio::test]
async fn test_identity_restore_failure_is_protocol_error() -> Result<(), anyhow::Error> {
    let directory = populated_directory()?;
    let verifier = spawn(
        &directory,
        VerificationStrategy::DelegatedBind,
        ServiceIdentity::Anonymous,
    );
    directory.fail_identity_restore(true);

    let result = verify(&verifier, "alice", "wonderland").await;

    assert!(matches!(result, Err(AuthError::DirectoryProtocol(_))));
    assert_eq!(directory.closes(), 1);
    assert_eq!(directory.connects(), 1);
    Ok(())
}

/// A stored hash we cannot interpret is a protocol error and the connection is discarded.
#[tokio::test]
async fn test_unsupported_stored_hash_discards_connection() -> Result<(), anyhow::Error> {
    let directory = MockDirectory::new(TEST_BASE);
    directory.add_user_with_stored_password("carol", "{SSHA}c2FsdGVkaGFzaA==");
    let verifier = spawn(
        &directory,
        VerificationStrategy::ClientSide,
        ServiceIdentity::Anonymous,
    );

    let result = verify(&verifier, "carol", "whatever").await;

    assert!(matches!(result, Err(AuthError::DirectoryProtocol(_))));
    assert_eq!(directory.closes(), 1);
    let status = verifier.status().await?;
    assert!(!status.connected);
    assert_eq!(status.retries, 0);
    Ok(())
}
