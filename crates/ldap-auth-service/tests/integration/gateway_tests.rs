//! E2E tests for the token request endpoint.
//!
//! ## Test Categories
//!
//! - **Issuance**: Valid credentials produce a signed room token
//! - **Fallback**: Unknown users and groups defer to the conferencing server
//! - **Request validation**: Malformed requests are rejected with 400
//! - **Routing**: Methods, paths and CORS
//!
//! ## Test Naming
//!
//! Tests follow the convention: `test_<feature>_<scenario>_<expected_result>`

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use jsonwebtoken::{Algorithm, DecodingKey};
use ldap_auth_test_utils::*;
use serde_json::json;
use std::time::Duration;

// ============================================================================
// Issuance Tests
// ============================================================================

/// Happy path: a directory user with the right password gets a token for the
/// requested location.
#[tokio::test]
async fn test_issuance_valid_credentials_returns_token() -> Result<(), anyhow::Error> {
    // Arrange
    let gateway = TestGateway::spawn().await?;
    gateway.directory().add_user("alice", "wonderland");

    // Act
    let response = gateway
        .request_token("alice", "wonderland", TEST_LOCATION)
        .await?;

    // Assert
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.content_type(), Some("application/jwt"));
    assert_eq!(
        response
            .headers
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("no-store")
    );

    response
        .body
        .assert_valid_jwt("HS256")
        .assert_for_subject("alice")
        .assert_audience(TEST_LOCATION)
        .assert_permissions(&["present", "message"])
        .assert_lifetime(31)
        .assert_verifies_with(gateway.signing_key().verification_key(), Algorithm::HS256)
        .assert_rejected_by(&DecodingKey::from_secret(&[7u8; 32]), Algorithm::HS256);

    Ok(())
}

/// The group name tolerates a missing trailing slash.
#[tokio::test]
async fn test_issuance_location_without_trailing_slash_returns_token(
) -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    gateway.directory().add_user("alice", "wonderland");

    let response = gateway
        .request_token(
            "alice",
            "wonderland",
            "https://galene.example.org/group/public",
        )
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    Ok(())
}

/// Configured issuer and default permissions end up in the claims.
#[tokio::test]
async fn test_issuance_configured_claims_are_applied() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn_with_overrides(json!({
        "issuer": "https://auth.example.org/",
        "defaultPermissions": ["op", "present"],
    }))
    .await?;
    gateway.directory().add_user("alice", "wonderland");

    let response = gateway
        .request_token("alice", "wonderland", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    response.body.assert_permissions(&["op", "present"]);
    let claims = common::jwt::peek_claims(&response.body)?;
    assert_eq!(claims.iss.as_deref(), Some("https://auth.example.org/"));
    Ok(())
}

/// An ES256 key signs tokens that verify under its public half.
#[tokio::test]
async fn test_issuance_es256_key_signs_verifiable_token() -> Result<(), anyhow::Error> {
    let key: serde_json::Value = serde_json::from_str(ES256_JWK)?;
    let gateway = TestGateway::spawn_with_overrides(json!({ "key": key })).await?;
    gateway.directory().add_user("alice", "wonderland");

    let response = gateway
        .request_token("alice", "wonderland", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    response
        .body
        .assert_valid_jwt("ES256")
        .assert_verifies_with(gateway.signing_key().verification_key(), Algorithm::ES256);
    Ok(())
}

/// Client-side comparison against a `{CRYPT}` hash issues a token too.
#[tokio::test]
async fn test_issuance_client_side_validation_returns_token() -> Result<(), anyhow::Error> {
    let gateway =
        TestGateway::spawn_with_overrides(json!({ "ldapClientSideValidate": true })).await?;
    let hash = pwhash::sha512_crypt::hash("wonderland")?;
    gateway
        .directory()
        .add_user_with_stored_password("alice", &format!("{{CRYPT}}{hash}"));

    let response = gateway
        .request_token("alice", "wonderland", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    assert!(gateway.directory().bind_log().is_empty());
    Ok(())
}

/// Concurrent requests share the single directory connection.
#[tokio::test]
async fn test_issuance_concurrent_requests_share_connection() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    for uid in ["alice", "bob", "carol", "dave"] {
        gateway.directory().add_user(uid, "secret");
    }

    let (a, b, c, d) = tokio::join!(
        gateway.request_token("alice", "secret", TEST_LOCATION),
        gateway.request_token("bob", "secret", TEST_LOCATION),
        gateway.request_token("carol", "secret", TEST_LOCATION),
        gateway.request_token("dave", "secret", TEST_LOCATION),
    );

    for response in [a?, b?, c?, d?] {
        assert_eq!(response.status, StatusCode::OK);
    }
    assert_eq!(gateway.directory().connects(), 1);
    Ok(())
}

// ============================================================================
// Rejection and Fallback Tests
// ============================================================================

#[tokio::test]
async fn test_rejection_wrong_password_returns_401() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    gateway.directory().add_user("alice", "wonderland");

    let response = gateway
        .request_token("alice", "looking-glass", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

/// A wrong password is a rejection even when fallback is enabled.
#[tokio::test]
async fn test_rejection_wrong_password_with_fallback_returns_401() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn_with_overrides(json!({ "passwordFallback": true })).await?;
    gateway.directory().add_user("alice", "wonderland");

    let response = gateway
        .request_token("alice", "looking-glass", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_fallback_unknown_user_returns_401() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;

    let response = gateway
        .request_token("mallory", "whatever", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn test_fallback_unknown_user_with_fallback_returns_204() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn_with_overrides(json!({ "passwordFallback": true })).await?;

    let response = gateway
        .request_token("mallory", "whatever", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
    Ok(())
}

/// Groups we do not serve never reach the directory.
#[tokio::test]
async fn test_fallback_unconfigured_group_skips_directory() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn_with_overrides(json!({ "passwordFallback": true })).await?;
    gateway.directory().add_user("alice", "wonderland");

    let response = gateway
        .request_token(
            "alice",
            "wonderland",
            "https://galene.example.org/group/private/",
        )
        .await?;

    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert_eq!(gateway.directory().connects(), 0);
    Ok(())
}

#[tokio::test]
async fn test_fallback_location_outside_groups_returns_401() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    gateway.directory().add_user("alice", "wonderland");

    let response = gateway
        .request_token("alice", "wonderland", "https://galene.example.org/stats/")
        .await?;

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(gateway.directory().searches(), 0);
    Ok(())
}

// ============================================================================
// Directory Failure Tests
// ============================================================================

#[tokio::test]
async fn test_directory_unreachable_returns_500() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    gateway.directory().add_user("alice", "wonderland");
    gateway.directory().set_unreachable(true);

    let response = gateway
        .request_token("alice", "wonderland", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    // Generic body only
    assert!(!response.body.contains("connection refused"));
    Ok(())
}

/// A directory slower than `verifyTimeout` fails the request.
#[tokio::test(start_paused = true)]
async fn test_directory_slower_than_deadline_returns_500() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn_with_overrides(json!({ "verifyTimeout": 1 })).await?;
    gateway.directory().add_user("alice", "wonderland");
    gateway.directory().set_latency(Duration::from_secs(5));

    let response = gateway
        .request_token("alice", "wonderland", TEST_LOCATION)
        .await?;

    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    Ok(())
}

// ============================================================================
// Request Validation Tests
// ============================================================================

#[tokio::test]
async fn test_validation_content_type_with_charset_accepted() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    gateway.directory().add_user("alice", "wonderland");
    let body = json!({
        "username": "alice",
        "password": "wonderland",
        "location": TEST_LOCATION,
    });

    let response = gateway
        .post(Some("Application/JSON; charset=utf-8"), body.to_string())
        .await?;

    assert_eq!(response.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn test_validation_wrong_content_type_returns_400() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    let body = json!({
        "username": "alice",
        "password": "wonderland",
        "location": TEST_LOCATION,
    });

    let plain = gateway.post(Some("text/plain"), body.to_string()).await?;
    let missing = gateway.post(None, body.to_string()).await?;

    assert_eq!(plain.status, StatusCode::BAD_REQUEST);
    assert_eq!(missing.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_validation_undecodable_body_returns_400() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;

    let response = gateway
        .post(Some("application/json"), "{\"username\": ")
        .await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn test_validation_missing_fields_return_400() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    gateway.directory().add_user("alice", "wonderland");

    let cases = [
        json!({ "username": "alice", "location": TEST_LOCATION }),
        json!({ "username": "alice", "password": "", "location": TEST_LOCATION }),
        json!({ "username": "", "password": "wonderland", "location": TEST_LOCATION }),
        json!({ "username": "alice", "password": "wonderland" }),
    ];

    for body in cases {
        let response = gateway
            .post(Some("application/json"), body.to_string())
            .await?;
        assert_eq!(response.status, StatusCode::BAD_REQUEST, "body: {body}");
    }
    assert_eq!(gateway.directory().searches(), 0);
    Ok(())
}

#[tokio::test]
async fn test_validation_unparseable_location_returns_400() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;

    let response = gateway
        .request_token("alice", "wonderland", "https://galene example/group/public/")
        .await?;

    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    Ok(())
}

// ============================================================================
// Routing Tests
// ============================================================================

#[tokio::test]
async fn test_routing_get_returns_405_with_allow() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    let request = Request::builder()
        .method(Method::GET)
        .uri("/")
        .body(Body::empty())?;

    let response = gateway.send(request).await?;

    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
    let allow = response
        .headers
        .get(header::ALLOW)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    assert!(allow.contains("POST"), "Allow header was {allow:?}");
    Ok(())
}

#[tokio::test]
async fn test_routing_other_path_returns_404() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{}"))?;

    let response = gateway.send(request).await?;

    assert_eq!(response.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn test_routing_cors_preflight_allows_any_origin() -> Result<(), anyhow::Error> {
    let gateway = TestGateway::spawn().await?;
    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/")
        .header(header::ORIGIN, "https://galene.example.org")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
        .body(Body::empty())?;

    let response = gateway.send(request).await?;

    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response
            .headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    Ok(())
}
