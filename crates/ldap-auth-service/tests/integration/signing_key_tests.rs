//! Signing keys as loaded from the configuration document.
//!
//! Key problems must stop the service at startup, and a loaded key must
//! produce tokens that only it verifies.

use jsonwebtoken::{Algorithm, DecodingKey};
use ldap_auth_service::config::{Config, ConfigError};
use ldap_auth_service::services::TokenMinter;
use ldap_auth_test_utils::*;
use serde_json::{json, Value};
use std::sync::Arc;

fn config_with_key(key: Value) -> Result<Config, anyhow::Error> {
    let mut document = TestGateway::default_config();
    if let Some(members) = document.as_object_mut() {
        members.insert("key".to_string(), key);
    }
    Ok(Config::from_json(&document.to_string())?)
}

fn es256_with(member: &str, value: &str) -> Result<Value, anyhow::Error> {
    let mut key: Value = serde_json::from_str(ES256_JWK)?;
    if let Some(members) = key.as_object_mut() {
        members.insert(member.to_string(), Value::String(value.to_string()));
    }
    Ok(key)
}

#[test]
fn test_every_fixture_key_loads() -> Result<(), anyhow::Error> {
    for (alg, jwk) in ALL_JWKS {
        let config = config_with_key(serde_json::from_str(jwk)?)?;
        let key = config.signing_key()?;
        assert_eq!(key.algorithm().as_str(), alg);
    }
    Ok(())
}

#[test]
fn test_wrong_length_symmetric_key_rejected() -> Result<(), anyhow::Error> {
    // 32-byte material labelled HS512
    let config = config_with_key(json!({
        "kty": "oct",
        "alg": "HS512",
        "k": "ZUtxl5wJ1db-erWkLYAYCxx3d0PdFDL8f903SF8k08M",
    }))?;

    assert!(matches!(
        config.signing_key(),
        Err(ConfigError::SigningKey(_))
    ));
    Ok(())
}

#[test]
fn test_off_curve_point_rejected() -> Result<(), anyhow::Error> {
    let config = config_with_key(es256_with(
        "y",
        "AeERCfvQ-SIX8D7V-HqcRAZb8Ixyvu0wNgj_URWR8r8",
    )?)?;

    assert!(config.signing_key().is_err());
    Ok(())
}

#[test]
fn test_es256_without_private_scalar_rejected() -> Result<(), anyhow::Error> {
    let mut key: Value = serde_json::from_str(ES256_JWK)?;
    if let Some(members) = key.as_object_mut() {
        members.remove("d");
    }
    let config = config_with_key(key)?;

    assert!(config.signing_key().is_err());
    Ok(())
}

#[test]
fn test_unknown_type_or_algorithm_rejected() -> Result<(), anyhow::Error> {
    let cases = [
        json!({ "kty": "RSA", "alg": "RS256", "n": "AQAB", "e": "AQAB" }),
        json!({ "kty": "oct", "alg": "HS1024", "k": "ZUtxl5wJ1db-erWkLYAYCxx3d0PdFDL8f903SF8k08M" }),
        es256_with("crv", "P-384")?,
        json!({ "kty": "oct", "k": "ZUtxl5wJ1db-erWkLYAYCxx3d0PdFDL8f903SF8k08M" }),
    ];

    for key in cases {
        let config = config_with_key(key.clone())?;
        assert!(config.signing_key().is_err(), "accepted {key}");
    }
    Ok(())
}

/// The harness refuses to start with a key the service would refuse.
#[tokio::test]
async fn test_gateway_refuses_to_start_with_bad_key() {
    let result = TestGateway::spawn_with_overrides(json!({
        "key": { "kty": "oct", "alg": "HS256", "k": "c2hvcnQ" }
    }))
    .await;

    assert!(result.is_err());
}

#[test]
fn test_minted_token_verifies_only_under_its_key() -> Result<(), anyhow::Error> {
    let minter = TokenMinter::new(Arc::new(signing_key(HS256_JWK)), None, None);
    let permissions = vec!["present".to_string(), "message".to_string()];

    let token = minter.mint("room1", "alice", Some(&permissions))?;

    token
        .as_str()
        .assert_valid_jwt("HS256")
        .assert_for_subject("alice")
        .assert_audience("room1")
        .assert_permissions(&["present", "message"])
        .assert_lifetime(31)
        .assert_verifies_with(&DecodingKey::from_secret(&hs256_secret()), Algorithm::HS256)
        .assert_rejected_by(&DecodingKey::from_secret(&[0x5au8; 32]), Algorithm::HS256);
    Ok(())
}
