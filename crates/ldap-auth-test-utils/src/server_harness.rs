//! Test gateway harness for end-to-end tests
//!
//! Provides TestGateway: the real router and verifier actor wired to an
//! in-memory directory, driven request by request without a listener.

use crate::crypto_fixtures::HS256_JWK;
use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, HeaderMap, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use ldap_auth_service::actors::VerifierActorHandle;
use ldap_auth_service::config::Config;
use ldap_auth_service::crypto::SigningKey;
use ldap_auth_service::directory::mock::MockDirectory;
use ldap_auth_service::routes::{self, AppState};
use ldap_auth_service::services::{DirectoryAuthenticator, TokenMinter};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tower::ServiceExt;

/// Directory base used by the harness.
pub const TEST_BASE: &str = "dc=example,dc=org";

/// Group configured by [`TestGateway::default_config`].
pub const TEST_GROUP: &str = "public";

/// Location inside [`TEST_GROUP`].
pub const TEST_LOCATION: &str = "https://galene.example.org/group/public/";

/// Response captured from the router.
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    /// Value of the `Content-Type` header, if present.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }
}

/// Test harness for driving the gateway in integration tests
///
/// # Example
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_valid_credentials_issue_token() -> Result<()> {
///     let gateway = TestGateway::spawn().await?;
///     gateway.directory().add_user("alice", "secret");
///
///     let response = gateway.request_token("alice", "secret", TEST_LOCATION).await?;
///
///     assert_eq!(response.status, StatusCode::OK);
///     Ok(())
/// }
/// ```
pub struct TestGateway {
    app: Router,
    directory: MockDirectory,
    state: Arc<AppState>,
    _verifier_task: JoinHandle<()>,
}

impl TestGateway {
    /// Configuration document used by [`spawn`](Self::spawn): an HS256 key,
    /// one group, fallback disabled.
    pub fn default_config() -> Value {
        let key: Value = serde_json::from_str(HS256_JWK).expect("fixture JWK must be valid JSON");
        json!({
            "groups": [TEST_GROUP],
            "insecure": true,
            "key": key,
            "ldapServer": "ldap://directory.invalid:389",
            "ldapBase": TEST_BASE,
        })
    }

    /// Spawn with [`default_config`](Self::default_config) and an empty directory.
    pub async fn spawn() -> Result<Self, anyhow::Error> {
        Self::spawn_with(Self::default_config(), MockDirectory::new(TEST_BASE)).await
    }

    /// Spawn with `overrides` merged over the default configuration.
    pub async fn spawn_with_overrides(overrides: Value) -> Result<Self, anyhow::Error> {
        let mut config = Self::default_config();
        if let (Some(target), Value::Object(extra)) = (config.as_object_mut(), overrides) {
            target.extend(extra);
        }
        Self::spawn_with(config, MockDirectory::new(TEST_BASE)).await
    }

    /// Spawn with an explicit configuration document and directory.
    pub async fn spawn_with(config: Value, directory: MockDirectory) -> Result<Self, anyhow::Error> {
        let config = Config::from_json(&config.to_string())
            .map_err(|e| anyhow::anyhow!("Failed to load test configuration: {}", e))?;

        let signing_key = config
            .signing_key()
            .map_err(|e| anyhow::anyhow!("Failed to parse test signing key: {}", e))?;

        let (verifier, verifier_task) = VerifierActorHandle::spawn(
            Arc::new(directory.clone()),
            DirectoryAuthenticator::from_config(&config),
            config.verifier_queue_depth,
        );

        let minter = TokenMinter::new(
            Arc::new(signing_key),
            config.issuer.clone(),
            config.default_permissions.clone(),
        );

        let state = Arc::new(AppState {
            config: Arc::new(config),
            verifier,
            minter,
        });
        let app = routes::build_routes(Arc::clone(&state));

        Ok(Self {
            app,
            directory,
            state,
            _verifier_task: verifier_task,
        })
    }

    /// The directory behind the verifier; clones share state.
    pub fn directory(&self) -> &MockDirectory {
        &self.directory
    }

    /// The router, for serving over a real listener.
    pub fn router(&self) -> Router {
        self.app.clone()
    }

    pub fn verifier(&self) -> &VerifierActorHandle {
        &self.state.verifier
    }

    pub fn config(&self) -> &Config {
        &self.state.config
    }

    /// Key tokens are signed with.
    pub fn signing_key(&self) -> &SigningKey {
        self.state.minter.signing_key()
    }

    /// Send an arbitrary request through the router.
    pub async fn send(&self, request: Request<Body>) -> Result<TestResponse, anyhow::Error> {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .map_err(|e| anyhow::anyhow!("Router error: {}", e))?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read response body: {}", e))?
            .to_bytes();

        Ok(TestResponse {
            status,
            headers,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }

    /// POST `body` to `/`, with `content_type` if given.
    pub async fn post(
        &self,
        content_type: Option<&str>,
        body: impl Into<Body>,
    ) -> Result<TestResponse, anyhow::Error> {
        let mut builder = Request::builder().method(Method::POST).uri("/");
        if let Some(content_type) = content_type {
            builder = builder.header(CONTENT_TYPE, content_type);
        }
        let request = builder
            .body(body.into())
            .map_err(|e| anyhow::anyhow!("Failed to build request: {}", e))?;
        self.send(request).await
    }

    /// POST a well-formed token request.
    pub async fn request_token(
        &self,
        username: &str,
        password: &str,
        location: &str,
    ) -> Result<TestResponse, anyhow::Error> {
        let body = json!({
            "username": username,
            "password": password,
            "location": location,
        });
        self.post(Some("application/json"), body.to_string()).await
    }
}
