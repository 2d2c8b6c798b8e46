use crate::errors::AuthError;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::record_gateway_response;
use crate::routes::AppState;
use axum::{
    body::Bytes,
    extract::State,
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap, StatusCode, Uri,
    },
    response::{IntoResponse, Response},
};
use common::secret::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

const GROUP_PATH_PREFIX: &str = "/group/";

/// Body posted by the conferencing server.
///
/// Missing members decode as empty and are rejected afterwards.
#[derive(Debug, Deserialize)]
pub struct AuthRequest {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<SecretString>,
    #[serde(default)]
    pub location: String,
}

/// What the gateway decided to send back.
#[derive(Debug)]
enum Decision {
    Token(String),
    /// No opinion; the conferencing server applies its own policy.
    Fallback,
}

/// Handle a token request
///
/// POST /
pub async fn handle_auth_request(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match authenticate(&state, &headers, &body).await {
        Ok(Decision::Token(token)) => {
            record_gateway_response("issued");
            (
                StatusCode::OK,
                [(CONTENT_TYPE, "application/jwt"), (CACHE_CONTROL, "no-store")],
                token,
            )
                .into_response()
        }
        Ok(Decision::Fallback) => {
            record_gateway_response("fallback");
            if state.config.password_fallback {
                StatusCode::NO_CONTENT.into_response()
            } else {
                AuthError::NotAuthorised.into_response()
            }
        }
        Err(e) => {
            record_gateway_response(match &e {
                AuthError::BadRequest(_) => "bad_request",
                AuthError::NotAuthorised => "unauthorised",
                _ => "error",
            });
            e.into_response()
        }
    }
}

async fn authenticate(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Decision, AuthError> {
    let content_type = media_type(headers);
    if !content_type.eq_ignore_ascii_case("application/json") {
        warn!(target: "ldap_auth.gateway", content_type = %content_type, "Unexpected content type");
        return Err(AuthError::BadRequest("unexpected content type".to_string()));
    }

    let request: AuthRequest = serde_json::from_slice(body).map_err(|e| {
        warn!(target: "ldap_auth.gateway", error = %e, "Failed to decode request");
        AuthError::BadRequest("undecodable body".to_string())
    })?;

    let password = match request.password {
        Some(password) if !password.expose_secret().is_empty() => password,
        _ => return Err(missing_field()),
    };
    if request.username.is_empty() || request.location.is_empty() {
        return Err(missing_field());
    }

    let location: Uri = request.location.parse().map_err(|e| {
        warn!(target: "ldap_auth.gateway", error = %e, "Failed to parse location");
        AuthError::BadRequest("invalid location".to_string())
    })?;

    let Some(group) = group_name(location.path()) else {
        debug!(target: "ldap_auth.gateway", "Location is not a group");
        return Ok(Decision::Fallback);
    };
    if !state.config.is_known_group(group) {
        debug!(target: "ldap_auth.gateway", group = %group, "Group not configured");
        return Ok(Decision::Fallback);
    }

    let user = hash_for_correlation(&request.username);
    let verification = state
        .verifier
        .submit_within(
            request.username.clone(),
            password,
            state.config.verify_timeout(),
        )
        .await
        .map_err(|e| {
            warn!(target: "ldap_auth.gateway", user = %user, error = %e, "Verification failed");
            e
        })?;

    debug!(
        target: "ldap_auth.gateway",
        user = %user,
        found = verification.is_found(),
        valid = verification.is_valid(),
        "Verified credentials"
    );

    if !verification.is_found() {
        return Ok(Decision::Fallback);
    }
    if !verification.is_valid() {
        return Err(AuthError::NotAuthorised);
    }

    let token = state
        .minter
        .mint(&request.location, &request.username, None)?;

    info!(target: "ldap_auth.gateway", user = %user, group = %group, "Token issued");
    Ok(Decision::Token(token))
}

fn missing_field() -> AuthError {
    warn!(target: "ldap_auth.gateway", "Missing field in request");
    AuthError::BadRequest("missing field".to_string())
}

/// Media type without parameters, e.g. `application/json` for
/// `application/json; charset=utf-8`.
fn media_type(headers: &HeaderMap) -> &str {
    headers
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map_or("", str::trim)
}

/// `/group/<name>/` → `<name>`, with at most one trailing slash removed.
fn group_name(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(GROUP_PATH_PREFIX)?;
    Some(rest.strip_suffix('/').unwrap_or(rest))
}
