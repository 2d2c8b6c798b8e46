use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// Errors surfaced to request handlers.
///
/// Raw directory and signing-library failures are classified into these
/// kinds before they leave the actor or the token service; the gateway
/// only ever translates them into status codes.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The directory connection is unusable (network-class).
    #[error("Directory connection error: {0}")]
    DirectoryConnection(String),

    /// The directory answered, but not in a way we can use.
    #[error("Directory protocol error: {0}")]
    DirectoryProtocol(String),

    /// Token signing failed.
    #[error("Signing error: {0}")]
    Signing(String),

    /// The caller's deadline expired before the verifier replied.
    #[error("Verification deadline exceeded")]
    DeadlineExceeded,

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not authorised")]
    NotAuthorised,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Bounded label for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::DirectoryConnection(_) => "directory_connection",
            AuthError::DirectoryProtocol(_) => "directory_protocol",
            AuthError::Signing(_) => "signing",
            AuthError::DeadlineExceeded => "deadline",
            AuthError::BadRequest(_) => "bad_request",
            AuthError::NotAuthorised => "not_authorised",
            AuthError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AuthError::DirectoryConnection(_)
            | AuthError::DirectoryProtocol(_)
            | AuthError::DeadlineExceeded
            | AuthError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            AuthError::Signing(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Couldn't generate token",
            ),
            AuthError::BadRequest(_) => (StatusCode::BAD_REQUEST, "Bad request"),
            AuthError::NotAuthorised => (StatusCode::UNAUTHORIZED, "Not authorised"),
        };

        (status, message).into_response()
    }
}
