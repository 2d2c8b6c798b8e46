//! HTTP routes for the LDAP auth service.
//!
//! Defines the Axum router, application state and connection timeouts.

use crate::actors::VerifierActorHandle;
use crate::config::Config;
use crate::handlers;
use crate::services::TokenMinter;
use axum::{
    http::{header::CONTENT_TYPE, Method, StatusCode},
    routing::post,
    Router,
};
use hyper_util::rt::{TokioExecutor, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Service configuration.
    pub config: Arc<Config>,

    /// Handle to the verification actor.
    pub verifier: VerifierActorHandle,

    /// Token signer.
    pub minter: TokenMinter,
}

/// Build the application routes.
///
/// Creates an Axum router with:
/// - `POST /` - Token request from the conferencing server
/// - CORS for any origin (POST, `Content-Type`)
/// - TraceLayer for request logging
pub fn build_routes(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([CONTENT_TYPE]);

    Router::new()
        .route(
            "/",
            post(handlers::handle_auth_request).options(|| async { StatusCode::OK }),
        )
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Apply connection timeouts to the server's HTTP builder.
///
/// The header read timer also runs while an HTTP/1 connection waits for its
/// next request, so it bounds idle keep-alive connections too. HTTP/2
/// connections are pinged every `idle_timeout` and closed when the peer
/// stops answering.
pub fn configure_http(
    builder: &mut Builder<TokioExecutor>,
    header_read_timeout: Duration,
    idle_timeout: Duration,
) {
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(header_read_timeout);
    builder
        .http2()
        .timer(TokioTimer::new())
        .keep_alive_interval(idle_timeout);
}
