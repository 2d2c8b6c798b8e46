//! LDAP Auth Service
//!
//! Entry point for the token service consulted by the conferencing server.
//! Verifies user credentials against LDAP and answers with a signed room token.

use axum_server::tls_rustls::RustlsConfig;
use clap::Parser;
use ldap_auth_service::actors::VerifierActorHandle;
use ldap_auth_service::config::Config;
use ldap_auth_service::directory::ldap::LdapConnector;
use ldap_auth_service::observability::metrics::init_metrics_recorder;
use ldap_auth_service::routes::{self, AppState};
use ldap_auth_service::services::{DirectoryAuthenticator, TokenMinter};
use ldap_auth_service::tls::{self, CertificateProvider, FileCertificateProvider};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Time given to in-flight requests once a shutdown signal arrives.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Time a client has to send a complete request head.
const HEADER_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Keep-alive limit for connections with no request in flight.
const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Parser)]
#[command(name = "ldap-auth", version, about)]
struct Args {
    /// Data directory holding galene-ldap.json, cert.pem and key.pem
    #[arg(long, value_name = "DIRECTORY", default_value = ".")]
    data: PathBuf,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Initialize tracing
    let default_filter = if args.debug {
        "ldap_auth=debug,tower_http=debug"
    } else {
        "ldap_auth=info,tower_http=info"
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting LDAP auth service");

    // Load configuration
    let config = Config::from_data_dir(&args.data).map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    let signing_key = config.signing_key().map_err(|e| {
        error!("Failed to parse signing key: {}", e);
        e
    })?;

    info!(
        ldap_server = %config.ldap_server,
        http_address = %config.http_address,
        algorithm = signing_key.algorithm().as_str(),
        client_side_validate = config.ldap_client_side_validate,
        groups = config.groups.len(),
        "Configuration loaded successfully"
    );

    if let Some(metrics_address) = &config.metrics_address {
        let metrics_address: SocketAddr = metrics_address.parse().map_err(|e| {
            error!("Invalid metrics address: {}", e);
            e
        })?;
        init_metrics_recorder(metrics_address).map_err(|e| {
            error!("{}", e);
            e
        })?;
        info!("Metrics available on {}", metrics_address);
    }

    let addr: SocketAddr = config.http_address.parse().map_err(|e| {
        error!("Invalid HTTP address: {}", e);
        e
    })?;

    // The actor owns the only directory connection
    let connector = Arc::new(LdapConnector::new(
        config.ldap_server.clone(),
        config.ldap_timeout(),
    ));
    let (verifier, verifier_task) = VerifierActorHandle::spawn(
        connector,
        DirectoryAuthenticator::from_config(&config),
        config.verifier_queue_depth,
    );

    let minter = TokenMinter::new(
        Arc::new(signing_key),
        config.issuer.clone(),
        config.default_permissions.clone(),
    );

    let insecure = config.insecure;
    let state = Arc::new(AppState {
        config: Arc::new(config),
        verifier: verifier.clone(),
        minter,
    });
    let app = routes::build_routes(state);

    let handle = axum_server::Handle::new();
    tokio::spawn({
        let handle = handle.clone();
        async move {
            shutdown_signal().await;
            handle.graceful_shutdown(Some(SHUTDOWN_GRACE));
        }
    });

    if insecure {
        warn!("Serving plain HTTP on {}", addr);
        let mut server = axum_server::bind(addr).handle(handle);
        routes::configure_http(server.http_builder(), HEADER_READ_TIMEOUT, IDLE_TIMEOUT);
        server.serve(app.into_make_service()).await?;
    } else {
        let provider = Arc::new(FileCertificateProvider::from_data_dir(&args.data));
        if let Err(e) = provider.current() {
            warn!("TLS certificate not available yet: {}", e);
        }
        let rustls_config = RustlsConfig::from_config(Arc::new(tls::server_config(provider)?));

        info!("LDAP auth service listening on {}", addr);
        let mut server = axum_server::bind_rustls(addr, rustls_config).handle(handle);
        routes::configure_http(server.http_builder(), HEADER_READ_TIMEOUT, IDLE_TIMEOUT);
        server.serve(app.into_make_service()).await?;
    }

    verifier.cancel();
    if let Err(e) = verifier_task.await {
        error!("Verifier task failed: {}", e);
    }

    info!("LDAP auth service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
