//! `VerifierActor` - sole owner of the directory connection.
//!
//! # Connection lifecycle
//!
//! ```text
//! Disconnected ──connect──▶ Connected ⇄ Verifying
//!      ▲                                   │
//!      └──────── teardown on failure ──────┘
//! ```
//!
//! A request that hits a network failure on a connection reused from an
//! earlier request gets one more attempt on a fresh connection. A failure on
//! a connection opened for the request itself is reported directly.

use super::messages::{VerifierMessage, VerifierStatus};
use crate::directory::{DirectoryConnection, DirectoryConnector};
use crate::errors::AuthError;
use crate::observability::hash_for_correlation;
use crate::observability::metrics::{
    record_directory_connect, record_directory_retry, record_verification,
};
use crate::services::{DirectoryAuthenticator, Verification};
use common::secret::SecretString;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Handle to the `VerifierActor`.
#[derive(Clone)]
pub struct VerifierActorHandle {
    sender: mpsc::Sender<VerifierMessage>,
    cancel_token: CancellationToken,
}

impl VerifierActorHandle {
    /// Spawn the actor and return a handle plus its task.
    ///
    /// `queue_depth` bounds how many requests may wait behind the one being
    /// served; values below 1 are raised to 1.
    pub fn spawn(
        connector: Arc<dyn DirectoryConnector>,
        authenticator: DirectoryAuthenticator,
        queue_depth: usize,
    ) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let cancel_token = CancellationToken::new();

        let actor = VerifierActor::new(receiver, cancel_token.clone(), connector, authenticator);
        let task = tokio::spawn(actor.run());

        (
            Self {
                sender,
                cancel_token,
            },
            task,
        )
    }

    /// Verify `identifier`/`secret`, waiting as long as it takes.
    pub async fn submit(
        &self,
        identifier: String,
        secret: SecretString,
    ) -> Result<Verification, AuthError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(VerifierMessage::Verify {
                identifier,
                secret,
                respond_to: tx,
            })
            .await
            .map_err(|e| AuthError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| AuthError::Internal(format!("response receive failed: {e}")))?
    }

    /// Like [`submit`](Self::submit), but give up after `deadline`.
    ///
    /// The deadline covers both waiting for queue space and waiting for the
    /// reply. A request abandoned while still queued is never sent to the
    /// directory.
    pub async fn submit_within(
        &self,
        identifier: String,
        secret: SecretString,
        deadline: Duration,
    ) -> Result<Verification, AuthError> {
        tokio::time::timeout(deadline, self.submit(identifier, secret))
            .await
            .map_err(|_| AuthError::DeadlineExceeded)?
    }

    /// Get the current actor status.
    pub async fn status(&self) -> Result<VerifierStatus, AuthError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(VerifierMessage::GetStatus { respond_to: tx })
            .await
            .map_err(|e| AuthError::Internal(format!("channel send failed: {e}")))?;

        rx.await
            .map_err(|e| AuthError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the actor; the held connection is closed on the way out.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionOrigin {
    /// Carried over from an earlier request.
    Reused,
    /// Opened for the current request.
    Fresh,
}

/// The `VerifierActor` implementation.
pub struct VerifierActor {
    receiver: mpsc::Receiver<VerifierMessage>,
    cancel_token: CancellationToken,
    connector: Arc<dyn DirectoryConnector>,
    authenticator: DirectoryAuthenticator,
    connection: Option<Box<dyn DirectoryConnection>>,
    status: VerifierStatus,
}

impl VerifierActor {
    fn new(
        receiver: mpsc::Receiver<VerifierMessage>,
        cancel_token: CancellationToken,
        connector: Arc<dyn DirectoryConnector>,
        authenticator: DirectoryAuthenticator,
    ) -> Self {
        Self {
            receiver,
            cancel_token,
            connector,
            authenticator,
            connection: None,
            status: VerifierStatus::default(),
        }
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "ldap_auth.actor.verifier")]
    async fn run(mut self) {
        info!(target: "ldap_auth.actor.verifier", "VerifierActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "ldap_auth.actor.verifier",
                        "VerifierActor received cancellation signal"
                    );
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => self.handle_message(message).await,
                        None => {
                            info!(
                                target: "ldap_auth.actor.verifier",
                                "VerifierActor channel closed, exiting"
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.teardown().await;

        info!(
            target: "ldap_auth.actor.verifier",
            requests_served = self.status.requests_served,
            requests_skipped = self.status.requests_skipped,
            connects = self.status.connects,
            retries = self.status.retries,
            "VerifierActor stopped"
        );
    }

    async fn handle_message(&mut self, message: VerifierMessage) {
        match message {
            VerifierMessage::Verify {
                identifier,
                secret,
                respond_to,
            } => {
                if respond_to.is_closed() {
                    debug!(
                        target: "ldap_auth.actor.verifier",
                        user = %hash_for_correlation(&identifier),
                        "Caller gone before dequeue, skipping directory round trip"
                    );
                    self.status.requests_skipped += 1;
                    let _ = respond_to.send(Err(AuthError::DeadlineExceeded));
                    return;
                }

                let start = Instant::now();
                let result = self.verify(&identifier, &secret).await;
                self.status.requests_served += 1;

                let outcome = match &result {
                    Ok(verification) => verification.outcome(),
                    Err(e) => e.kind(),
                };
                record_verification(outcome, start.elapsed());
                debug!(
                    target: "ldap_auth.actor.verifier",
                    user = %hash_for_correlation(&identifier),
                    outcome,
                    "Verification complete"
                );

                let _ = respond_to.send(result);
            }

            VerifierMessage::GetStatus { respond_to } => {
                let status = VerifierStatus {
                    connected: self.connection.is_some(),
                    ..self.status
                };
                let _ = respond_to.send(status);
            }
        }
    }

    /// Serve one request, reconnecting and retrying at most once.
    async fn verify(
        &mut self,
        identifier: &str,
        secret: &SecretString,
    ) -> Result<Verification, AuthError> {
        let mut retried = false;

        loop {
            let origin = if self.connection.is_some() {
                ConnectionOrigin::Reused
            } else {
                self.connect().await?;
                ConnectionOrigin::Fresh
            };

            let Some(conn) = self.connection.as_mut() else {
                return Err(AuthError::Internal("no directory connection".to_string()));
            };

            let error = match self
                .authenticator
                .verify(conn.as_mut(), identifier, secret)
                .await
            {
                Ok(verification) => return Ok(verification),
                Err(e) => e,
            };

            // Every failed attempt discards the connection
            self.teardown().await;

            if error.is_network() && origin == ConnectionOrigin::Reused && !retried {
                warn!(
                    target: "ldap_auth.actor.verifier",
                    error = %error,
                    "Directory connection lost, retrying on a fresh connection"
                );
                retried = true;
                self.status.retries += 1;
                record_directory_retry();
                continue;
            }

            warn!(
                target: "ldap_auth.actor.verifier",
                error = %error,
                kind = error.kind(),
                "Verification attempt failed"
            );
            return Err(error.into());
        }
    }

    /// Open a connection and bind the service identity.
    async fn connect(&mut self) -> Result<(), AuthError> {
        let mut conn = match self.connector.connect().await {
            Ok(conn) => conn,
            Err(e) => {
                warn!(target: "ldap_auth.directory", error = %e, "Failed to connect to directory");
                record_directory_connect("error");
                return Err(AuthError::DirectoryConnection(e.to_string()));
            }
        };

        if let Err(e) = self.authenticator.bind_service_identity(conn.as_mut()).await {
            warn!(target: "ldap_auth.directory", error = %e, "Service identity bind failed");
            conn.close().await;
            record_directory_connect("error");
            return Err(if e.is_network() {
                AuthError::DirectoryConnection(e.to_string())
            } else {
                AuthError::DirectoryProtocol(e.to_string())
            });
        }

        debug!(target: "ldap_auth.directory", "Directory connection ready");
        self.status.connects += 1;
        record_directory_connect("success");
        self.connection = Some(conn);
        Ok(())
    }

    async fn teardown(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.close().await;
            debug!(target: "ldap_auth.directory", "Directory connection closed");
        }
    }
}
