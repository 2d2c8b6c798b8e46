//! Message types for the verification actor.
//!
//! Requests travel over a bounded `tokio::sync::mpsc` queue; every request
//! carries a `tokio::sync::oneshot` sender that receives exactly one reply.

use crate::errors::AuthError;
use crate::services::Verification;
use common::secret::SecretString;
use tokio::sync::oneshot;

/// Messages sent to `VerifierActor`.
#[derive(Debug)]
pub enum VerifierMessage {
    /// Check a user's credentials against the directory.
    Verify {
        identifier: String,
        secret: SecretString,
        /// Response channel for the verification outcome.
        respond_to: oneshot::Sender<Result<Verification, AuthError>>,
    },

    /// Get the actor's connection state and counters.
    GetStatus {
        respond_to: oneshot::Sender<VerifierStatus>,
    },
}

/// Snapshot of the verification actor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifierStatus {
    /// Whether a directory connection is currently held.
    pub connected: bool,
    /// Requests that ran against the directory.
    pub requests_served: u64,
    /// Requests dropped because the caller stopped waiting before dequeue.
    pub requests_skipped: u64,
    /// Successful connection establishments.
    pub connects: u64,
    /// Transparent retries after a network failure on a reused connection.
    pub retries: u64,
}
