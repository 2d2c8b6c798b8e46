//! Actor that serializes all directory traffic.
//!
//! ```text
//! request tasks ──submit──▶ mpsc queue ──▶ VerifierActor ──▶ DirectoryConnection
//!        ▲                                      │
//!        └──────────── oneshot reply ───────────┘
//! ```
//!
//! # Key Design Decisions
//!
//! - **Single connection**: the actor is the only owner of the directory
//!   connection and services one request at a time, in arrival order
//! - **Reconnect and retry once**: a network failure on a connection carried
//!   over from an earlier request is retried on a fresh connection
//! - **Caller deadlines**: callers race their deadline against enqueue and
//!   reply; requests whose caller already gave up are skipped at dequeue
//!
//! # Modules
//!
//! - [`messages`] - Message types for actor communication
//! - [`verifier`] - `VerifierActor` and its handle

pub mod messages;
pub mod verifier;

pub use messages::*;
pub use verifier::{VerifierActor, VerifierActorHandle};
