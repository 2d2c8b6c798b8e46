//! In-memory directory for tests.
//!
//! [`MockDirectory`] is both the connector and the backing store. Clones
//! share state, so a test can keep one clone for fault injection and
//! assertions while the actor owns another.

use super::{
    DirectoryConnection, DirectoryConnector, DirectoryEntry, DirectoryError, SearchRequest,
    IDENTIFIER_ATTRIBUTE, PASSWORD_ATTRIBUTE,
};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Result code the mock returns when identity restoration is made to fail.
pub const RESULT_UNWILLING_TO_PERFORM: u32 = 53;

/// A directory entry as stored by the mock.
#[derive(Debug, Clone)]
pub struct MockEntry {
    pub dn: String,
    pub uid: String,
    pub object_class: String,
    /// Password accepted by a simple bind as `dn`.
    pub bind_password: Option<String>,
    /// Value returned as `userPassword`.
    pub stored_password: Option<String>,
}

#[derive(Debug, Default)]
struct MockState {
    base: String,
    entries: Vec<MockEntry>,
    admin: Option<(String, String)>,
    unreachable: bool,
    generation: u64,
    fail_identity_restore: bool,
    scripted_search_failures: VecDeque<DirectoryError>,
    latency: Option<Duration>,
    connects: usize,
    searches: usize,
    closes: usize,
    bind_log: Vec<String>,
    bound_identity: Option<String>,
}

/// Scriptable in-memory directory.
#[derive(Debug, Clone, Default)]
pub struct MockDirectory {
    state: Arc<Mutex<MockState>>,
}

impl MockDirectory {
    /// Empty directory rooted at `base`.
    pub fn new(base: impl Into<String>) -> Self {
        let directory = Self::default();
        directory.lock().base = base.into();
        directory
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Accept `dn`/`password` as the service identity.
    pub fn with_admin(self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.lock().admin = Some((dn.into(), password.into()));
        self
    }

    /// Add an `inetOrgPerson` entry `uid=<uid>,<base>` that binds with `password`.
    pub fn add_user(&self, uid: &str, password: &str) -> String {
        let dn = format!("uid={uid},{}", self.lock().base);
        self.add_entry(MockEntry {
            dn: dn.clone(),
            uid: uid.to_string(),
            object_class: "inetOrgPerson".to_string(),
            bind_password: Some(password.to_string()),
            stored_password: None,
        });
        dn
    }

    /// Add an entry exposing `stored` as its `userPassword`.
    pub fn add_user_with_stored_password(&self, uid: &str, stored: &str) -> String {
        let dn = format!("uid={uid},{}", self.lock().base);
        self.add_entry(MockEntry {
            dn: dn.clone(),
            uid: uid.to_string(),
            object_class: "inetOrgPerson".to_string(),
            bind_password: None,
            stored_password: Some(stored.to_string()),
        });
        dn
    }

    pub fn add_entry(&self, entry: MockEntry) {
        self.lock().entries.push(entry);
    }

    /// Refuse new connections.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.lock().unreachable = unreachable;
    }

    /// Drop every open connection; their next operation fails with a network error.
    pub fn sever_connections(&self) {
        let mut state = self.lock();
        state.generation += 1;
        state.bound_identity = None;
    }

    /// Reject binds as the admin or anonymous identity.
    pub fn fail_identity_restore(&self, fail: bool) {
        self.lock().fail_identity_restore = fail;
    }

    /// Fail the next search with `error`. Queued failures are consumed in order.
    pub fn fail_next_search(&self, error: DirectoryError) {
        self.lock().scripted_search_failures.push_back(error);
    }

    /// Delay every operation by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    pub fn connects(&self) -> usize {
        self.lock().connects
    }

    pub fn searches(&self) -> usize {
        self.lock().searches
    }

    pub fn closes(&self) -> usize {
        self.lock().closes
    }

    /// DNs of every bind attempt, in order. Anonymous binds appear as "".
    pub fn bind_log(&self) -> Vec<String> {
        self.lock().bind_log.clone()
    }

    /// Identity of the live connection, `Some("")` when anonymous.
    pub fn bound_identity(&self) -> Option<String> {
        self.lock().bound_identity.clone()
    }

    async fn simulate_latency(&self) {
        let latency = self.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl DirectoryConnector for MockDirectory {
    async fn connect(&self) -> Result<Box<dyn DirectoryConnection>, DirectoryError> {
        self.simulate_latency().await;

        let mut state = self.lock();
        if state.unreachable {
            return Err(DirectoryError::Network("connection refused".to_string()));
        }
        state.connects += 1;
        state.bound_identity = Some(String::new());

        Ok(Box::new(MockConnection {
            directory: self.clone(),
            generation: state.generation,
            closed: false,
        }))
    }
}

struct MockConnection {
    directory: MockDirectory,
    generation: u64,
    closed: bool,
}

impl MockConnection {
    fn check_alive(&self, state: &MockState) -> Result<(), DirectoryError> {
        if self.closed || state.generation != self.generation {
            return Err(DirectoryError::Network("connection reset by peer".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryConnection for MockConnection {
    async fn search(
        &mut self,
        request: &SearchRequest,
    ) -> Result<Vec<DirectoryEntry>, DirectoryError> {
        self.directory.simulate_latency().await;

        let mut state = self.directory.lock();
        self.check_alive(&state)?;
        state.searches += 1;
        if let Some(error) = state.scripted_search_failures.pop_front() {
            if error.is_network() {
                state.generation += 1;
                state.bound_identity = None;
            }
            return Err(error);
        }

        let wants_password = request
            .attributes
            .iter()
            .any(|a| a.eq_ignore_ascii_case(PASSWORD_ATTRIBUTE));

        let entries = state
            .entries
            .iter()
            .filter(|e| {
                e.uid == request.identifier
                    && e.object_class.eq_ignore_ascii_case(&request.object_class)
                    && e.dn.ends_with(&request.base)
            })
            .map(|e| {
                let mut attributes = HashMap::new();
                attributes.insert(IDENTIFIER_ATTRIBUTE.to_string(), vec![e.uid.clone()]);
                if let (true, Some(stored)) = (wants_password, &e.stored_password) {
                    attributes.insert(PASSWORD_ATTRIBUTE.to_string(), vec![stored.clone()]);
                }
                DirectoryEntry {
                    dn: e.dn.clone(),
                    attributes,
                }
            })
            .collect();

        Ok(entries)
    }

    async fn simple_bind(&mut self, dn: &str, password: &str) -> Result<(), DirectoryError> {
        self.directory.simulate_latency().await;

        let mut state = self.directory.lock();
        self.check_alive(&state)?;
        state.bind_log.push(dn.to_string());

        let is_admin = state.admin.as_ref().is_some_and(|(admin, _)| admin == dn);
        if (dn.is_empty() || is_admin) && state.fail_identity_restore {
            return Err(DirectoryError::Protocol {
                code: RESULT_UNWILLING_TO_PERFORM,
                message: "unwilling to perform".to_string(),
            });
        }

        let accepted = if dn.is_empty() {
            password.is_empty()
        } else if let Some((_, admin_password)) = state.admin.as_ref().filter(|_| is_admin) {
            admin_password == password
        } else {
            state
                .entries
                .iter()
                .find(|e| e.dn == dn)
                .and_then(|e| e.bind_password.as_deref())
                .is_some_and(|expected| expected == password)
        };

        if !accepted {
            return Err(DirectoryError::InvalidCredentials);
        }

        state.bound_identity = Some(dn.to_string());
        Ok(())
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        let mut state = self.directory.lock();
        state.closes += 1;
        if state.generation == self.generation {
            state.bound_identity = None;
        }
    }
}
