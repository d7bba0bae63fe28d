//! Server-side sessions with a sliding expiry.
//!
//! A session is created for an identity, and every successful lookup pushes
//! its deadline forward by the store's timeout. A lookup that finds the
//! deadline already passed destroys the record and reports no session;
//! nothing brings a destroyed session back.
//!
//! Two backends implement [`SessionStore`]:
//!
//! - **`memory`**: a mutex-guarded map that lives as long as the process
//! - **`durable`**: a SQLite table indexed by expiry, surviving restarts and
//!   shared by every worker process opening the same file
//!
//! Callers always receive [`Session`] snapshots, never live handles.

pub mod durable;
pub mod memory;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::clock::Clock;
use crate::config::{SessionBackend, SessionConfig};

pub use durable::DurableStore;
pub use memory::MemoryStore;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session storage failed: {0}")]
    Storage(String),

    #[error("session record could not be decoded: {0}")]
    Codec(String),

    #[error("session store lock poisoned")]
    Poisoned,
}

impl From<sqlx::Error> for SessionError {
    fn from(e: sqlx::Error) -> Self {
        SessionError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for SessionError {
    fn from(e: serde_json::Error) -> Self {
        SessionError::Codec(e.to_string())
    }
}

/// Snapshot of one session record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: String,
    /// Who the session belongs to, typically a username
    pub identity: String,
    pub created_at: SystemTime,
    pub last_accessed: SystemTime,
    /// Always `last_accessed + timeout`
    pub expires_at: SystemTime,
    pub data: HashMap<String, String>,
}

impl Session {
    pub(crate) fn new(id: String, identity: &str, now: SystemTime, timeout: Duration) -> Self {
        Self {
            id,
            identity: identity.to_string(),
            created_at: now,
            last_accessed: now,
            expires_at: now + timeout,
            data: HashMap::new(),
        }
    }

    pub fn is_expired(&self, now: SystemTime) -> bool {
        now > self.expires_at
    }

    pub(crate) fn touch(&mut self, now: SystemTime, timeout: Duration) {
        self.last_accessed = now;
        self.expires_at = now + timeout;
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(|v| v.as_str())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }
}

/// Keyed session storage with a sliding TTL.
///
/// Each operation on a given id is atomic with respect to every other
/// operation on the same store, including across threads. Operations may
/// block on I/O and must not be called from an async task; the server runs
/// them on the blocking pool.
pub trait SessionStore: Send + Sync {
    /// Allocates a fresh session for `identity`.
    fn create(&self, identity: &str) -> Result<Session, SessionError>;

    /// Returns the live session and refreshes its deadline.
    ///
    /// Unknown, empty and expired ids all yield `None`; an expired record is
    /// removed on the way out.
    fn get(&self, id: &str) -> Result<Option<Session>, SessionError>;

    /// Removes the session. Returns whether it existed.
    fn destroy(&self, id: &str) -> Result<bool, SessionError>;

    /// Same as `get(id).is_some()`, with the same touch-or-destroy effect.
    fn validate(&self, id: &str) -> Result<bool, SessionError> {
        Ok(self.get(id)?.is_some())
    }

    /// Stores one payload entry on a live session without touching it.
    /// Returns false if the session is absent or expired.
    fn set_value(&self, id: &str, key: &str, value: &str) -> Result<bool, SessionError>;

    /// Removes every expired record, returning how many were dropped.
    fn sweep(&self) -> Result<usize, SessionError>;

    /// Number of live sessions after a sweep.
    fn active_count(&self) -> Result<usize, SessionError>;

    fn timeout(&self) -> Duration;
}

/// Opens the backend selected in `cfg`.
pub async fn open_store(
    cfg: &SessionConfig,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn SessionStore>, SessionError> {
    let timeout = Duration::from_secs(cfg.timeout_secs);

    let store: Arc<dyn SessionStore> = match cfg.backend {
        SessionBackend::Memory => Arc::new(MemoryStore::new(timeout, clock)),
        SessionBackend::Durable => Arc::new(DurableStore::open(&cfg.db_path, timeout, clock).await?),
    };

    tracing::info!(
        backend = ?cfg.backend,
        timeout_secs = cfg.timeout_secs,
        "Session store ready"
    );
    Ok(store)
}

/// Periodically drops expired sessions so abandoned records don't pile up.
pub async fn run_sweeper(store: Arc<dyn SessionStore>, every: Duration) {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;

        let store = store.clone();
        match tokio::task::spawn_blocking(move || store.sweep()).await {
            Ok(Ok(0)) => {}
            Ok(Ok(removed)) => tracing::info!(removed, "Swept expired sessions"),
            Ok(Err(e)) => tracing::warn!(error = %e, "Session sweep failed"),
            Err(e) => tracing::error!(error = %e, "Session sweep task panicked"),
        }
    }
}

pub(crate) fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
