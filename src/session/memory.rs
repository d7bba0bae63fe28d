//! In-process session backend.
//!
//! One mutex guards the whole map, so the read-touch-or-destroy sequence of
//! every operation runs as a unit. Records vanish when the process exits.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info};

use super::{Session, SessionError, SessionStore, new_session_id};
use crate::clock::Clock;

#[derive(Debug)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, Session>>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            timeout,
            clock,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, Session>>, SessionError> {
        self.sessions.lock().map_err(|e| {
            error!("Session map lock poisoned: {}", e);
            SessionError::Poisoned
        })
    }

    /// Looks up `id` under the lock, dropping it if it has expired by `now`.
    fn live<'a>(
        sessions: &'a mut HashMap<String, Session>,
        id: &str,
        now: SystemTime,
    ) -> Option<&'a mut Session> {
        if sessions.get(id)?.is_expired(now) {
            if let Some(expired) = sessions.remove(id) {
                info!(session = id, identity = %expired.identity, "Session expired");
            }
            return None;
        }

        sessions.get_mut(id)
    }
}

impl SessionStore for MemoryStore {
    fn create(&self, identity: &str) -> Result<Session, SessionError> {
        let mut sessions = self.lock()?;
        let now = self.clock.now();

        loop {
            let id = new_session_id();
            if let Entry::Vacant(slot) = sessions.entry(id.clone()) {
                let session = Session::new(id, identity, now, self.timeout);
                slot.insert(session.clone());
                info!(session = %session.id, identity, "Created session");
                return Ok(session);
            }
        }
    }

    fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        if id.is_empty() {
            return Ok(None);
        }

        let mut sessions = self.lock()?;
        let now = self.clock.now();

        Ok(Self::live(&mut sessions, id, now).map(|session| {
            session.touch(now, self.timeout);
            session.clone()
        }))
    }

    fn destroy(&self, id: &str) -> Result<bool, SessionError> {
        let removed = self.lock()?.remove(id);

        if let Some(session) = &removed {
            info!(session = id, identity = %session.identity, "Destroyed session");
        }
        Ok(removed.is_some())
    }

    fn set_value(&self, id: &str, key: &str, value: &str) -> Result<bool, SessionError> {
        let mut sessions = self.lock()?;
        let now = self.clock.now();

        match Self::live(&mut sessions, id, now) {
            Some(session) => {
                session.set(key, value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn sweep(&self) -> Result<usize, SessionError> {
        let mut sessions = self.lock()?;
        let now = self.clock.now();

        let before = sessions.len();
        sessions.retain(|_, session| !session.is_expired(now));
        let removed = before - sessions.len();

        debug!(removed, remaining = sessions.len(), "Swept in-memory sessions");
        Ok(removed)
    }

    fn active_count(&self) -> Result<usize, SessionError> {
        self.sweep()?;
        Ok(self.lock()?.len())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use std::time::UNIX_EPOCH;

    fn store() -> (MemoryStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(UNIX_EPOCH + Duration::from_secs(1_700_000_000)));
        let store = MemoryStore::new(Duration::from_secs(60), clock.clone());
        (store, clock)
    }

    #[test]
    fn deadline_itself_is_still_live() {
        let (store, clock) = store();
        let session = store.create("alice").unwrap();

        clock.advance(Duration::from_secs(60));
        assert!(store.validate(&session.id).unwrap(), "deadline itself is still live");

        clock.advance(Duration::from_secs(61));
        assert!(!store.validate(&session.id).unwrap());
    }

    #[test]
    fn set_value_does_not_touch() {
        let (store, clock) = store();
        let session = store.create("alice").unwrap();

        clock.advance(Duration::from_secs(30));
        assert!(store.set_value(&session.id, "theme", "dark").unwrap());

        let snapshot = store.lock().unwrap().get(&session.id).cloned().unwrap();
        assert_eq!(snapshot.get("theme"), Some("dark"));
        assert_eq!(snapshot.expires_at, session.expires_at);
        assert_eq!(snapshot.last_accessed, session.last_accessed);
    }
}
