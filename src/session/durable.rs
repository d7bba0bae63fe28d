//! SQLite-backed session backend.
//!
//! Records live in one `sessions` table indexed by `expires_at`. They survive
//! restarts, and every worker process that opens the same file sees the same
//! sessions. Times are stored as unix microseconds.
//!
//! Each per-id operation is one transaction whose first statement is a write,
//! so SQLite hands out the write lock before anything is read.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sqlx::FromRow;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
};
use tokio::runtime::Handle;
use tracing::{debug, info};

use super::{Session, SessionError, SessionStore, new_session_id};
use crate::clock::Clock;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    identity TEXT NOT NULL,
    created_at INTEGER NOT NULL,
    last_accessed INTEGER NOT NULL,
    expires_at INTEGER NOT NULL,
    data TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
"#;

/// What a lookup found.
enum Lookup {
    Missing,
    Expired(Session),
    Live(Session),
}

#[derive(Debug, FromRow)]
struct SessionRow {
    id: String,
    identity: String,
    created_at: i64,
    last_accessed: i64,
    expires_at: i64,
    data: String,
}

impl TryFrom<SessionRow> for Session {
    type Error = SessionError;

    fn try_from(row: SessionRow) -> Result<Self, SessionError> {
        Ok(Session {
            id: row.id,
            identity: row.identity,
            created_at: from_micros(row.created_at),
            last_accessed: from_micros(row.last_accessed),
            expires_at: from_micros(row.expires_at),
            data: serde_json::from_str(&row.data)?,
        })
    }
}

/// A session store on a shared SQLite file.
///
/// The store keeps a handle to the runtime it was opened on and blocks on it
/// for every operation.
#[derive(Debug, Clone)]
pub struct DurableStore {
    pool: SqlitePool,
    runtime: Handle,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl DurableStore {
    /// Opens or creates the database file at `path`.
    pub async fn open<P: AsRef<Path>>(
        path: P,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, SessionError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| SessionError::Storage(e.to_string()))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        sqlx::raw_sql(SCHEMA).execute(&pool).await?;

        info!(path = %path.display(), "Opened durable session store");

        Ok(Self {
            pool,
            runtime: Handle::current(),
            timeout,
            clock,
        })
    }

    async fn insert(&self, session: &Session) -> Result<Option<Session>, SessionError> {
        let row = sqlx::query_as::<_, SessionRow>(
            r#"
            INSERT INTO sessions (id, identity, created_at, last_accessed, expires_at, data)
            VALUES (?, ?, ?, ?, ?, '{}')
            ON CONFLICT(id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(&session.id)
        .bind(&session.identity)
        .bind(micros(session.created_at))
        .bind(micros(session.last_accessed))
        .bind(micros(session.expires_at))
        .fetch_optional(&self.pool)
        .await?;

        row.map(Session::try_from).transpose()
    }

    /// Pushes a live record's deadline forward, or destroys it if expired.
    async fn touch(&self, id: &str, now: SystemTime) -> Result<Lookup, SessionError> {
        let mut tx = self.pool.begin().await?;

        let touched = sqlx::query_as::<_, SessionRow>(
            r#"
            UPDATE sessions SET last_accessed = ?, expires_at = ?
            WHERE id = ? AND expires_at >= ?
            RETURNING *
            "#,
        )
        .bind(micros(now))
        .bind(micros(now + self.timeout))
        .bind(id)
        .bind(micros(now))
        .fetch_optional(&mut *tx)
        .await?;

        let lookup = match touched {
            Some(row) => Lookup::Live(row.try_into()?),
            None => remove_expired(&mut *tx, id, now).await?,
        };

        tx.commit().await?;
        Ok(lookup)
    }

    async fn write_value(
        &self,
        id: &str,
        key: &str,
        value: &str,
        now: SystemTime,
    ) -> Result<Lookup, SessionError> {
        let mut tx = self.pool.begin().await?;

        // No-op write: the row is read while holding the write lock.
        let locked = sqlx::query_as::<_, SessionRow>(
            "UPDATE sessions SET data = data WHERE id = ? AND expires_at >= ? RETURNING *",
        )
        .bind(id)
        .bind(micros(now))
        .fetch_optional(&mut *tx)
        .await?;

        let lookup = match locked {
            Some(row) => {
                let mut session = Session::try_from(row)?;
                session.set(key, value);

                sqlx::query("UPDATE sessions SET data = ? WHERE id = ?")
                    .bind(serde_json::to_string(&session.data)?)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
                Lookup::Live(session)
            }
            None => remove_expired(&mut *tx, id, now).await?,
        };

        tx.commit().await?;
        Ok(lookup)
    }

    async fn delete(&self, id: &str) -> Result<bool, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_expired(&self, now: SystemTime) -> Result<usize, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < ?")
            .bind(micros(now))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() as usize)
    }

    async fn count(&self) -> Result<usize, SessionError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await?;
        Ok(count as usize)
    }

    fn log_expired(lookup: &Lookup) {
        if let Lookup::Expired(session) = lookup {
            info!(session = %session.id, identity = %session.identity, "Session expired");
        }
    }
}

impl SessionStore for DurableStore {
    fn create(&self, identity: &str) -> Result<Session, SessionError> {
        let now = self.clock.now();

        loop {
            let session = Session::new(new_session_id(), identity, now, self.timeout);

            if let Some(stored) = self.runtime.block_on(self.insert(&session))? {
                info!(session = %stored.id, identity, "Created session");
                return Ok(stored);
            }
        }
    }

    fn get(&self, id: &str) -> Result<Option<Session>, SessionError> {
        if id.is_empty() {
            return Ok(None);
        }

        let lookup = self.runtime.block_on(self.touch(id, self.clock.now()))?;

        Self::log_expired(&lookup);
        match lookup {
            Lookup::Live(session) => Ok(Some(session)),
            _ => Ok(None),
        }
    }

    fn destroy(&self, id: &str) -> Result<bool, SessionError> {
        let removed = self.runtime.block_on(self.delete(id))?;

        if removed {
            info!(session = id, "Destroyed session");
        }
        Ok(removed)
    }

    fn set_value(&self, id: &str, key: &str, value: &str) -> Result<bool, SessionError> {
        let lookup = self
            .runtime
            .block_on(self.write_value(id, key, value, self.clock.now()))?;

        Self::log_expired(&lookup);
        Ok(matches!(lookup, Lookup::Live(_)))
    }

    fn sweep(&self) -> Result<usize, SessionError> {
        let removed = self.runtime.block_on(self.delete_expired(self.clock.now()))?;

        debug!(removed, "Swept durable sessions");
        Ok(removed)
    }

    fn active_count(&self) -> Result<usize, SessionError> {
        self.sweep()?;
        self.runtime.block_on(self.count())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Deletes `id` if its deadline passed before `now`. Only one caller ever
/// gets the expired row back.
async fn remove_expired(
    conn: &mut SqliteConnection,
    id: &str,
    now: SystemTime,
) -> Result<Lookup, SessionError> {
    let expired = sqlx::query_as::<_, SessionRow>(
        "DELETE FROM sessions WHERE id = ? AND expires_at < ? RETURNING *",
    )
    .bind(id)
    .bind(micros(now))
    .fetch_optional(conn)
    .await?;

    match expired {
        Some(row) => Ok(Lookup::Expired(row.try_into()?)),
        None => Ok(Lookup::Missing),
    }
}

fn micros(t: SystemTime) -> i64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_micros() as i64)
        .unwrap_or(0)
}

fn from_micros(us: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_micros(us.max(0) as u64)
}
