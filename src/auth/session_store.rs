//! Session Storage
//! Mission: Track refresh-token grants so they can be revoked

use crate::auth::jwt::generate_refresh_token;
use crate::auth::models::Session;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::{debug, info};
use uuid::Uuid;

/// Default refresh token / session lifetime (7 days)
pub const DEFAULT_SESSION_TTL_SECS: i64 = 7 * 24 * 3600;

const SESSION_COLUMNS: &str =
    "id, user_id, refresh_token, user_agent, issued_at, expires_at, is_valid, last_used";

/// Refresh-token session storage with SQLite backend.
///
/// Rows are never deleted; revocation flips `is_valid`.
pub struct SessionStore {
    db_path: String,
}

impl SessionStore {
    pub fn new(db_path: &str) -> Result<Self> {
        let store = Self {
            db_path: db_path.to_string(),
        };
        store.init_db()?;
        Ok(store)
    }

    fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&self.db_path)
            .with_context(|| format!("Failed to open session database at {}", self.db_path))?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    fn init_db(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                refresh_token TEXT UNIQUE NOT NULL,
                user_agent TEXT,
                issued_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                is_valid INTEGER NOT NULL DEFAULT 1,
                last_used INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id, is_valid, expires_at);",
        )
        .context("Failed to initialize sessions table")?;
        Ok(())
    }

    /// Record a new session with a fresh refresh token
    pub fn create(
        &self,
        user_id: &Uuid,
        user_agent: Option<&str>,
        now: i64,
        ttl_secs: i64,
    ) -> Result<Session> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id: *user_id,
            refresh_token: generate_refresh_token(),
            user_agent: user_agent.map(str::to_string),
            issued_at: now,
            expires_at: now + ttl_secs,
            is_valid: true,
            last_used: now,
        };

        let conn = self.connect()?;
        conn.execute(
            "INSERT INTO sessions (id, user_id, refresh_token, user_agent, issued_at, expires_at, is_valid, last_used)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                session.id.to_string(),
                session.user_id.to_string(),
                session.refresh_token,
                session.user_agent,
                session.issued_at,
                session.expires_at,
                session.last_used,
            ],
        )
        .context("Failed to insert session")?;

        debug!("Session {} opened for user {}", session.id, session.user_id);
        Ok(session)
    }

    /// Look up a session that is still valid and unexpired as of `now`
    pub fn find_active(&self, refresh_token: &str, now: i64) -> Result<Option<Session>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions
             WHERE refresh_token = ?1 AND is_valid = 1 AND expires_at > ?2"
        );
        conn.query_row(&sql, params![refresh_token, now], session_from_row)
            .optional()
            .context("Failed to look up session")
    }

    /// Update the last-used timestamp. Expiry is left untouched.
    pub fn touch(&self, session_id: &Uuid, now: i64) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "UPDATE sessions SET last_used = ?2 WHERE id = ?1",
            params![session_id.to_string(), now],
        )
        .context("Failed to update session last_used")?;
        Ok(())
    }

    /// Invalidate the session holding this refresh token. Returns whether a
    /// still-valid row was flipped.
    pub fn invalidate(&self, refresh_token: &str) -> Result<bool> {
        let conn = self.connect()?;
        let rows = conn
            .execute(
                "UPDATE sessions SET is_valid = 0 WHERE refresh_token = ?1 AND is_valid = 1",
                params![refresh_token],
            )
            .context("Failed to invalidate session")?;
        Ok(rows > 0)
    }

    /// Invalidate every session a user holds (admin revocation)
    pub fn invalidate_all_for_user(&self, user_id: &Uuid) -> Result<usize> {
        let conn = self.connect()?;
        let rows = conn
            .execute(
                "UPDATE sessions SET is_valid = 0 WHERE user_id = ?1 AND is_valid = 1",
                params![user_id.to_string()],
            )
            .context("Failed to revoke user sessions")?;

        info!("🔒 Revoked {} session(s) for user {}", rows, user_id);
        Ok(rows)
    }

    /// All sessions of a user, newest first, including invalidated ones
    pub fn list_for_user(&self, user_id: &Uuid) -> Result<Vec<Session>> {
        let conn = self.connect()?;
        let sql = format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE user_id = ?1 ORDER BY issued_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let sessions = stmt
            .query_map(params![user_id.to_string()], session_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sessions)
    }
}

fn session_from_row(row: &Row<'_>) -> rusqlite::Result<Session> {
    let parse_uuid = |idx: usize, raw: String| {
        Uuid::parse_str(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    };

    Ok(Session {
        id: parse_uuid(0, row.get(0)?)?,
        user_id: parse_uuid(1, row.get(1)?)?,
        refresh_token: row.get(2)?,
        user_agent: row.get(3)?,
        issued_at: row.get(4)?,
        expires_at: row.get(5)?,
        is_valid: row.get(6)?,
        last_used: row.get(7)?,
    })
}
