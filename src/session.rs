use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::models::Role;

/// SessionRecord
///
/// Server-side session state keyed by the opaque cookie token. The username
/// and role are a snapshot taken at login; request handlers re-read the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub token: String,
    pub user_id: Uuid,
    pub username: String,
    pub role: Role,
    pub expires_at: DateTime<Utc>,
}

impl SessionRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("session record is corrupt: {0}")]
    Corrupt(String),

    #[error("session store unavailable: {0}")]
    Unavailable(String),
}

/// SessionStore Trait
///
/// Persistence for sessions. `touch` moves the expiry forward on every
/// authenticated request; `destroy` is idempotent.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(&self, record: &SessionRecord) -> Result<(), SessionError>;
    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, SessionError>;
    async fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), SessionError>;
    async fn destroy(&self, token: &str) -> Result<(), SessionError>;
    /// Removes every session expired at `now`; returns how many went.
    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError>;
}

pub type SessionState = Arc<dyn SessionStore>;

// --- Postgres ---

pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    token: String,
    user_id: Uuid,
    username: String,
    role: String,
    expires_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for SessionRecord {
    type Error = SessionError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        let role = row
            .role
            .parse::<Role>()
            .map_err(|_| SessionError::Corrupt(format!("unknown role `{}`", row.role)))?;
        Ok(SessionRecord {
            token: row.token,
            user_id: row.user_id,
            username: row.username,
            role,
            expires_at: row.expires_at,
        })
    }
}

#[async_trait]
impl SessionStore for PostgresSessionStore {
    async fn create(&self, record: &SessionRecord) -> Result<(), SessionError> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, username, role, expires_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&record.token)
        .bind(record.user_id)
        .bind(&record.username)
        .bind(record.role.as_str())
        .bind(record.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, SessionError> {
        let row = sqlx::query_as::<_, SessionRow>(
            "SELECT token, user_id, username, role, expires_at FROM sessions WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        row.map(SessionRecord::try_from).transpose()
    }

    async fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), SessionError> {
        sqlx::query("UPDATE sessions SET expires_at = $1 WHERE token = $2")
            .bind(expires_at)
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn destroy(&self, token: &str) -> Result<(), SessionError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

// --- In-memory ---

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, SessionRecord>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SessionRecord>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn create(&self, record: &SessionRecord) -> Result<(), SessionError> {
        self.lock().insert(record.token.clone(), record.clone());
        Ok(())
    }

    async fn load(&self, token: &str) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.lock().get(token).cloned())
    }

    async fn touch(&self, token: &str, expires_at: DateTime<Utc>) -> Result<(), SessionError> {
        if let Some(record) = self.lock().get_mut(token) {
            record.expires_at = expires_at;
        }
        Ok(())
    }

    async fn destroy(&self, token: &str) -> Result<(), SessionError> {
        self.lock().remove(token);
        Ok(())
    }

    async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, SessionError> {
        let mut sessions = self.lock();
        let before = sessions.len();
        sessions.retain(|_, record| !record.is_expired(now));
        Ok((before - sessions.len()) as u64)
    }
}
