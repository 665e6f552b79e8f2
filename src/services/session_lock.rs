// src/services/session_lock.rs

//! Per-session mutual exclusion for autosave and submit.
//!
//! `with_lock` hands the operation a working copy of the session row. The copy
//! is written back only if the operation succeeds; otherwise the stored row is
//! left exactly as it was.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;

use crate::{error::AppError, models::test_session::TestSession};

pub(crate) const SESSION_COLUMNS: &str = "id, user_id, mode, subject, question_ids, answers, \
     remaining_time, total_questions, is_submitted, score, accuracy, max_score, \
     abs_tolerance, rel_tolerance, created_at, submitted_at";

#[derive(Debug, Error)]
pub enum LockError {
    #[error("test session {0} not found")]
    NotFound(i64),

    /// The operation refused the transition; nothing was written.
    #[error(transparent)]
    Rejected(AppError),

    #[error("session storage failure: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for LockError {
    fn from(err: sqlx::Error) -> Self {
        LockError::Storage(err.to_string())
    }
}

impl From<LockError> for AppError {
    fn from(err: LockError) -> Self {
        match err {
            LockError::NotFound(id) => AppError::NotFound(format!("Test session {} not found", id)),
            LockError::Rejected(inner) => inner,
            LockError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

/// Storage that can run an operation on one session row exclusively.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Runs `operation` while holding the session's exclusive lock.
    ///
    /// * Missing session: `LockError::NotFound`, operation not called.
    /// * Operation error: rolled back, `LockError::Rejected`.
    /// * Success: the mutated session is persisted before the lock is released.
    async fn with_lock<T, F>(&self, session_id: i64, operation: F) -> Result<T, LockError>
    where
        T: Send,
        F: FnOnce(&mut TestSession) -> Result<T, AppError> + Send;
}

/// Postgres-backed store using `SELECT ... FOR UPDATE` inside a transaction.
#[derive(Clone)]
pub struct PgSessionStore {
    pool: PgPool,
}

impl PgSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionStore for PgSessionStore {
    async fn with_lock<T, F>(&self, session_id: i64, operation: F) -> Result<T, LockError>
    where
        T: Send,
        F: FnOnce(&mut TestSession) -> Result<T, AppError> + Send,
    {
        // Dropping `tx` on any early return rolls back and returns the
        // connection to the pool.
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT {} FROM test_sessions WHERE id = $1 FOR UPDATE",
            SESSION_COLUMNS
        );
        let locked = sqlx::query_as::<_, TestSession>(&query)
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(mut session) = locked else {
            tx.rollback().await?;
            return Err(LockError::NotFound(session_id));
        };

        let output = match operation(&mut session) {
            Ok(output) => output,
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!("Rollback of session {} failed: {:?}", session_id, rollback_err);
                }
                return Err(LockError::Rejected(e));
            }
        };

        sqlx::query(
            r#"
            UPDATE test_sessions SET
                answers = $1,
                remaining_time = $2,
                is_submitted = $3,
                score = $4,
                accuracy = $5,
                max_score = $6,
                abs_tolerance = $7,
                rel_tolerance = $8,
                submitted_at = $9
            WHERE id = $10
            "#,
        )
        .bind(&session.answers)
        .bind(session.remaining_time)
        .bind(session.is_submitted)
        .bind(session.score)
        .bind(session.accuracy)
        .bind(session.max_score)
        .bind(session.abs_tolerance)
        .bind(session.rel_tolerance)
        .bind(session.submitted_at)
        .bind(session_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(output)
    }
}

/// In-process store with one async mutex per session.
///
/// Same contract as [`PgSessionStore`]; useful for tests and for running the
/// session flows without a database.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<i64, Arc<tokio::sync::Mutex<TestSession>>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, session: TestSession) -> Result<(), LockError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| LockError::Storage("session map poisoned".to_string()))?;
        sessions.insert(session.id, Arc::new(tokio::sync::Mutex::new(session)));
        Ok(())
    }

    fn slot(&self, session_id: i64) -> Result<Option<Arc<tokio::sync::Mutex<TestSession>>>, LockError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| LockError::Storage("session map poisoned".to_string()))?;
        Ok(sessions.get(&session_id).cloned())
    }

    /// Snapshot of the committed state.
    pub async fn get(&self, session_id: i64) -> Option<TestSession> {
        let slot = self.slot(session_id).ok()??;
        let session = slot.lock().await;
        Some(session.clone())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn with_lock<T, F>(&self, session_id: i64, operation: F) -> Result<T, LockError>
    where
        T: Send,
        F: FnOnce(&mut TestSession) -> Result<T, AppError> + Send,
    {
        let slot = self
            .slot(session_id)?
            .ok_or(LockError::NotFound(session_id))?;

        let mut committed = slot.lock().await;
        let mut draft = committed.clone();

        let output = operation(&mut draft).map_err(LockError::Rejected)?;
        *committed = draft;

        Ok(output)
    }
}
