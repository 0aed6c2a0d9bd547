use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    stats::{AggregateStats, AttemptRecord, RecentSession, StatsAccumulator, RECENT_SESSIONS_LIMIT},
    InterviewSettings, Session,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("session {0} not found")]
    NotFound(String),
    /// The session exists but refuses the operation.
    #[error("{0}")]
    Rejected(String),
    #[error("session {0} kept changing concurrently")]
    Conflict(String),
    #[error("store backend error: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Persistence for sessions and the aggregate submission statistics.
///
/// Every mutation is atomic with respect to the others.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create(
        &self,
        settings: InterviewSettings,
        started_at: DateTime<Utc>,
    ) -> Result<Session, StoreError>;

    async fn get(&self, id: &str) -> Result<Session, StoreError>;

    /// All sessions in creation order.
    async fn list(&self) -> Result<Vec<Session>, StoreError>;

    /// Completes a session. Ending a completed session returns it unchanged;
    /// the flag is true only for the call that actually completed it.
    async fn end(&self, id: &str, ended_at: DateTime<Utc>) -> Result<(Session, bool), StoreError>;

    async fn increment_attempts(&self, id: &str) -> Result<Session, StoreError>;

    /// Uses up the next hint of `question_id`, which has `available` hints.
    /// Refused when hints are disabled, the session is over, the session took
    /// `limit` hints already or the question has none left.
    async fn consume_hint(
        &self,
        id: &str,
        question_id: &str,
        available: u32,
        limit: u32,
    ) -> Result<Session, StoreError>;

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<AggregateStats, StoreError>;

    async fn stats(&self) -> Result<AggregateStats, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub(crate) fn new_session_id() -> String {
    Uuid::new_v4().to_string()
}

/// Applies the hint rules to `session`; shared by every store implementation.
pub(crate) fn take_hint(
    session: &mut Session,
    question_id: &str,
    available: u32,
    limit: u32,
) -> Result<(), StoreError> {
    if !session.enable_hints {
        return Err(StoreError::Rejected(
            "Hints are disabled for this session".to_string(),
        ));
    }
    if !session.is_active() {
        return Err(StoreError::Rejected(
            "Session is already completed".to_string(),
        ));
    }
    if session.hints_used >= limit {
        return Err(StoreError::Rejected(format!(
            "Maximum hints limit reached ({})",
            limit
        )));
    }
    let taken = session.hints_taken_for(question_id);
    if taken >= available {
        return Err(StoreError::Rejected(
            "No more hints available for this question".to_string(),
        ));
    }
    session.hints_used += 1;
    session.hint_progress.insert(question_id.to_string(), taken + 1);
    Ok(())
}

#[derive(Default)]
struct Inner {
    sessions: HashMap<String, Session>,
    order: Vec<String>,
    stats: StatsAccumulator,
}

impl Inner {
    fn session_mut(&mut self, id: &str) -> Result<&mut Session, StoreError> {
        self.sessions
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    fn recent_sessions(&self) -> Vec<RecentSession> {
        let skip = self.order.len().saturating_sub(RECENT_SESSIONS_LIMIT);
        self.order
            .iter()
            .skip(skip)
            .filter_map(|id| self.sessions.get(id))
            .map(RecentSession::from)
            .collect()
    }
}

/// Process-local store; contents are lost on restart.
#[derive(Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Inner>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(
        &self,
        settings: InterviewSettings,
        started_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        let session = Session::start(new_session_id(), settings, started_at);
        let mut inner = self.inner.write().await;
        inner.order.push(session.id.clone());
        inner.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    async fn get(&self, id: &str) -> Result<Session, StoreError> {
        self.inner
            .read()
            .await
            .sessions
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.sessions.get(id).cloned())
            .collect())
    }

    async fn end(&self, id: &str, ended_at: DateTime<Utc>) -> Result<(Session, bool), StoreError> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        let completed = session.complete(ended_at);
        Ok((session.clone(), completed))
    }

    async fn increment_attempts(&self, id: &str) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        session.questions_attempted += 1;
        Ok(session.clone())
    }

    async fn consume_hint(
        &self,
        id: &str,
        question_id: &str,
        available: u32,
        limit: u32,
    ) -> Result<Session, StoreError> {
        let mut inner = self.inner.write().await;
        let session = inner.session_mut(id)?;
        take_hint(session, question_id, available, limit)?;
        Ok(session.clone())
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<AggregateStats, StoreError> {
        let mut inner = self.inner.write().await;
        inner.stats.record(attempt);
        Ok(inner.stats.snapshot(inner.recent_sessions()))
    }

    async fn stats(&self) -> Result<AggregateStats, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.stats.snapshot(inner.recent_sessions()))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
