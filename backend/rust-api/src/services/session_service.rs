use chrono::Utc;
use std::sync::Arc;

use super::session_store::SessionStore;
use crate::error::ApiError;
use crate::metrics::{SESSIONS_ACTIVE, SESSIONS_TOTAL};
use crate::models::{
    stats::{AggregateStats, SystemStats},
    CreateSessionResponse, EndSessionResponse, InterviewSettings, Session,
};

pub struct SessionService {
    store: Arc<dyn SessionStore>,
}

impl SessionService {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    pub async fn create_session(
        &self,
        settings: InterviewSettings,
    ) -> Result<CreateSessionResponse, ApiError> {
        let session = self.store.create(settings, Utc::now()).await?;

        SESSIONS_TOTAL.with_label_values(&["created"]).inc();
        SESSIONS_ACTIVE.inc();

        tracing::info!(
            "Session created: {} ({:?}, {}, {} min)",
            session.id,
            session.session_type,
            session.difficulty,
            session.duration
        );

        Ok(CreateSessionResponse {
            session_id: session.id.clone(),
            session,
        })
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Session, ApiError> {
        Ok(self.store.get(session_id).await?)
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, ApiError> {
        Ok(self.store.list().await?)
    }

    pub async fn end_session(&self, session_id: &str) -> Result<EndSessionResponse, ApiError> {
        let (session, completed) = self.store.end(session_id, Utc::now()).await?;

        // Only the request that flipped the status moves the counters
        if completed {
            SESSIONS_TOTAL.with_label_values(&["completed"]).inc();
            SESSIONS_ACTIVE.dec();
            tracing::info!(
                "Session completed: {} after {} min",
                session_id,
                session.duration_minutes.unwrap_or_default()
            );
        } else {
            tracing::debug!("Session {} was already completed", session_id);
        }

        Ok(EndSessionResponse {
            message: "Session ended successfully".to_string(),
            session,
        })
    }

    pub async fn user_stats(&self) -> Result<AggregateStats, ApiError> {
        Ok(self.store.stats().await?)
    }

    pub async fn system_stats(&self, ai_enabled: bool) -> Result<SystemStats, ApiError> {
        let sessions = self.store.list().await?;
        let stats = self.store.stats().await?;
        Ok(SystemStats::collect(&sessions, &stats, ai_enabled))
    }
}
