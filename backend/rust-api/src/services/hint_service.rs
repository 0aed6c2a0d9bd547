use std::sync::Arc;

use super::question_service::QuestionService;
use super::session_store::SessionStore;
use super::AppState;
use crate::error::ApiError;
use crate::metrics::HINTS_REQUESTED_TOTAL;
use crate::models::hint::{RequestHintRequest, RequestHintResponse};

pub struct HintService {
    store: Arc<dyn SessionStore>,
    questions: QuestionService,
    max_hints: u32,
}

impl HintService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            questions: QuestionService::new(state),
            max_hints: state.config.hints_per_session,
        }
    }

    pub async fn request_hint(
        &self,
        session_id: &str,
        req: &RequestHintRequest,
    ) -> Result<RequestHintResponse, ApiError> {
        tracing::info!(
            "Processing hint request: session={}, question={}",
            session_id,
            req.question_id
        );

        let result = self.next_hint(session_id, req).await;
        let outcome = if result.is_ok() { "granted" } else { "refused" };
        HINTS_REQUESTED_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    async fn next_hint(
        &self,
        session_id: &str,
        req: &RequestHintRequest,
    ) -> Result<RequestHintResponse, ApiError> {
        // Unknown sessions are reported before unknown questions
        self.store.get(session_id).await?;

        let question = self
            .questions
            .find(&req.question_id)
            .await
            .ok_or_else(|| ApiError::NotFound(format!("Question {} not found", req.question_id)))?;
        let available = u32::try_from(question.hints.len()).unwrap_or(u32::MAX);

        // Session limit and per-question progress are checked and bumped atomically
        let session = self
            .store
            .consume_hint(session_id, &question.id, available, self.max_hints)
            .await?;
        let taken = session.hints_taken_for(&question.id);
        let hint = question
            .hints
            .get(taken.saturating_sub(1) as usize)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("hint {} of {} missing", taken, question.id))?;

        tracing::info!(
            "Hint provided: session={}, question={}, hint={}/{}, hints_used={}",
            session_id,
            question.id,
            taken,
            available,
            session.hints_used
        );

        Ok(RequestHintResponse {
            hint,
            hints_used: session.hints_used,
            hints_remaining: self.max_hints.saturating_sub(session.hints_used),
        })
    }
}
