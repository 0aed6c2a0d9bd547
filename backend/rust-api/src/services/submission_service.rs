use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::ai_delegate::{call_with_timeout, AiDelegate};
use super::grader;
use super::question_service::QuestionService;
use super::session_store::SessionStore;
use super::AppState;
use crate::error::ApiError;
use crate::metrics::{SUBMISSIONS_TOTAL, SUBMISSION_SCORE};
use crate::models::{
    question::QuestionMeta,
    stats::AttemptRecord,
    submission::{CodeSubmission, ScoreReport, SubmissionResponse},
};

pub struct SubmissionService {
    store: Arc<dyn SessionStore>,
    questions: QuestionService,
    delegate: Option<Arc<dyn AiDelegate>>,
    ai_timeout: Duration,
}

impl SubmissionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            questions: QuestionService::new(state),
            delegate: state.delegate.clone(),
            ai_timeout: state.config.ai.timeout(),
        }
    }

    pub async fn submit(&self, submission: CodeSubmission) -> Result<SubmissionResponse, ApiError> {
        if let Some(session_id) = &submission.session_id {
            // Unknown sessions are rejected before any grading work
            self.store.get(session_id).await?;
        }

        let question = self.questions.resolve_meta(&submission.question_id).await;
        let (analysis, ai_powered) = self.grade(&question, &submission).await;

        let attempt = AttemptRecord {
            session_id: submission.session_id.clone(),
            difficulty: question.difficulty,
            tags: question.tags.clone(),
            overall_score: analysis.overall_score,
        };
        let stats = self.store.record_attempt(&attempt).await?;
        // The attempt is already counted in the stats; a lost session counter
        // update is logged rather than failing a graded submission
        if let Some(session_id) = &submission.session_id {
            if let Err(e) = self.store.increment_attempts(session_id).await {
                tracing::warn!(
                    "Failed to count attempt for session {}: {}",
                    session_id,
                    e
                );
            }
        }

        SUBMISSIONS_TOTAL
            .with_label_values(&[if ai_powered { "ai" } else { "heuristic" }])
            .inc();
        SUBMISSION_SCORE.observe(f64::from(analysis.overall_score));

        let submission_id = Uuid::new_v4().to_string();
        tracing::info!(
            "Submission {} for {} scored {} (ai={}, attempts={})",
            submission_id,
            question.id,
            analysis.overall_score,
            ai_powered,
            stats.total_attempts
        );

        Ok(SubmissionResponse {
            submission_id,
            success: true,
            analysis,
            ai_powered,
        })
    }

    /// Delegate first; the heuristic grader answers whenever the delegate cannot.
    async fn grade(&self, question: &QuestionMeta, submission: &CodeSubmission) -> (ScoreReport, bool) {
        if let Some(delegate) = &self.delegate {
            let graded = call_with_timeout(
                "grade",
                self.ai_timeout,
                delegate.grade(question, &submission.user_code, submission.time_taken_seconds),
            )
            .await;
            if let Some(report) = graded {
                return (report, true);
            }
        }

        let report = {
            let mut rng = rand::rng();
            grader::analyze(
                question,
                &submission.user_code,
                submission.time_taken_seconds,
                &mut rng,
            )
        };
        (report, false)
    }
}
