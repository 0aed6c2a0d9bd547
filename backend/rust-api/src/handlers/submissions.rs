use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    models::submission::CodeSubmission,
    services::{submission_service::SubmissionService, AppState},
};

pub async fn submit_code(
    State(state): State<Arc<AppState>>,
    AppJson(submission): AppJson<CodeSubmission>,
) -> Result<impl IntoResponse, ApiError> {
    submission.validate()?;

    tracing::info!(
        "Submission for question {} (session {:?}, {}s)",
        submission.question_id,
        submission.session_id,
        submission.time_taken_seconds
    );

    let service = SubmissionService::new(&state);
    Ok(Json(service.submit(submission).await?))
}
