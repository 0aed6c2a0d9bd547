use axum::{
    extract::{Path, Query, State},
    http::{HeaderName, HeaderValue},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::{
    error::ApiError,
    models::{
        question::{GenerateQuery, QuestionQuery},
        Difficulty,
    },
    services::{question_service::QuestionService, session_service::SessionService, AppState},
};

/// Set when the requested topic matched nothing and the whole difficulty was used.
pub const TOPIC_FALLBACK_HEADER: &str = "x-topic-fallback";

pub async fn get_question(
    State(state): State<Arc<AppState>>,
    Query(query): Query<QuestionQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let difficulty = query
        .difficulty
        .unwrap_or_else(|| Difficulty::default().as_str().to_string());

    let service = QuestionService::new(&state);
    let (question, topic_fallback) = service.get_question(&difficulty, query.topic.as_deref())?;

    let mut response = Json(question).into_response();
    if topic_fallback {
        response.headers_mut().insert(
            HeaderName::from_static(TOPIC_FALLBACK_HEADER),
            HeaderValue::from_static("true"),
        );
    }
    Ok(response)
}

pub async fn list_categories(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(QuestionService::new(&state).categories())
}

pub async fn generate_question(
    State(state): State<Arc<AppState>>,
    Path(difficulty): Path<String>,
    Query(query): Query<GenerateQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let service = QuestionService::new(&state);
    Ok(Json(
        service
            .generate(&difficulty, query.topic.as_deref())
            .await?,
    ))
}

pub async fn question_stats(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionService::new(state.store.clone());
    Ok(Json(service.system_stats(state.ai_enabled()).await?))
}
