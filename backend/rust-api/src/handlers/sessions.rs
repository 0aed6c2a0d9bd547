use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use validator::Validate;

use crate::{
    error::ApiError,
    extractors::AppJson,
    models::{hint::RequestHintRequest, InterviewSettings},
    services::{hint_service::HintService, session_service::SessionService, AppState},
};

pub async fn create_session(
    State(state): State<Arc<AppState>>,
    AppJson(settings): AppJson<InterviewSettings>,
) -> Result<impl IntoResponse, ApiError> {
    settings.validate()?;

    let service = SessionService::new(state.store.clone());
    let response = service.create_session(settings).await?;

    Ok((StatusCode::CREATED, Json(response)))
}

pub async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = SessionService::new(state.store.clone());
    Ok(Json(service.list_sessions().await?))
}

pub async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::debug!("Getting session: {}", session_id);

    let service = SessionService::new(state.store.clone());
    Ok(Json(service.get_session(&session_id).await?))
}

pub async fn end_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    tracing::info!("Ending session: {}", session_id);

    let service = SessionService::new(state.store.clone());
    Ok(Json(service.end_session(&session_id).await?))
}

pub async fn request_hint(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    AppJson(req): AppJson<RequestHintRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate()?;

    let service = HintService::new(&state);
    Ok(Json(service.request_hint(&session_id, &req).await?))
}
