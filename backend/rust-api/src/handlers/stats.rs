use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::{
    error::ApiError,
    services::{session_service::SessionService, AppState},
};

pub async fn user_stats(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let service = SessionService::new(state.store.clone());
    Ok(Json(service.user_stats().await?))
}
