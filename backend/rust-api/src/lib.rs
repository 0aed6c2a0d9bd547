use axum::{
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::ApiError;
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(&app_state.config.allowed_origins);

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api", api_routes())
        .with_state(app_state)
        .layer(cors)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/sessions",
            get(handlers::sessions::list_sessions).post(handlers::sessions::create_session),
        )
        .route("/sessions/{id}", get(handlers::sessions::get_session))
        .route("/sessions/{id}/end", post(handlers::sessions::end_session))
        .route("/sessions/{id}/hints", post(handlers::sessions::request_hint))
        .route("/questions", get(handlers::questions::get_question))
        .route(
            "/questions/categories",
            get(handlers::questions::list_categories),
        )
        .route(
            "/questions/generate/{difficulty}",
            get(handlers::questions::generate_question),
        )
        .route("/questions/stats", get(handlers::questions::question_stats))
        .route("/submissions", post(handlers::submissions::submit_code))
        .route("/user/stats", get(handlers::stats::user_stats))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if allowed_origins.iter().any(|origin| origin == "*") {
        return base.allow_origin(tower_http::cors::Any);
    }

    let patterns = allowed_origins.to_vec();
    base.allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _request| {
            origin
                .to_str()
                .map(|origin| patterns.iter().any(|pattern| origin_allowed(pattern, origin)))
                .unwrap_or(false)
        },
    ))
}

/// Exact match, or `scheme://*.domain` matching any sub-domain of `domain`.
fn origin_allowed(pattern: &str, origin: &str) -> bool {
    if pattern == origin {
        return true;
    }
    let Some((scheme, host_pattern)) = pattern.split_once("://") else {
        return false;
    };
    let Some(domain) = host_pattern.strip_prefix("*.") else {
        return false;
    };
    let Some(host) = origin.strip_prefix(scheme).and_then(|rest| rest.strip_prefix("://")) else {
        return false;
    };
    host.strip_suffix(domain)
        .and_then(|sub| sub.strip_suffix('.'))
        .is_some_and(|sub| !sub.is_empty())
}
