#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use mockinterview_api::{
    config::Config,
    create_router,
    models::{
        question::{Difficulty, Question, QuestionMeta},
        stats::{AggregateStats, AttemptRecord},
        submission::ScoreReport,
        InterviewSettings, Session,
    },
    services::{
        ai_delegate::{AiDelegate, DelegateError},
        catalog::QuestionCatalog,
        session_store::{InMemorySessionStore, SessionStore, StoreError},
        AppState,
    },
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.ai.timeout_secs = 1;
    config
}

pub fn create_test_app() -> Router {
    create_test_app_with(test_config(), None)
}

pub fn create_test_app_with_delegate(delegate: Arc<dyn AiDelegate>) -> Router {
    create_test_app_with(test_config(), Some(delegate))
}

pub fn create_test_app_with(config: Config, delegate: Option<Arc<dyn AiDelegate>>) -> Router {
    create_test_app_with_store(config, Arc::new(InMemorySessionStore::new()), delegate)
}

pub fn create_test_app_with_store(
    config: Config,
    store: Arc<dyn SessionStore>,
    delegate: Option<Arc<dyn AiDelegate>>,
) -> Router {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let catalog = QuestionCatalog::builtin().expect("builtin catalog parses");
    let state = AppState::with_parts(config, catalog, store, delegate);
    create_router(Arc::new(state))
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    send_request(app, builder.body(body).unwrap()).await
}

pub async fn send_request(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };

    TestResponse {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &Router, uri: &str) -> TestResponse {
    send(app, "GET", uri, None).await
}

pub async fn post(app: &Router, uri: &str, body: Value) -> TestResponse {
    send(app, "POST", uri, Some(body)).await
}

/// Creates a session with default settings and returns its id.
pub async fn create_session(app: &Router) -> String {
    let response = post(app, "/api/sessions", serde_json::json!({})).await;
    assert_eq!(response.status, StatusCode::CREATED, "{}", response.body);
    response.body["session_id"].as_str().unwrap().to_string()
}

pub fn stub_report() -> ScoreReport {
    ScoreReport {
        correctness_score: 90,
        efficiency_score: 80,
        code_quality_score: 70,
        time_management_score: 60,
        overall_score: 75,
        feedback: vec!["Reviewed by stub".to_string()],
        improvements: Vec::new(),
        time_complexity: "O(n)".to_string(),
        space_complexity: "O(1)".to_string(),
        interview_tips: Vec::new(),
    }
}

/// Delegate that always answers with fixed content.
pub struct StubDelegate;

#[async_trait]
impl AiDelegate for StubDelegate {
    async fn generate(
        &self,
        difficulty: Difficulty,
        _topic: Option<&str>,
    ) -> Result<Question, DelegateError> {
        Ok(Question {
            id: "stub-question".to_string(),
            title: "Stub Question".to_string(),
            description: "Generated for tests".to_string(),
            difficulty,
            examples: Vec::new(),
            constraints: Vec::new(),
            tags: vec!["Graph".to_string()],
            time_limit_minutes: difficulty.default_time_limit_minutes(),
            hints: vec!["First stub hint".to_string()],
        })
    }

    async fn grade(
        &self,
        _question: &QuestionMeta,
        _code: &str,
        _time_taken_seconds: u64,
    ) -> Result<ScoreReport, DelegateError> {
        Ok(stub_report())
    }
}

/// Delegate whose every call fails.
pub struct FailingDelegate;

#[async_trait]
impl AiDelegate for FailingDelegate {
    async fn generate(
        &self,
        _difficulty: Difficulty,
        _topic: Option<&str>,
    ) -> Result<Question, DelegateError> {
        Err(DelegateError::Status {
            status: 503,
            body: "unavailable".to_string(),
        })
    }

    async fn grade(
        &self,
        _question: &QuestionMeta,
        _code: &str,
        _time_taken_seconds: u64,
    ) -> Result<ScoreReport, DelegateError> {
        Err(DelegateError::Malformed("not json".to_string()))
    }
}

/// Delegate that never answers within the configured timeout.
pub struct SlowDelegate;

#[async_trait]
impl AiDelegate for SlowDelegate {
    async fn generate(
        &self,
        difficulty: Difficulty,
        topic: Option<&str>,
    ) -> Result<Question, DelegateError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        StubDelegate.generate(difficulty, topic).await
    }

    async fn grade(
        &self,
        question: &QuestionMeta,
        code: &str,
        time_taken_seconds: u64,
    ) -> Result<ScoreReport, DelegateError> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        StubDelegate.grade(question, code, time_taken_seconds).await
    }
}

/// In-memory store whose session attempt counter always loses the update race.
#[derive(Default)]
pub struct ContendedStore {
    inner: InMemorySessionStore,
}

#[async_trait]
impl SessionStore for ContendedStore {
    async fn create(
        &self,
        settings: InterviewSettings,
        started_at: DateTime<Utc>,
    ) -> Result<Session, StoreError> {
        self.inner.create(settings, started_at).await
    }

    async fn get(&self, id: &str) -> Result<Session, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Session>, StoreError> {
        self.inner.list().await
    }

    async fn end(&self, id: &str, ended_at: DateTime<Utc>) -> Result<(Session, bool), StoreError> {
        self.inner.end(id, ended_at).await
    }

    async fn increment_attempts(&self, id: &str) -> Result<Session, StoreError> {
        Err(StoreError::Conflict(id.to_string()))
    }

    async fn consume_hint(
        &self,
        id: &str,
        question_id: &str,
        available: u32,
        limit: u32,
    ) -> Result<Session, StoreError> {
        self.inner.consume_hint(id, question_id, available, limit).await
    }

    async fn record_attempt(&self, attempt: &AttemptRecord) -> Result<AggregateStats, StoreError> {
        self.inner.record_attempt(attempt).await
    }

    async fn stats(&self) -> Result<AggregateStats, StoreError> {
        self.inner.stats().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
