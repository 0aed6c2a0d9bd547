use anyhow::Context;
use std::sync::Arc;

use crate::config::Config;
use ai_delegate::{AiDelegate, OpenAiDelegate};
use catalog::QuestionCatalog;
use question_service::GeneratedQuestions;
use redis_store::RedisSessionStore;
use session_store::{InMemorySessionStore, SessionStore};

pub struct AppState {
    pub config: Config,
    pub catalog: Arc<QuestionCatalog>,
    pub store: Arc<dyn SessionStore>,
    pub delegate: Option<Arc<dyn AiDelegate>>,
    pub generated: Arc<GeneratedQuestions>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let catalog = match &config.catalog_path {
            Some(path) => QuestionCatalog::from_file(path)
                .with_context(|| format!("Failed to load question catalog from {}", path))?,
            None => QuestionCatalog::builtin().context("Built-in question catalog is invalid")?,
        };
        tracing::info!("Question catalog loaded: {} questions", catalog.len());

        let store: Arc<dyn SessionStore> = match &config.redis_uri {
            Some(uri) => Arc::new(RedisSessionStore::connect(uri).await?),
            None => {
                tracing::info!("REDIS_URI not set, keeping sessions in memory");
                Arc::new(InMemorySessionStore::new())
            }
        };

        let delegate = OpenAiDelegate::from_settings(&config.ai)
            .context("Failed to build AI client")?
            .map(|delegate| Arc::new(delegate) as Arc<dyn AiDelegate>);
        if delegate.is_some() {
            tracing::info!("AI delegate enabled (model {})", config.ai.model);
        }

        Ok(Self::with_parts(config, catalog, store, delegate))
    }

    pub fn with_parts(
        config: Config,
        catalog: QuestionCatalog,
        store: Arc<dyn SessionStore>,
        delegate: Option<Arc<dyn AiDelegate>>,
    ) -> Self {
        Self {
            config,
            catalog: Arc::new(catalog),
            store,
            delegate,
            generated: Arc::new(GeneratedQuestions::default()),
        }
    }

    pub fn ai_enabled(&self) -> bool {
        self.delegate.is_some()
    }
}

pub mod ai_delegate;
pub mod catalog;
pub mod grader;
pub mod hint_service;
pub mod question_service;
pub mod redis_store;
pub mod session_service;
pub mod session_store;
pub mod submission_service;
