use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use super::ai_delegate::{call_with_timeout, AiDelegate};
use super::catalog::{CatalogError, QuestionCatalog};
use super::AppState;
use crate::error::ApiError;
use crate::metrics::QUESTIONS_SERVED_TOTAL;
use crate::models::question::{
    CategoriesResponse, Difficulty, GeneratedQuestionResponse, Question, QuestionMeta,
};

pub const GENERATED_CAPACITY: usize = 256;
const GENERATED_ID_PREFIX: &str = "ai-";

/// Most recently generated questions, so submissions for them grade against real metadata.
#[derive(Default)]
pub struct GeneratedQuestions {
    recent: RwLock<VecDeque<Question>>,
}

impl GeneratedQuestions {
    pub async fn remember(&self, question: Question) {
        let mut recent = self.recent.write().await;
        recent.retain(|q| q.id != question.id);
        if recent.len() == GENERATED_CAPACITY {
            recent.pop_front();
        }
        recent.push_back(question);
    }

    pub async fn find(&self, id: &str) -> Option<Question> {
        self.recent
            .read()
            .await
            .iter()
            .find(|q| q.id == id)
            .cloned()
    }

    pub async fn count(&self) -> usize {
        self.recent.read().await.len()
    }
}

pub struct QuestionService {
    catalog: Arc<QuestionCatalog>,
    delegate: Option<Arc<dyn AiDelegate>>,
    generated: Arc<GeneratedQuestions>,
    ai_timeout: Duration,
}

impl QuestionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            catalog: state.catalog.clone(),
            delegate: state.delegate.clone(),
            generated: state.generated.clone(),
            ai_timeout: state.config.ai.timeout(),
        }
    }

    /// Random catalog question; the flag is set when the topic matched nothing.
    pub fn get_question(
        &self,
        difficulty: &str,
        topic: Option<&str>,
    ) -> Result<(Question, bool), ApiError> {
        let mut rng = rand::rng();
        let selection = self.catalog.get_question(difficulty, topic, &mut rng)?;

        QUESTIONS_SERVED_TOTAL
            .with_label_values(&[selection.question.difficulty.as_str(), "catalog"])
            .inc();

        Ok((selection.question.clone(), selection.topic_fallback))
    }

    pub fn categories(&self) -> CategoriesResponse {
        self.catalog.list_categories()
    }

    /// Asks the delegate for a fresh question and falls back to the catalog.
    pub async fn generate(
        &self,
        difficulty: &str,
        topic: Option<&str>,
    ) -> Result<GeneratedQuestionResponse, ApiError> {
        let difficulty: Difficulty = difficulty.parse().map_err(CatalogError::from)?;
        let topic = topic.map(str::trim).filter(|t| !t.is_empty());

        if let Some(delegate) = &self.delegate {
            let generated = call_with_timeout(
                "generate",
                self.ai_timeout,
                delegate.generate(difficulty, topic),
            )
            .await;

            if let Some(mut question) = generated {
                if !question.id.starts_with(GENERATED_ID_PREFIX) {
                    question.id = format!("{}{}", GENERATED_ID_PREFIX, question.id);
                }
                tracing::info!("AI generated {} question {}", difficulty, question.id);
                self.generated.remember(question.clone()).await;

                QUESTIONS_SERVED_TOTAL
                    .with_label_values(&[difficulty.as_str(), "ai"])
                    .inc();

                return Ok(GeneratedQuestionResponse {
                    success: true,
                    question,
                    ai_generated: true,
                    generated_at: Utc::now(),
                });
            }
        }

        let question = {
            let mut rng = rand::rng();
            self.catalog
                .select(difficulty, topic, &mut rng)?
                .question
                .clone()
        };

        QUESTIONS_SERVED_TOTAL
            .with_label_values(&[difficulty.as_str(), "catalog"])
            .inc();

        Ok(GeneratedQuestionResponse {
            success: true,
            question,
            ai_generated: false,
            generated_at: Utc::now(),
        })
    }

    /// Catalog first, then generated questions.
    pub async fn find(&self, id: &str) -> Option<Question> {
        match self.catalog.find(id) {
            Some(question) => Some(question.clone()),
            None => self.generated.find(id).await,
        }
    }

    /// Grading metadata for `id`; unknown ids get a generic placeholder.
    pub async fn resolve_meta(&self, id: &str) -> QuestionMeta {
        match self.find(id).await {
            Some(question) => question.meta(),
            None => {
                tracing::warn!("Submission for unknown question {}, grading generically", id);
                QuestionMeta::unknown(id)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            title: "Generated".to_string(),
            description: "d".to_string(),
            difficulty: Difficulty::Easy,
            examples: Vec::new(),
            constraints: Vec::new(),
            tags: Vec::new(),
            time_limit_minutes: 15,
            hints: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_generated_questions_are_bounded() {
        let generated = GeneratedQuestions::default();
        for i in 0..GENERATED_CAPACITY + 10 {
            generated.remember(question(&format!("ai-{}", i))).await;
        }

        assert_eq!(generated.count().await, GENERATED_CAPACITY);
        assert!(generated.find("ai-0").await.is_none());
        assert!(generated
            .find(&format!("ai-{}", GENERATED_CAPACITY + 9))
            .await
            .is_some());
    }

    #[tokio::test]
    async fn test_remember_replaces_same_id() {
        let generated = GeneratedQuestions::default();
        generated.remember(question("ai-x")).await;
        let mut updated = question("ai-x");
        updated.title = "Second".to_string();
        generated.remember(updated).await;

        assert_eq!(generated.count().await, 1);
        assert_eq!(generated.find("ai-x").await.unwrap().title, "Second");
    }
}
