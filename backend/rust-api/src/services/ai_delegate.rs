use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};

use crate::config::AiSettings;
use crate::metrics::{DELEGATE_CALLS_TOTAL, DELEGATE_CALL_DURATION_SECONDS};
use crate::models::{
    question::{Difficulty, Question, QuestionMeta},
    submission::ScoreReport,
};

#[derive(Debug, thiserror::Error)]
pub enum DelegateError {
    #[error("request to AI provider failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("AI provider returned status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed AI response: {0}")]
    Malformed(String),
}

/// External provider that can write questions and grade code.
#[async_trait]
pub trait AiDelegate: Send + Sync {
    async fn generate(
        &self,
        difficulty: Difficulty,
        topic: Option<&str>,
    ) -> Result<Question, DelegateError>;

    async fn grade(
        &self,
        question: &QuestionMeta,
        code: &str,
        time_taken_seconds: u64,
    ) -> Result<ScoreReport, DelegateError>;
}

/// Runs one delegate call under `timeout`. Every failure is logged and turned into `None`
/// so the caller can continue with the local implementation.
pub async fn call_with_timeout<T, F>(operation: &'static str, timeout: Duration, call: F) -> Option<T>
where
    F: Future<Output = Result<T, DelegateError>>,
{
    let start = Instant::now();
    let (outcome, value) = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(value)) => ("success", Some(value)),
        Ok(Err(e)) => {
            tracing::warn!("AI {} failed, using local fallback: {}", operation, e);
            ("error", None)
        }
        Err(_) => {
            tracing::warn!(
                "AI {} timed out after {:?}, using local fallback",
                operation,
                timeout
            );
            ("timeout", None)
        }
    };

    DELEGATE_CALLS_TOTAL
        .with_label_values(&[operation, outcome])
        .inc();
    DELEGATE_CALL_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(start.elapsed().as_secs_f64());

    value
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Delegate backed by an OpenAI-compatible chat-completions endpoint.
pub struct OpenAiDelegate {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiDelegate {
    /// Returns `None` when no credential is configured.
    pub fn from_settings(settings: &AiSettings) -> Result<Option<Self>, reqwest::Error> {
        let Some(api_key) = settings.api_key.clone() else {
            return Ok(None);
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Some(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: settings.model.clone(),
        }))
    }

    async fn complete(&self, prompt: String, temperature: f32) -> Result<String, DelegateError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "You are a senior software engineer running technical interviews. \
                              Reply with a single JSON object and nothing else."
                        .to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        tracing::debug!("Calling AI provider: {} model={}", url, self.model);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(DelegateError::Status { status, body });
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| DelegateError::Malformed(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| DelegateError::Malformed("response has no message content".into()))
    }
}

#[async_trait]
impl AiDelegate for OpenAiDelegate {
    async fn generate(
        &self,
        difficulty: Difficulty,
        topic: Option<&str>,
    ) -> Result<Question, DelegateError> {
        let content = self
            .complete(generation_prompt(difficulty, topic), 0.7)
            .await?;
        parse_generated_question(&content, difficulty)
    }

    async fn grade(
        &self,
        question: &QuestionMeta,
        code: &str,
        time_taken_seconds: u64,
    ) -> Result<ScoreReport, DelegateError> {
        let content = self
            .complete(grading_prompt(question, code, time_taken_seconds), 0.3)
            .await?;
        parse_score_report(&content)
    }
}

fn generation_prompt(difficulty: Difficulty, topic: Option<&str>) -> String {
    let focus = topic
        .map(|t| format!("Focus on the topic \"{}\".\n", t))
        .unwrap_or_default();
    format!(
        "Write an original {difficulty} coding interview question.\n{focus}\
         Return JSON with exactly these fields:\n\
         {{\"id\": \"kebab-case-id\", \"title\": \"...\", \"description\": \"...\", \
         \"difficulty\": \"{difficulty}\", \
         \"examples\": [{{\"input\": \"...\", \"output\": \"...\", \"explanation\": \"...\"}}], \
         \"constraints\": [\"...\"], \"tags\": [\"...\"], \
         \"time_limit_minutes\": {limit}, \"hints\": [\"...\"]}}",
        difficulty = difficulty,
        focus = focus,
        limit = difficulty.default_time_limit_minutes(),
    )
}

fn grading_prompt(question: &QuestionMeta, code: &str, time_taken_seconds: u64) -> String {
    format!(
        "Review this interview solution.\n\
         Question: {title}\nDescription: {description}\n\
         Time taken: {taken} seconds (limit {limit} seconds)\n\
         Code:\n```\n{code}\n```\n\
         Return JSON with exactly these fields (scores are integers 0-100):\n\
         {{\"correctness_score\": 0, \"efficiency_score\": 0, \"code_quality_score\": 0, \
         \"time_management_score\": 0, \"overall_score\": 0, \"feedback\": [\"...\"], \
         \"improvements\": [\"...\"], \"time_complexity\": \"O(?)\", \
         \"space_complexity\": \"O(?)\", \"interview_tips\": [\"...\"]}}\n\
         overall_score is the integer mean of the four other scores.",
        title = question.title,
        description = question.description,
        taken = time_taken_seconds,
        limit = u64::from(question.time_limit_minutes) * 60,
        code = code,
    )
}

/// Models sometimes wrap JSON in a Markdown fence even when asked not to.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

pub(crate) fn parse_generated_question(
    content: &str,
    difficulty: Difficulty,
) -> Result<Question, DelegateError> {
    let question: Question = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| DelegateError::Malformed(format!("question: {}", e)))?;

    if question.id.trim().is_empty()
        || question.title.trim().is_empty()
        || question.description.trim().is_empty()
    {
        return Err(DelegateError::Malformed(
            "question id, title and description are required".into(),
        ));
    }
    if question.difficulty != difficulty {
        return Err(DelegateError::Malformed(format!(
            "asked for a {} question, got {}",
            difficulty, question.difficulty
        )));
    }
    if question.time_limit_minutes == 0 {
        return Err(DelegateError::Malformed("question has no time limit".into()));
    }

    Ok(question)
}

pub(crate) fn parse_score_report(content: &str) -> Result<ScoreReport, DelegateError> {
    let mut report: ScoreReport = serde_json::from_str(strip_code_fence(content))
        .map_err(|e| DelegateError::Malformed(format!("score report: {}", e)))?;

    if !report.sub_scores_in_range() {
        return Err(DelegateError::Malformed(format!(
            "sub-scores out of range: {:?}",
            report.sub_scores()
        )));
    }

    let expected = report.mean_of_sub_scores();
    if report.overall_score != expected {
        tracing::debug!(
            "AI overall_score {} disagrees with sub-scores, using {}",
            report.overall_score,
            expected
        );
        report.overall_score = expected;
    }

    Ok(report)
}
