use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::utils::time::elapsed_minutes;

pub mod hint;
pub mod question;
pub mod stats;
pub mod submission;

pub use question::{Difficulty, Question, QuestionMeta};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub session_type: SessionType,
    pub difficulty: Difficulty,
    pub duration: u32,
    pub topic: Option<String>,
    pub enable_hints: bool,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: Option<i64>,
    pub questions_attempted: u32,
    #[serde(default)]
    pub hints_used: u32,
    /// Hints handed out so far, per question id.
    #[serde(default)]
    pub hint_progress: BTreeMap<String, u32>,
}

impl Session {
    pub fn start(id: String, settings: InterviewSettings, started_at: DateTime<Utc>) -> Self {
        Self {
            id,
            session_type: settings.session_type,
            difficulty: settings.difficulty,
            duration: settings.duration,
            topic: settings.topic,
            enable_hints: settings.enable_hints,
            status: SessionStatus::Active,
            start_time: started_at,
            end_time: None,
            duration_minutes: None,
            questions_attempted: 0,
            hints_used: 0,
            hint_progress: BTreeMap::new(),
        }
    }

    /// Marks the session completed and returns whether it was still active.
    /// Completing twice keeps the first end time.
    pub fn complete(&mut self, ended_at: DateTime<Utc>) -> bool {
        if self.status == SessionStatus::Completed {
            return false;
        }
        self.status = SessionStatus::Completed;
        self.end_time = Some(ended_at);
        self.duration_minutes = Some(elapsed_minutes(self.start_time, ended_at));
        true
    }

    pub fn hints_taken_for(&self, question_id: &str) -> u32 {
        self.hint_progress.get(question_id).copied().unwrap_or(0)
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionType {
    #[default]
    Coding,
    SystemDesign,
    Behavioral,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct InterviewSettings {
    #[serde(default)]
    pub session_type: SessionType,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_duration")]
    #[validate(range(min = 1, max = 240, message = "Duration must be between 1 and 240 minutes"))]
    pub duration: u32,
    #[validate(length(max = 64, message = "Topic must be at most 64 characters"))]
    pub topic: Option<String>,
    #[serde(default = "default_enable_hints")]
    pub enable_hints: bool,
}

fn default_duration() -> u32 {
    30
}

fn default_enable_hints() -> bool {
    true
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            session_type: SessionType::default(),
            difficulty: Difficulty::default(),
            duration: default_duration(),
            topic: None,
            enable_hints: default_enable_hints(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    pub session: Session,
}

#[derive(Debug, Serialize)]
pub struct EndSessionResponse {
    pub message: String,
    pub session: Session,
}
