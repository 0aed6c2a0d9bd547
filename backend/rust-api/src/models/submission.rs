use serde::{Deserialize, Serialize};
use validator::Validate;

/// Highest value any sub-score may take.
pub const MAX_SUB_SCORE: u32 = 100;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CodeSubmission {
    #[validate(length(min = 1, max = 128, message = "question_id must not be empty"))]
    pub question_id: String,
    #[serde(default)]
    #[validate(length(max = 100000, message = "user_code is too large"))]
    pub user_code: String,
    pub time_taken_seconds: u64,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub correctness_score: u32,
    pub efficiency_score: u32,
    pub code_quality_score: u32,
    pub time_management_score: u32,
    pub overall_score: u32,
    #[serde(default)]
    pub feedback: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    pub time_complexity: String,
    pub space_complexity: String,
    #[serde(default)]
    pub interview_tips: Vec<String>,
}

impl ScoreReport {
    pub fn sub_scores(&self) -> [u32; 4] {
        [
            self.correctness_score,
            self.efficiency_score,
            self.code_quality_score,
            self.time_management_score,
        ]
    }

    /// Integer-truncated mean of the four sub-scores.
    pub fn mean_of_sub_scores(&self) -> u32 {
        self.sub_scores().iter().sum::<u32>() / 4
    }

    pub fn sub_scores_in_range(&self) -> bool {
        self.sub_scores().iter().all(|score| *score <= MAX_SUB_SCORE)
    }
}

#[derive(Debug, Serialize)]
pub struct SubmissionResponse {
    pub submission_id: String,
    pub success: bool,
    pub analysis: ScoreReport,
    pub ai_powered: bool,
}
