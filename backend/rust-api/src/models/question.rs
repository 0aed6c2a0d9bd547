use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Default time limit applied when a submission references a question we do not know.
pub const DEFAULT_TIME_LIMIT_MINUTES: u32 = 20;

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }

    /// Time limit a generated question of this difficulty gets when the provider omits one.
    pub fn default_time_limit_minutes(&self) -> u32 {
        match self {
            Difficulty::Easy => 15,
            Difficulty::Medium => 25,
            Difficulty::Hard => 35,
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid difficulty level '{0}'. Use: easy, medium, or hard")]
pub struct ParseDifficultyError(pub String);

impl FromStr for Difficulty {
    type Err = ParseDifficultyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ParseDifficultyError(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub explanation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub constraints: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub time_limit_minutes: u32,
    #[serde(default)]
    pub hints: Vec<String>,
}

impl Question {
    pub fn meta(&self) -> QuestionMeta {
        QuestionMeta {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            difficulty: self.difficulty,
            tags: self.tags.clone(),
            time_limit_minutes: self.time_limit_minutes,
        }
    }

    pub fn has_tag_matching(&self, keywords: &[String]) -> bool {
        self.tags.iter().any(|tag| {
            let tag = tag.to_lowercase();
            keywords.iter().any(|keyword| tag.contains(keyword.as_str()))
        })
    }
}

/// What the grader and the AI delegate need to know about a question.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionMeta {
    pub id: String,
    pub title: String,
    pub description: String,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub time_limit_minutes: u32,
}

impl QuestionMeta {
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            title: "Unknown question".to_string(),
            description: String::new(),
            difficulty: Difficulty::Medium,
            tags: Vec::new(),
            time_limit_minutes: DEFAULT_TIME_LIMIT_MINUTES,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct QuestionQuery {
    pub difficulty: Option<String>,
    pub topic: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GenerateQuery {
    pub topic: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct GeneratedQuestionResponse {
    pub success: bool,
    pub question: Question,
    pub ai_generated: bool,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub slug: String,
    pub count: usize,
    pub difficulty_distribution: DifficultyDistribution,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DifficultyDistribution {
    pub easy: usize,
    pub medium: usize,
    pub hard: usize,
}

impl DifficultyDistribution {
    pub fn add(&mut self, difficulty: Difficulty) {
        match difficulty {
            Difficulty::Easy => self.easy += 1,
            Difficulty::Medium => self.medium += 1,
            Difficulty::Hard => self.hard += 1,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoriesResponse {
    pub categories: Vec<CategorySummary>,
    pub total_questions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_difficulty_parse_accepts_known_levels() {
        assert_eq!("easy".parse::<Difficulty>(), Ok(Difficulty::Easy));
        assert_eq!("medium".parse::<Difficulty>(), Ok(Difficulty::Medium));
        assert_eq!("hard".parse::<Difficulty>(), Ok(Difficulty::Hard));
    }

    #[test]
    fn test_difficulty_parse_rejects_unknown() {
        let err = "impossible".parse::<Difficulty>().unwrap_err();
        assert!(err.to_string().contains("impossible"));
        assert!("EASY".parse::<Difficulty>().is_err());
    }

    #[test]
    fn test_difficulty_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Difficulty::Hard).unwrap(),
            "\"hard\""
        );
    }
}
