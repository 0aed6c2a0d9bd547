use rand::Rng;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use crate::models::question::{
    CategoriesResponse, CategorySummary, Difficulty, DifficultyDistribution, ParseDifficultyError,
    Question,
};

const BUILTIN_QUESTIONS: &str = include_str!("../data/questions.json");

/// Fixed, ordered category list: (display name, slug, tag keywords).
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    ("Array", "arrays", &["array"]),
    ("String", "strings", &["string"]),
    ("Hash Table", "hash-tables", &["hash"]),
    ("Dynamic Programming", "dynamic-programming", &["dynamic programming"]),
    ("Tree", "trees", &["tree"]),
    ("Graph", "graphs", &["graph", "breadth-first", "depth-first"]),
    ("Linked List", "linked-lists", &["linked list"]),
    ("Sorting", "sorting", &["sort", "heap"]),
    ("Binary Search", "searching", &["binary search"]),
    ("Recursion", "recursion", &["recursion", "divide and conquer"]),
];

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Invalid difficulty level '{0}'. Use: easy, medium, or hard")]
    InvalidDifficulty(String),
    #[error("No questions found for difficulty '{0}'")]
    Empty(Difficulty),
    #[error("Invalid question catalog: {0}")]
    Invalid(String),
}

impl From<ParseDifficultyError> for CatalogError {
    fn from(err: ParseDifficultyError) -> Self {
        CatalogError::InvalidDifficulty(err.0)
    }
}

/// Result of a catalog lookup.
#[derive(Debug, Clone, Copy)]
pub struct Selection<'a> {
    pub question: &'a Question,
    /// A topic was requested but nothing matched it, so the whole difficulty was used.
    pub topic_fallback: bool,
}

/// Read-only set of practice questions grouped by difficulty.
#[derive(Debug, Clone)]
pub struct QuestionCatalog {
    by_difficulty: BTreeMap<Difficulty, Vec<Question>>,
}

impl QuestionCatalog {
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_QUESTIONS)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CatalogError::Invalid(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let questions: Vec<Question> =
            serde_json::from_str(raw).map_err(|e| CatalogError::Invalid(e.to_string()))?;
        Self::from_questions(questions)
    }

    pub fn from_questions(questions: Vec<Question>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let mut by_difficulty: BTreeMap<Difficulty, Vec<Question>> = BTreeMap::new();

        for question in questions {
            if question.id.trim().is_empty() || question.title.trim().is_empty() {
                return Err(CatalogError::Invalid(
                    "question id and title must not be empty".to_string(),
                ));
            }
            if question.time_limit_minutes == 0 {
                return Err(CatalogError::Invalid(format!(
                    "question '{}' has no time limit",
                    question.id
                )));
            }
            if !seen.insert(question.id.clone()) {
                return Err(CatalogError::Invalid(format!(
                    "duplicate question id '{}'",
                    question.id
                )));
            }
            by_difficulty
                .entry(question.difficulty)
                .or_default()
                .push(question);
        }

        Ok(Self { by_difficulty })
    }

    pub fn len(&self) -> usize {
        self.by_difficulty.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.by_difficulty.values().flatten()
    }

    pub fn find(&self, id: &str) -> Option<&Question> {
        self.questions().find(|q| q.id == id)
    }

    /// Picks a random question of `difficulty`, optionally narrowed to `topic`.
    pub fn get_question<R: Rng + ?Sized>(
        &self,
        difficulty: &str,
        topic: Option<&str>,
        rng: &mut R,
    ) -> Result<Selection<'_>, CatalogError> {
        let difficulty: Difficulty = difficulty.parse()?;
        self.select(difficulty, topic, rng)
    }

    pub fn select<R: Rng + ?Sized>(
        &self,
        difficulty: Difficulty,
        topic: Option<&str>,
        rng: &mut R,
    ) -> Result<Selection<'_>, CatalogError> {
        let pool = self
            .by_difficulty
            .get(&difficulty)
            .filter(|questions| !questions.is_empty())
            .ok_or(CatalogError::Empty(difficulty))?;

        let topic = topic.map(str::trim).filter(|t| !t.is_empty());
        let mut topic_fallback = false;
        let candidates: Vec<&Question> = match topic {
            Some(topic) => {
                let keywords = topic_keywords(topic);
                let filtered: Vec<&Question> = pool
                    .iter()
                    .filter(|q| q.has_tag_matching(&keywords))
                    .collect();
                if filtered.is_empty() {
                    tracing::debug!(
                        "No {} question matches topic '{}', ignoring the filter",
                        difficulty,
                        topic
                    );
                    topic_fallback = true;
                    pool.iter().collect()
                } else {
                    filtered
                }
            }
            None => pool.iter().collect(),
        };

        let question = candidates[rng.random_range(0..candidates.len())];
        Ok(Selection {
            question,
            topic_fallback,
        })
    }

    pub fn list_categories(&self) -> CategoriesResponse {
        let categories = CATEGORIES
            .iter()
            .map(|(name, slug, keywords)| {
                let keywords: Vec<String> = keywords.iter().map(|k| k.to_string()).collect();
                let mut distribution = DifficultyDistribution::default();
                let mut count = 0;
                for question in self.questions().filter(|q| q.has_tag_matching(&keywords)) {
                    distribution.add(question.difficulty);
                    count += 1;
                }
                CategorySummary {
                    name: name.to_string(),
                    slug: slug.to_string(),
                    count,
                    difficulty_distribution: distribution,
                }
            })
            .collect();

        CategoriesResponse {
            categories,
            total_questions: self.len(),
        }
    }
}

fn normalize_topic(topic: &str) -> String {
    let lowered = topic.trim().to_lowercase().replace(['-', '_'], " ");
    lowered.trim_end_matches('s').to_string()
}

/// Tag keywords for a topic given by category name or slug; unknown topics match themselves.
fn topic_keywords(topic: &str) -> Vec<String> {
    let wanted = normalize_topic(topic);
    CATEGORIES
        .iter()
        .find(|(name, slug, _)| normalize_topic(name) == wanted || normalize_topic(slug) == wanted)
        .map(|(_, _, keywords)| keywords.iter().map(|k| k.to_string()).collect())
        .unwrap_or_else(|| vec![topic.trim().to_lowercase()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn catalog() -> QuestionCatalog {
        QuestionCatalog::builtin().expect("builtin catalog parses")
    }

    #[test]
    fn test_builtin_catalog_covers_every_difficulty() {
        let catalog = catalog();
        for difficulty in Difficulty::ALL {
            assert!(
                catalog.questions().any(|q| q.difficulty == difficulty),
                "no {} questions",
                difficulty
            );
        }
    }

    #[test]
    fn test_get_question_returns_requested_difficulty() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(11);
        let topics = [None, Some("arrays"), Some("Graph"), Some("quantum"), Some("")];

        for difficulty in Difficulty::ALL {
            for topic in topics {
                for _ in 0..10 {
                    let selection = catalog
                        .get_question(difficulty.as_str(), topic, &mut rng)
                        .unwrap();
                    assert_eq!(selection.question.difficulty, difficulty);
                }
            }
        }
    }

    #[test]
    fn test_invalid_difficulty_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        let err = catalog().get_question("invalid", None, &mut rng).unwrap_err();
        assert!(matches!(err, CatalogError::InvalidDifficulty(_)));
    }

    #[test]
    fn test_topic_filter_narrows_candidates() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..20 {
            let selection = catalog
                .get_question("medium", Some("dynamic-programming"), &mut rng)
                .unwrap();
            assert_eq!(selection.question.id, "coin-change");
            assert!(!selection.topic_fallback);
        }
    }

    #[test]
    fn test_topic_is_case_insensitive() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(5);
        let selection = catalog
            .get_question("hard", Some("LINKED-LISTS"), &mut rng)
            .unwrap();
        assert_eq!(selection.question.id, "merge-k-sorted-lists");
    }

    #[test]
    fn test_unmatched_topic_falls_back() {
        let catalog = catalog();
        let mut rng = StdRng::seed_from_u64(5);
        let selection = catalog
            .get_question("easy", Some("system design"), &mut rng)
            .unwrap();
        assert!(selection.topic_fallback);
        assert_eq!(selection.question.difficulty, Difficulty::Easy);
    }

    #[test]
    fn test_empty_difficulty_is_not_found() {
        let catalog = QuestionCatalog::from_questions(Vec::new()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let err = catalog.get_question("hard", None, &mut rng).unwrap_err();
        assert!(matches!(err, CatalogError::Empty(Difficulty::Hard)));
    }

    #[test]
    fn test_duplicate_ids_are_rejected() {
        let question = catalog().find("two-sum").cloned().unwrap();
        let err = QuestionCatalog::from_questions(vec![question.clone(), question]).unwrap_err();
        assert!(matches!(err, CatalogError::Invalid(_)));
    }

    #[test]
    fn test_categories_are_ordered_and_counted() {
        let response = catalog().list_categories();
        let names: Vec<&str> = response.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(&names[..3], &["Array", "String", "Hash Table"]);
        assert_eq!(response.total_questions, 13);

        let dp = response
            .categories
            .iter()
            .find(|c| c.slug == "dynamic-programming")
            .unwrap();
        assert_eq!(dp.count, 2);
        assert_eq!(dp.difficulty_distribution.medium, 1);
        assert_eq!(dp.difficulty_distribution.hard, 1);
    }

    #[test]
    fn test_find_by_id() {
        assert!(catalog().find("edit-distance").is_some());
        assert!(catalog().find("nope").is_none());
    }
}
