use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Difficulty, Session, SessionStatus, SessionType};

/// Overall score from which an attempt counts as a solved problem.
pub const SOLVED_THRESHOLD: u32 = 70;
pub const RECENT_SESSIONS_LIMIT: usize = 5;
pub const IMPROVEMENT_AREAS_LIMIT: usize = 3;

/// One graded submission as seen by the stats bookkeeping.
#[derive(Debug, Clone)]
pub struct AttemptRecord {
    pub session_id: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
    pub overall_score: u32,
}

impl AttemptRecord {
    pub fn solved(&self) -> bool {
        self.overall_score >= SOLVED_THRESHOLD
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub total_attempts: u64,
    pub average_score: u32,
    pub problems_solved: u64,
    pub favorite_difficulty: Difficulty,
    pub improvement_areas: Vec<String>,
    pub recent_sessions: Vec<RecentSession>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecentSession {
    pub id: String,
    pub session_type: SessionType,
    pub status: SessionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_minutes: i64,
    pub questions_attempted: u32,
}

impl From<&Session> for RecentSession {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id.clone(),
            session_type: session.session_type,
            status: session.status,
            start_time: session.start_time,
            end_time: session.end_time,
            duration_minutes: session
                .duration_minutes
                .unwrap_or(i64::from(session.duration)),
            questions_attempted: session.questions_attempted,
        }
    }
}

/// Running counters behind [`AggregateStats`].
///
/// The exact score sum is kept so the reported average is always
/// `floor(sum / n)`, which is what the incremental rule
/// `avg' = floor((avg * (n - 1) + score) / n)` yields without truncation drift.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatsAccumulator {
    pub total_attempts: u64,
    pub score_sum: u64,
    pub problems_solved: u64,
    pub difficulty_counts: BTreeMap<Difficulty, u64>,
    pub weak_tag_counts: BTreeMap<String, u64>,
}

impl StatsAccumulator {
    pub fn record(&mut self, attempt: &AttemptRecord) {
        self.total_attempts += 1;
        self.score_sum += u64::from(attempt.overall_score);
        if attempt.solved() {
            self.problems_solved += 1;
        }
        *self.difficulty_counts.entry(attempt.difficulty).or_insert(0) += 1;
        if !attempt.solved() {
            for tag in &attempt.tags {
                *self.weak_tag_counts.entry(tag.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn average_score(&self) -> u32 {
        if self.total_attempts == 0 {
            return 0;
        }
        (self.score_sum / self.total_attempts) as u32
    }

    /// Most attempted difficulty; medium until something was attempted.
    pub fn favorite_difficulty(&self) -> Difficulty {
        let mut favorite = Difficulty::Medium;
        let mut best = 0;
        for difficulty in Difficulty::ALL {
            let count = self.difficulty_counts.get(&difficulty).copied().unwrap_or(0);
            if count > best {
                favorite = difficulty;
                best = count;
            }
        }
        favorite
    }

    pub fn improvement_areas(&self) -> Vec<String> {
        let mut tags: Vec<(&String, &u64)> = self.weak_tag_counts.iter().collect();
        tags.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        tags.into_iter()
            .take(IMPROVEMENT_AREAS_LIMIT)
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    pub fn snapshot(&self, recent_sessions: Vec<RecentSession>) -> AggregateStats {
        AggregateStats {
            total_attempts: self.total_attempts,
            average_score: self.average_score(),
            problems_solved: self.problems_solved,
            favorite_difficulty: self.favorite_difficulty(),
            improvement_areas: self.improvement_areas(),
            recent_sessions,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SystemStats {
    pub ai_enabled: bool,
    pub total_sessions: usize,
    pub active_sessions: usize,
    pub completed_sessions: usize,
    pub average_session_minutes: Option<i64>,
    pub most_popular_difficulty: Difficulty,
    pub success_rate: u32,
}

impl SystemStats {
    pub fn collect(sessions: &[Session], stats: &AggregateStats, ai_enabled: bool) -> Self {
        let completed: Vec<i64> = sessions
            .iter()
            .filter_map(|session| session.duration_minutes)
            .collect();
        let active_sessions = sessions.iter().filter(|s| s.is_active()).count();

        let mut by_difficulty: BTreeMap<Difficulty, usize> = BTreeMap::new();
        for session in sessions {
            *by_difficulty.entry(session.difficulty).or_insert(0) += 1;
        }
        let most_popular_difficulty = Difficulty::ALL
            .into_iter()
            .fold((Difficulty::Medium, 0), |best, difficulty| {
                let count = by_difficulty.get(&difficulty).copied().unwrap_or(0);
                if count > best.1 {
                    (difficulty, count)
                } else {
                    best
                }
            })
            .0;

        let success_rate = if stats.total_attempts == 0 {
            0
        } else {
            (stats.problems_solved * 100 / stats.total_attempts) as u32
        };

        Self {
            ai_enabled,
            total_sessions: sessions.len(),
            active_sessions,
            completed_sessions: completed.len(),
            average_session_minutes: if completed.is_empty() {
                None
            } else {
                Some(completed.iter().sum::<i64>() / completed.len() as i64)
            },
            most_popular_difficulty,
            success_rate,
        }
    }
}
