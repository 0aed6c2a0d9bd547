//! Heuristic scoring of submitted code.
//!
//! Nothing here executes or verifies the code: every sub-score is derived
//! from string patterns and elapsed time, and callers must treat the
//! correctness score in particular as an approximation.

use lazy_static::lazy_static;
use rand::Rng;
use regex::Regex;

use crate::models::{question::QuestionMeta, submission::ScoreReport};

/// Longest solution (in lines) that still earns the conciseness bonus.
const MAX_CONCISE_LINES: usize = 30;
/// Overall score from which the advanced interview tips are given.
const ADVANCED_TIPS_THRESHOLD: u32 = 80;

const TIPS_ADVANCED: &[&str] = &[
    "Walk the interviewer through your approach before you start coding",
    "Discuss trade-offs between alternative solutions",
    "Mention how the solution would scale with larger inputs",
    "Test your code out loud with edge cases",
];

const TIPS_FOUNDATION: &[&str] = &[
    "Always clarify requirements before coding",
    "Start with a brute-force solution, then optimize",
    "Think about edge cases early",
    "Explain your approach before implementation",
    "Test with multiple examples",
];

lazy_static! {
    static ref DEFINITION: Regex = Regex::new(
        r"\b(def|class|fn|func|function|struct|impl)\s+[A-Za-z_]\w*|\b(public|private|protected|static)\s+[\w<>\[\], ]+\("
    )
    .unwrap();
    static ref ASSIGNMENT: Regex =
        Regex::new(r"[\w\])]\s*(\+|-|\*|/|%|//|\*\*)?=([^=]|$)").unwrap();
    static ref OUTPUT: Regex = Regex::new(
        r"\b(return|yield|print|println|printf|puts|cout)\b|console\.log|System\.out\.print"
    )
    .unwrap();
    static ref CONTROL_FLOW: Regex = Regex::new(r"\b(for|while|if)\b").unwrap();
    static ref ERROR_HANDLING: Regex =
        Regex::new(r"\b(try|except|catch|raise|throw|throws|finally|Err)\b").unwrap();
    static ref LOOP: Regex = Regex::new(r"\b(for|while|forEach)\b").unwrap();
    static ref LINEAR_SPACE: Regex = Regex::new(
        r"\{\s*\}|\[\s*\]|\b(dict|set|list|defaultdict|Counter)\(|HashMap|HashSet|\bnew\s+(Map|Set)\b|\.append\(|\.push\(|\.add\("
    )
    .unwrap();
}

const COMMENT_MARKERS: &[&str] = &["#", "//", "/*", "\"\"\"", "'''"];
const COMMENT_LINE_PREFIXES: &[&str] = &["#", "//", "/*", "*", "\"\"\"", "'''"];

/// Coarse complexity class guessed from loop nesting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeComplexity {
    LinearOrBetter,
    Quadratic,
    CubicOrWorse,
}

impl TimeComplexity {
    pub fn from_loop_count(loops: usize) -> Self {
        match loops {
            0 | 1 => TimeComplexity::LinearOrBetter,
            2 => TimeComplexity::Quadratic,
            _ => TimeComplexity::CubicOrWorse,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeComplexity::LinearOrBetter => "linear or better",
            TimeComplexity::Quadratic => "quadratic",
            TimeComplexity::CubicOrWorse => "cubic or worse",
        }
    }

    fn score_range(&self) -> std::ops::RangeInclusive<u32> {
        match self {
            TimeComplexity::LinearOrBetter => 85..=95,
            TimeComplexity::Quadratic => 65..=80,
            TimeComplexity::CubicOrWorse => 40..=65,
        }
    }
}

#[derive(Debug, Default)]
struct Notes {
    feedback: Vec<String>,
    improvements: Vec<String>,
}

impl Notes {
    fn praise(&mut self, text: &str) {
        self.feedback.push(text.to_string());
    }

    fn suggest(&mut self, text: &str) {
        self.improvements.push(text.to_string());
    }
}

/// Scores a submission. `rng` only drives the efficiency sub-score.
pub fn analyze<R: Rng + ?Sized>(
    question: &QuestionMeta,
    code: &str,
    time_taken_seconds: u64,
    rng: &mut R,
) -> ScoreReport {
    let mut notes = Notes::default();

    let time_management_score =
        time_management_score(question.time_limit_minutes, time_taken_seconds, &mut notes);

    let has_code = !code.trim().is_empty();
    let (code_quality_score, correctness_score, efficiency_score, time_complexity, space_complexity) =
        if has_code {
            let quality = code_quality_score(code, &mut notes);
            let correctness = correctness_score(code, &mut notes);
            let complexity = TimeComplexity::from_loop_count(LOOP.find_iter(code).count());
            let efficiency = rng.random_range(complexity.score_range());
            if complexity != TimeComplexity::LinearOrBetter {
                notes.suggest("Look for a way to reduce nested loops, e.g. with a hash map or two pointers");
            }
            (
                quality,
                correctness,
                efficiency,
                complexity.label().to_string(),
                space_label(code).to_string(),
            )
        } else {
            notes.suggest("Submit a solution so it can be analyzed");
            (0, 0, 0, "unknown".to_string(), "unknown".to_string())
        };

    let overall_score =
        (correctness_score + efficiency_score + code_quality_score + time_management_score) / 4;

    let tips = if overall_score >= ADVANCED_TIPS_THRESHOLD {
        TIPS_ADVANCED
    } else {
        TIPS_FOUNDATION
    };

    ScoreReport {
        correctness_score,
        efficiency_score,
        code_quality_score,
        time_management_score,
        overall_score,
        feedback: notes.feedback,
        improvements: notes.improvements,
        time_complexity,
        space_complexity,
        interview_tips: tips.iter().map(|t| t.to_string()).collect(),
    }
}

fn time_management_score(limit_minutes: u32, time_taken_seconds: u64, notes: &mut Notes) -> u32 {
    let limit_seconds = u64::from(limit_minutes) * 60;
    let ratio = if limit_seconds == 0 {
        1.0
    } else {
        time_taken_seconds as f64 / limit_seconds as f64
    };

    if ratio <= 0.6 {
        notes.praise("Excellent time management!");
        95
    } else if ratio <= 0.8 {
        notes.praise("Good time management.");
        85
    } else if ratio <= 1.0 {
        notes.praise("Finished within the time limit.");
        notes.suggest("Practice similar problems to leave more time for testing");
        75
    } else {
        notes.suggest("Went over the time limit; settle on an approach sooner and iterate");
        50
    }
}

fn is_comment_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    COMMENT_LINE_PREFIXES
        .iter()
        .any(|prefix| trimmed.starts_with(prefix))
}

fn code_quality_score(code: &str, notes: &mut Notes) -> u32 {
    let mut score = 0;

    if DEFINITION.is_match(code) {
        score += 25;
        notes.praise("Solution is organized into functions or classes");
    } else {
        notes.suggest("Wrap the solution in a named function");
    }

    if COMMENT_MARKERS.iter().any(|marker| code.contains(marker)) {
        score += 20;
        notes.praise("Good job adding comments!");
    } else {
        notes.suggest("Add comments explaining the key steps");
    }

    if code
        .lines()
        .filter(|line| !is_comment_line(line))
        .any(|line| ASSIGNMENT.is_match(line))
    {
        score += 15;
    }

    if code.lines().count() <= MAX_CONCISE_LINES {
        score += 20;
    } else {
        notes.suggest("Consider breaking down your solution into smaller functions");
    }

    score
}

fn correctness_score(code: &str, notes: &mut Notes) -> u32 {
    let mut score = 0;

    if OUTPUT.is_match(code) {
        score += 40;
    } else {
        notes.suggest("Make sure the solution returns or prints its result");
    }

    if CONTROL_FLOW.is_match(code) {
        score += 30;
    }

    if ERROR_HANDLING.is_match(code) {
        score += 20;
    } else {
        notes.suggest("Consider edge cases and invalid input more thoroughly");
    }

    score
}

fn space_label(code: &str) -> &'static str {
    if LINEAR_SPACE.is_match(code) {
        "linear"
    } else {
        "constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use rand::{rngs::StdRng, SeedableRng};

    fn meta(limit: u32) -> QuestionMeta {
        QuestionMeta {
            id: "q".into(),
            title: "Q".into(),
            description: String::new(),
            difficulty: Difficulty::Easy,
            tags: vec![],
            time_limit_minutes: limit,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    const TWO_SUM: &str = r#"def two_sum(nums, target):
    # remember where each value was seen
    seen = {}
    for i, n in enumerate(nums):
        if target - n in seen:
            return [seen[target - n], i]
        seen[n] = i
    raise ValueError("no pair")
"#;

    #[test]
    fn test_simple_function_scores() {
        let report = analyze(&meta(15), "def solve(): return 1", 300, &mut rng());
        assert!(report.time_management_score >= 85);
        assert!(report.code_quality_score >= 25);
        assert!(report.correctness_score >= 40);
    }

    #[test]
    fn test_overall_is_floor_of_mean() {
        let mut rng = rng();
        for (code, secs) in [(TWO_SUM, 100), ("x = 1", 5000), ("", 10), ("for a in b:\n  for c in d:\n    print(c)", 700)] {
            let report = analyze(&meta(15), code, secs, &mut rng);
            assert!(report.sub_scores_in_range());
            assert_eq!(report.overall_score, report.mean_of_sub_scores());
        }
    }

    #[test]
    fn test_time_management_breakpoints() {
        let mut notes = Notes::default();
        // 10 minute limit = 600 seconds
        assert_eq!(time_management_score(10, 360, &mut notes), 95);
        assert_eq!(time_management_score(10, 361, &mut notes), 85);
        assert_eq!(time_management_score(10, 480, &mut notes), 85);
        assert_eq!(time_management_score(10, 600, &mut notes), 75);
        assert_eq!(time_management_score(10, 601, &mut notes), 50);
    }

    #[test]
    fn test_time_management_is_non_increasing() {
        let mut notes = Notes::default();
        let mut previous = u32::MAX;
        for secs in (0..2000).step_by(7) {
            let score = time_management_score(15, secs, &mut notes);
            assert!(score <= previous, "score rose at {} seconds", secs);
            previous = score;
        }
    }

    #[test]
    fn test_zero_time_limit_counts_as_at_limit() {
        let report = analyze(&meta(0), "def f(): return 1", 12345, &mut rng());
        assert_eq!(report.time_management_score, 75);
    }

    #[test]
    fn test_empty_code_only_scores_time() {
        let report = analyze(&meta(15), "   \n  ", 60, &mut rng());
        assert_eq!(report.time_management_score, 95);
        assert_eq!(report.code_quality_score, 0);
        assert_eq!(report.correctness_score, 0);
        assert_eq!(report.efficiency_score, 0);
        assert_eq!(report.overall_score, 23);
        assert_eq!(report.time_complexity, "unknown");
    }

    #[test]
    fn test_full_quality_caps_at_eighty() {
        let report = analyze(&meta(15), TWO_SUM, 100, &mut rng());
        assert_eq!(report.code_quality_score, 80);
        assert_eq!(report.correctness_score, 90);
        assert_eq!(report.space_complexity, "linear");
        assert_eq!(report.time_complexity, "linear or better");
        assert!((85..=95).contains(&report.efficiency_score));
    }

    #[test]
    fn test_long_code_loses_conciseness_bonus() {
        let code = format!("def f():\n{}    return 0\n", "    x = 1\n".repeat(40));
        let report = analyze(&meta(15), &code, 100, &mut rng());
        assert_eq!(report.code_quality_score, 25 + 15);
        assert!(report
            .improvements
            .iter()
            .any(|i| i.contains("smaller functions")));
    }

    #[test]
    fn test_comparison_is_not_assignment() {
        let mut notes = Notes::default();
        // no definition, no comment, no assignment, short
        assert_eq!(code_quality_score("if a == b and c <= d: pass", &mut notes), 20);
    }

    #[test]
    fn test_assignment_inside_comment_is_ignored() {
        let mut notes = Notes::default();
        // comment marker (+20) and short (+20), but the only assignment is commented out
        assert_eq!(code_quality_score("# x = 1\npass", &mut notes), 40);
    }

    #[test]
    fn test_loop_count_drives_efficiency() {
        let mut rng = rng();
        let quadratic = "for i in a:\n    for j in b:\n        print(i, j)";
        let report = analyze(&meta(15), quadratic, 100, &mut rng);
        assert_eq!(report.time_complexity, "quadratic");
        assert!((65..=80).contains(&report.efficiency_score));

        let cubic = "for i in a:\n for j in b:\n  while k:\n   k -= 1";
        let report = analyze(&meta(15), cubic, 100, &mut rng);
        assert_eq!(report.time_complexity, "cubic or worse");
        assert!((40..=65).contains(&report.efficiency_score));
        assert_eq!(report.space_complexity, "constant");
    }

    #[test]
    fn test_same_seed_gives_same_report() {
        let a = analyze(&meta(20), TWO_SUM, 500, &mut StdRng::seed_from_u64(9));
        let b = analyze(&meta(20), TWO_SUM, 500, &mut StdRng::seed_from_u64(9));
        assert_eq!(a, b);
    }

    #[test]
    fn test_tip_set_follows_overall() {
        let strong = analyze(&meta(15), TWO_SUM, 100, &mut rng());
        assert!(strong.overall_score >= ADVANCED_TIPS_THRESHOLD);
        assert_eq!(strong.interview_tips[0], TIPS_ADVANCED[0]);

        let weak = analyze(&meta(15), "", 5000, &mut rng());
        assert_eq!(weak.interview_tips[0], TIPS_FOUNDATION[0]);
    }
}
