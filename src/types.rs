use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::error::{QuizError, Result};

/// How strictly a source wants answers graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Grading {
    CaseSensitive,
    CaseInsensitive,
}

impl Grading {
    pub fn accepts(self, answer: &str, expected: &str) -> bool {
        match self {
            Grading::CaseSensitive => crate::scoring::is_exact(answer, expected),
            Grading::CaseInsensitive => crate::scoring::is_case_insensitive_match(answer, expected),
        }
    }
}

/// Sub-range of a loaded word list. Bounds are 1-based and inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PoolRange {
    First10,
    From11To25,
    From26To50,
    From51To100,
    All,
    Custom { start: usize, end: usize },
}

impl Default for PoolRange {
    fn default() -> Self {
        PoolRange::Custom { start: 1, end: 50 }
    }
}

impl PoolRange {
    pub const PRESETS: [PoolRange; 5] = [
        PoolRange::First10,
        PoolRange::From11To25,
        PoolRange::From26To50,
        PoolRange::From51To100,
        PoolRange::All,
    ];

    /// Zero-based half-open bounds, `None` meaning "to the end".
    fn bounds(&self) -> Result<(usize, Option<usize>)> {
        match *self {
            PoolRange::First10 => Ok((0, Some(10))),
            PoolRange::From11To25 => Ok((10, Some(25))),
            PoolRange::From26To50 => Ok((25, Some(50))),
            PoolRange::From51To100 => Ok((50, Some(100))),
            PoolRange::All => Ok((0, None)),
            PoolRange::Custom { start, end } => {
                if start == 0 || start > end {
                    return Err(QuizError::InvalidState(format!(
                        "invalid word range {}-{}",
                        start, end
                    )));
                }
                Ok((start - 1, Some(end)))
            }
        }
    }
}

impl fmt::Display for PoolRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolRange::First10 => write!(f, "1-10"),
            PoolRange::From11To25 => write!(f, "11-25"),
            PoolRange::From26To50 => write!(f, "26-50"),
            PoolRange::From51To100 => write!(f, "51-100"),
            PoolRange::All => write!(f, "all"),
            PoolRange::Custom { start, end } => write!(f, "{}-{}", start, end),
        }
    }
}

/// Everything a word source produced, before a range is applied.
#[derive(Debug, Clone, PartialEq)]
pub struct WordList {
    pub words: Vec<String>,
    pub grading: Grading,
    pub label: String,
}

impl WordList {
    /// Slices out `range`, clamping to the list length like a slice would.
    pub fn select(&self, range: PoolRange) -> Result<WordPool> {
        let (start, end) = range.bounds()?;
        let end = end.unwrap_or(self.words.len()).min(self.words.len());
        let start = start.min(end);
        Ok(WordPool::new(self.words[start..end].to_vec(), self.grading))
    }
}

/// The active, immutable set of candidate words for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct WordPool {
    words: Vec<String>,
    grading: Grading,
}

impl WordPool {
    pub fn new(words: Vec<String>, grading: Grading) -> Self {
        let mut seen = HashSet::new();
        let words = words
            .into_iter()
            .filter(|w| seen.insert(w.clone()))
            .collect();
        Self { words, grading }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Grading::CaseSensitive)
    }

    pub fn words(&self) -> &[String] {
        &self.words
    }

    pub fn grading(&self) -> Grading {
        self.grading
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MissCause {
    Spelling,
    CaseOnly,
    Timeout,
}

impl fmt::Display for MissCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissCause::Spelling => write!(f, "Spelling Error"),
            MissCause::CaseOnly => write!(f, "Case Error"),
            MissCause::Timeout => write!(f, "Time Expired"),
        }
    }
}

/// A word the learner did not get exactly right.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub expected: String,
    pub submitted: String,
    pub similarity: f64,
    pub cause: MissCause,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionConfig {
    pub enabled: bool,
    pub seconds_per_word: u32,
}

impl CompetitionConfig {
    pub const MIN_SECONDS: u32 = 5;
    pub const MAX_SECONDS: u32 = 120;

    pub fn new(enabled: bool, seconds_per_word: u32) -> Self {
        Self {
            enabled,
            seconds_per_word: seconds_per_word.clamp(Self::MIN_SECONDS, Self::MAX_SECONDS),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 30)
    }
}

impl Default for CompetitionConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Per-word timer state for competition mode.
#[derive(Debug, Clone, PartialEq)]
pub struct Competition {
    pub config: CompetitionConfig,
    pub started_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

impl Competition {
    pub fn new(config: CompetitionConfig) -> Self {
        Self {
            config,
            started_at: None,
            expired: false,
        }
    }

    pub fn clear(&mut self) {
        self.started_at = None;
        self.expired = false;
    }

    pub fn elapsed_secs(&self, now: DateTime<Utc>) -> Option<f64> {
        self.started_at
            .map(|start| (now - start).num_milliseconds().max(0) as f64 / 1000.0)
    }

    pub fn remaining_secs(&self, now: DateTime<Utc>) -> Option<f64> {
        self.elapsed_secs(now)
            .map(|elapsed| (self.config.seconds_per_word as f64 - elapsed).max(0.0))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Idle,
    AwaitingAnswer,
    Resolved,
    Complete,
}

/// Result of resolving the current word, by answer or by timeout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub word: String,
    pub answer: String,
    pub correct: bool,
    pub similarity: f64,
    pub cause: Option<MissCause>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Nothing to poll for; the host should stop its timer.
    Inactive,
    /// Word drawn but playback has not started the clock yet.
    NotStarted,
    Running { remaining_secs: f64 },
    Expired(Resolution),
}

/// Observable state handed to the host view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub phase: Phase,
    pub word_length: Option<usize>,
    pub pool_size: usize,
    pub remaining: usize,
    pub score: u32,
    pub total: u32,
    pub accuracy: f64,
    pub current_streak: usize,
    pub best_streak: usize,
    pub review_count: usize,
    pub timer_remaining_secs: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn list(n: usize) -> WordList {
        WordList {
            words: (1..=n).map(|i| format!("word{}", i)).collect(),
            grading: Grading::CaseSensitive,
            label: "test".into(),
        }
    }

    #[test]
    fn presets_slice_expected_windows() {
        let l = list(120);
        let pool = l.select(PoolRange::From11To25).unwrap();
        assert_eq!(pool.len(), 15);
        assert_eq!(pool.words()[0], "word11");
        assert_eq!(l.select(PoolRange::All).unwrap().len(), 120);
        assert_eq!(l.select(PoolRange::default()).unwrap().len(), 50);
    }

    #[test]
    fn ranges_clamp_to_short_lists() {
        let l = list(30);
        assert_eq!(l.select(PoolRange::From26To50).unwrap().len(), 5);
        assert!(l.select(PoolRange::From51To100).unwrap().is_empty());
    }

    #[test]
    fn custom_range_is_inclusive_and_validated() {
        let l = list(20);
        let pool = l.select(PoolRange::Custom { start: 3, end: 5 }).unwrap();
        assert_eq!(pool.words(), &["word3", "word4", "word5"]);
        assert!(l.select(PoolRange::Custom { start: 6, end: 5 }).is_err());
        assert!(l.select(PoolRange::Custom { start: 0, end: 5 }).is_err());
    }

    #[test]
    fn pool_drops_duplicates_keeping_order() {
        let pool = WordPool::new(
            vec!["b".into(), "a".into(), "b".into()],
            Grading::CaseSensitive,
        );
        assert_eq!(pool.words(), &["b", "a"]);
    }

    #[test]
    fn competition_seconds_are_clamped() {
        assert_eq!(CompetitionConfig::new(true, 1).seconds_per_word, 5);
        assert_eq!(CompetitionConfig::new(true, 500).seconds_per_word, 120);
    }

    #[test]
    fn grading_modes() {
        assert!(!Grading::CaseSensitive.accepts("apple", "Apple"));
        assert!(Grading::CaseInsensitive.accepts("apple", "Apple"));
    }
}
