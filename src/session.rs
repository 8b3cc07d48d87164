use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::{QuizError, Result};
use crate::providers::{synthesize_with_retry, Delay, RetryPolicy, SpeechProvider};
use crate::scoring::{is_case_insensitive_match, similarity_ratio};
use crate::types::*;

/// One learner's run through a word pool.
#[derive(Debug)]
pub struct QuizSession<R = StdRng> {
    pool: WordPool,
    consumed: Vec<String>,
    skipped: HashSet<String>,
    current_word: Option<String>,
    submitted: bool,
    score: u32,
    total: u32,
    history: Vec<bool>,
    review_list: Vec<ReviewEntry>,
    competition: Competition,
    last_resolution: Option<Resolution>,
    rng: R,
}

impl QuizSession<StdRng> {
    pub fn new(pool: WordPool, competition: CompetitionConfig) -> Self {
        Self::with_rng(pool, competition, StdRng::from_entropy())
    }

    pub fn seeded(pool: WordPool, competition: CompetitionConfig, seed: u64) -> Self {
        Self::with_rng(pool, competition, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> QuizSession<R> {
    pub fn with_rng(pool: WordPool, competition: CompetitionConfig, rng: R) -> Self {
        let mut session = Self {
            pool: WordPool::empty(),
            consumed: Vec::new(),
            skipped: HashSet::new(),
            current_word: None,
            submitted: false,
            score: 0,
            total: 0,
            history: Vec::new(),
            review_list: Vec::new(),
            competition: Competition::new(competition),
            last_resolution: None,
            rng,
        };
        session.start(pool, competition);
        session
    }

    /// Installs a fresh pool and wipes all progress.
    pub fn start(&mut self, pool: WordPool, competition: CompetitionConfig) {
        info!(
            words = pool.len(),
            grading = ?pool.grading(),
            competition = competition.enabled,
            seconds_per_word = competition.seconds_per_word,
            "Starting quiz session"
        );
        self.pool = pool;
        self.competition = Competition::new(competition);
        self.reset_progress();
    }

    /// Changes the competition settings without touching progress.
    pub fn set_competition(&mut self, config: CompetitionConfig) {
        self.competition.config = config;
        if !config.enabled {
            self.competition.clear();
        }
        debug!(enabled = config.enabled, seconds = config.seconds_per_word, "Competition settings changed");
    }

    pub fn phase(&self) -> Phase {
        match (&self.current_word, self.submitted) {
            (Some(_), false) => Phase::AwaitingAnswer,
            (Some(_), true) => Phase::Resolved,
            (None, _) if self.remaining() == 0 => Phase::Complete,
            (None, _) => Phase::Idle,
        }
    }

    pub fn remaining(&self) -> usize {
        self.pool.len().saturating_sub(self.consumed.len())
    }

    /// Picks an unconsumed word uniformly at random.
    ///
    /// Allowed from `Idle` or `Resolved`; a resolved word is cleared first.
    pub fn draw_next(&mut self) -> Result<String> {
        if self.current_word.is_some() && !self.submitted {
            return Err(QuizError::InvalidState(
                "current word has not been answered or skipped".into(),
            ));
        }
        self.clear_current();

        let available: Vec<&String> = self
            .pool
            .words()
            .iter()
            .filter(|w| !self.consumed.contains(w))
            .collect();
        let word = match available.choose(&mut self.rng) {
            Some(word) => (*word).clone(),
            None => {
                info!(total = self.total, score = self.score, "Word pool exhausted");
                return Err(QuizError::PoolExhausted);
            }
        };

        debug!(word = %word, remaining = available.len(), "Drew next word");
        self.current_word = Some(word.clone());
        Ok(word)
    }

    /// Records a successful playback; starts the competition clock once per word.
    ///
    /// Returns whether the clock was started by this call.
    pub fn record_playback(&mut self, now: DateTime<Utc>) -> Result<bool> {
        if self.current_word.is_none() {
            return Err(QuizError::InvalidState("no word to play".into()));
        }
        let starts = self.competition.config.enabled
            && self.competition.started_at.is_none()
            && !self.submitted;
        if starts {
            self.competition.started_at = Some(now);
            debug!(at = %now, "Competition timer started");
        }
        Ok(starts)
    }

    /// Speaks the current word through `speech`, retrying per `policy`.
    ///
    /// A failure leaves the word awaiting an answer.
    pub fn request_playback<P, D>(
        &mut self,
        speech: &P,
        rate_percent: u32,
        policy: &RetryPolicy,
        delay: &D,
        clock: &dyn Clock,
    ) -> Result<Vec<u8>>
    where
        P: SpeechProvider + ?Sized,
        D: Delay + ?Sized,
    {
        let word = self
            .current_word
            .clone()
            .ok_or_else(|| QuizError::InvalidState("no word to play".into()))?;
        match synthesize_with_retry(speech, &word, rate_percent, policy, delay) {
            Ok(audio) => {
                self.record_playback(clock.now())?;
                Ok(audio)
            }
            Err(e) => {
                warn!(word = %word, error = %e, "Playback failed");
                Err(e.into())
            }
        }
    }

    pub fn submit_answer(&mut self, text: &str) -> Result<Resolution> {
        let expected = match (&self.current_word, self.submitted) {
            (Some(word), false) => word.clone(),
            (Some(_), true) => {
                return Err(QuizError::InvalidState("answer already recorded".into()))
            }
            (None, _) => return Err(QuizError::InvalidState("no current word".into())),
        };
        let answer = text.trim();
        if answer.is_empty() {
            return Err(QuizError::EmptyInput);
        }

        let resolution = if self.pool.grading().accepts(answer, &expected) {
            self.resolve(expected, text.to_string(), 1.0, None)
        } else {
            let similarity = similarity_ratio(answer, &expected);
            let cause = if is_case_insensitive_match(answer, &expected) {
                MissCause::CaseOnly
            } else {
                MissCause::Spelling
            };
            self.resolve(expected, text.to_string(), similarity, Some(cause))
        };

        info!(
            word = %resolution.word,
            answer = %resolution.answer,
            correct = resolution.correct,
            similarity = resolution.similarity,
            score = self.score,
            total = self.total,
            "Answer submitted"
        );
        Ok(resolution)
    }

    /// Moves the current word to `consumed` without scoring it.
    pub fn skip_current(&mut self) -> Result<String> {
        let word = match (&self.current_word, self.submitted) {
            (Some(word), false) => word.clone(),
            (Some(_), true) => {
                return Err(QuizError::InvalidState("word already resolved".into()))
            }
            (None, _) => return Err(QuizError::InvalidState("no current word".into())),
        };
        self.consumed.push(word.clone());
        self.skipped.insert(word.clone());
        self.clear_current();
        info!(word = %word, remaining = self.remaining(), "Word skipped");
        Ok(word)
    }

    /// Host-driven timer poll. Resolves the word as a miss once time runs out.
    pub fn tick_timer(&mut self, now: DateTime<Utc>) -> TickOutcome {
        if !self.timer_should_poll() {
            if self.competition.config.enabled && self.current_word.is_some() && !self.submitted {
                return TickOutcome::NotStarted;
            }
            return TickOutcome::Inactive;
        }

        let elapsed = self.competition.elapsed_secs(now).unwrap_or(0.0);
        let limit = self.competition.config.seconds_per_word as f64;
        if elapsed < limit {
            return TickOutcome::Running {
                remaining_secs: limit - elapsed,
            };
        }

        let expected = match self.current_word.clone() {
            Some(word) => word,
            None => return TickOutcome::Inactive,
        };
        self.competition.expired = true;
        let resolution = self.resolve(expected, String::new(), 0.0, Some(MissCause::Timeout));
        info!(word = %resolution.word, elapsed, total = self.total, "Time expired");
        TickOutcome::Expired(resolution)
    }

    /// True while a started competition clock is waiting on an answer.
    pub fn timer_should_poll(&self) -> bool {
        self.competition.config.enabled
            && self.current_word.is_some()
            && self.competition.started_at.is_some()
            && !self.submitted
            && !self.competition.expired
    }

    pub fn advance(&mut self) -> Result<Phase> {
        if self.phase() != Phase::Resolved {
            return Err(QuizError::InvalidState("current word is not resolved".into()));
        }
        self.clear_current();
        Ok(self.phase())
    }

    /// Clears everything except the pool.
    pub fn reset_progress(&mut self) {
        self.consumed.clear();
        self.skipped.clear();
        self.score = 0;
        self.total = 0;
        self.history.clear();
        self.review_list.clear();
        self.last_resolution = None;
        self.clear_current();
        debug!("Progress reset");
    }

    pub fn clear_review_list(&mut self) {
        self.review_list.clear();
    }

    fn clear_current(&mut self) {
        self.current_word = None;
        self.submitted = false;
        self.competition.clear();
    }

    fn resolve(
        &mut self,
        expected: String,
        answer: String,
        similarity: f64,
        cause: Option<MissCause>,
    ) -> Resolution {
        let correct = cause.is_none();
        self.total += 1;
        self.consumed.push(expected.clone());
        self.history.push(correct);
        if correct {
            self.score += 1;
        }
        if let Some(cause) = cause {
            self.review_list.push(ReviewEntry {
                expected: expected.clone(),
                submitted: answer.clone(),
                similarity,
                cause,
            });
        }
        self.submitted = true;

        let resolution = Resolution {
            word: expected,
            answer,
            correct,
            similarity,
            cause,
        };
        self.last_resolution = Some(resolution.clone());
        resolution
    }

    pub fn pool(&self) -> &WordPool {
        &self.pool
    }

    pub fn consumed(&self) -> &[String] {
        &self.consumed
    }

    pub fn current_word(&self) -> Option<&str> {
        self.current_word.as_deref()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn history(&self) -> &[bool] {
        &self.history
    }

    pub fn review_list(&self) -> &[ReviewEntry] {
        &self.review_list
    }

    pub fn competition(&self) -> &Competition {
        &self.competition
    }

    pub fn last_resolution(&self) -> Option<&Resolution> {
        self.last_resolution.as_ref()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }

    /// Scored words paired with their outcome, oldest first.
    pub fn graded_words(&self) -> Vec<(&str, bool)> {
        self.consumed
            .iter()
            .filter(|w| !self.skipped.contains(*w))
            .map(String::as_str)
            .zip(self.history.iter().copied())
            .collect()
    }

    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.score as f64 / self.total as f64 * 100.0
    }

    pub fn current_streak(&self) -> usize {
        current_streak(&self.history)
    }

    pub fn best_streak(&self) -> usize {
        best_streak(&self.history)
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> SessionSnapshot {
        SessionSnapshot {
            phase: self.phase(),
            word_length: self.current_word.as_ref().map(|w| w.chars().count()),
            pool_size: self.pool.len(),
            remaining: self.remaining(),
            score: self.score,
            total: self.total,
            accuracy: self.accuracy(),
            current_streak: self.current_streak(),
            best_streak: self.best_streak(),
            review_count: self.review_list.len(),
            timer_remaining_secs: if self.timer_should_poll() {
                self.competition.remaining_secs(now)
            } else {
                None
            },
        }
    }
}

/// Run of `true` at the end of `history`.
pub fn current_streak(history: &[bool]) -> usize {
    history.iter().rev().take_while(|&&ok| ok).count()
}

/// Longest run of consecutive `true` anywhere in `history`.
pub fn best_streak(history: &[bool]) -> usize {
    history
        .split(|&ok| !ok)
        .map(<[bool]>::len)
        .max()
        .unwrap_or(0)
}
