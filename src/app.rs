use std::collections::HashMap;
use std::sync::Arc;

use ratatui::layout::Alignment;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph, Wrap},
    Frame,
};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, error, info, warn};

use crate::clock::Clock;
use crate::config::Config;
use crate::error::{ProviderError, QuizError, Result};
use crate::providers::{
    clamp_rate, synthesize_with_retry, CommandPlayer, LexicalInfo, LexicalInfoProvider,
    SpeechProvider, ThreadSleep,
};
use crate::scoring::{check_spelling, hint_for, SpellCheck};
use crate::session::QuizSession;
use crate::sources::{Level, LevelSource, WordSource};
use crate::types::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Quiz,
    SpellCheck,
    Pronounce,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Info(String),
    Success(String),
    Warning(String),
}

impl Notice {
    fn color(&self) -> Color {
        match self {
            Notice::Info(_) => Color::Cyan,
            Notice::Success(_) => Color::Green,
            Notice::Warning(_) => Color::Yellow,
        }
    }

    fn text(&self) -> &str {
        match self {
            Notice::Info(s) | Notice::Success(s) | Notice::Warning(s) => s,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupPurpose {
    /// Definitions shown while answering.
    Hint,
    Pronunciation,
}

/// Results coming back from blocking workers.
#[derive(Debug)]
pub enum WorkerResponse {
    /// Playback of a quiz word; only this one can start the competition timer.
    Playback {
        word: String,
        result: std::result::Result<(), ProviderError>,
    },
    Speech {
        text: String,
        result: std::result::Result<(), ProviderError>,
    },
    Lookup {
        word: String,
        purpose: LookupPurpose,
        result: std::result::Result<LexicalInfo, ProviderError>,
    },
}

/// Collaborators the host view talks to.
pub struct Providers {
    pub speech: Arc<dyn SpeechProvider>,
    pub player: Option<Arc<CommandPlayer>>,
    pub lexicon: Option<Arc<dyn LexicalInfoProvider>>,
    pub clock: Arc<dyn Clock>,
}

pub struct App {
    pub session: QuizSession,
    pub list: WordList,
    pub range: PoolRange,
    pub level: Option<Level>,
    pub config: Config,
    pub screen: Screen,
    pub input_buffer: String,
    pub notice: Option<Notice>,
    pub word_info: Option<LexicalInfo>,
    pub spell_result: Option<(String, SpellCheck)>,
    /// Word typed on the pronunciation screen.
    pub pronounce_word: Option<String>,
    /// Quiz word whose playback job is in flight.
    pub playback_pending: Option<String>,
    /// Index into the review list picked for replay.
    pub review_cursor: Option<usize>,
    pub should_quit: bool,
    corpus: Vec<String>,
    seed: Option<u64>,
    providers: Providers,
    // lowercase word -> pronunciation, `None` once a lookup found nothing
    pronunciations: HashMap<String, Option<String>>,
    jobs_in_flight: usize,
    worker_tx: UnboundedSender<WorkerResponse>,
    worker_rx: UnboundedReceiver<WorkerResponse>,
}

impl App {
    pub fn new(
        list: WordList,
        level: Option<Level>,
        config: Config,
        corpus: Vec<String>,
        providers: Providers,
        seed: Option<u64>,
    ) -> Result<Self> {
        let range = PoolRange::default();
        let pool = list.select(range)?;
        let competition = config.competition_config();
        let session = match seed {
            Some(seed) => QuizSession::seeded(pool, competition, seed),
            None => QuizSession::new(pool, competition),
        };
        let (worker_tx, worker_rx) = unbounded_channel();
        let notice = Some(Notice::Info(format!(
            "Loaded {} words from {}. Press Enter to get a word.",
            list.words.len(),
            list.label
        )));

        Ok(Self {
            session,
            list,
            range,
            level,
            config,
            screen: Screen::Quiz,
            input_buffer: String::new(),
            notice,
            word_info: None,
            spell_result: None,
            pronounce_word: None,
            playback_pending: None,
            review_cursor: None,
            should_quit: false,
            corpus,
            seed,
            providers,
            pronunciations: HashMap::new(),
            jobs_in_flight: 0,
            worker_tx,
            worker_rx,
        })
    }

    /// Turns a rejected action into a notice. Terminal and I/O failures are
    /// returned to the event loop instead.
    fn report(&mut self, err: QuizError) -> Result<()> {
        if matches!(
            err,
            QuizError::Io(_) | QuizError::Serialization(_) | QuizError::Terminal(_)
        ) {
            error!(error = %err, "Unrecoverable error");
            return Err(err);
        }
        warn!(error = %err, "Action rejected");
        let text = match err {
            QuizError::EmptyInput => "Please enter a word before checking.".to_string(),
            QuizError::PoolExhausted => format!(
                "All words done! Final score: {}/{}. Press Enter to start over.",
                self.session.score(),
                self.session.total()
            ),
            other => other.to_string(),
        };
        self.notice = Some(Notice::Warning(text));
        Ok(())
    }

    pub fn handle_enter(&mut self) -> Result<()> {
        match self.screen {
            Screen::SpellCheck => {
                self.check_spelling();
                return Ok(());
            }
            Screen::Pronounce => {
                self.pronounce();
                return Ok(());
            }
            Screen::Quiz => {}
        }

        match self.session.phase() {
            Phase::Idle | Phase::Resolved => self.draw_word()?,
            Phase::AwaitingAnswer => self.submit()?,
            Phase::Complete => {
                self.session.reset_progress();
                self.review_cursor = None;
                self.notice = Some(Notice::Info("Quiz reset. Press Enter for a word.".into()));
            }
        }
        Ok(())
    }

    fn draw_word(&mut self) -> Result<()> {
        self.word_info = None;
        self.input_buffer.clear();
        match self.session.draw_next() {
            Ok(word) => {
                self.notice = Some(Notice::Info(format!(
                    "Word selected! ({} letters) Listen and type it.",
                    word.chars().count()
                )));
                self.request_playback();
                Ok(())
            }
            Err(e) => self.report(e),
        }
    }

    fn submit(&mut self) -> Result<()> {
        let answer = self.input_buffer.clone();
        match self.session.submit_answer(&answer) {
            Ok(resolution) => {
                self.input_buffer.clear();
                if resolution.correct {
                    self.notice = Some(Notice::Success(format!("Correct! \"{}\"", resolution.word)));
                    self.lookup(resolution.word.clone(), LookupPurpose::Pronunciation);
                } else {
                    self.notice = Some(Notice::Warning(format!(
                        "Incorrect. The word was \"{}\" ({:.1}% similar). {}",
                        resolution.word,
                        resolution.similarity * 100.0,
                        hint_for(&resolution)
                    )));
                }
                Ok(())
            }
            Err(e) => self.report(e),
        }
    }

    pub fn handle_input(&mut self, c: char) {
        self.input_buffer.push(c);
    }

    pub fn handle_backspace(&mut self) {
        self.input_buffer.pop();
    }

    pub fn jobs_in_flight(&self) -> usize {
        self.jobs_in_flight
    }

    /// Speaks the current word on a blocking worker; the result arrives via
    /// `poll_workers`.
    pub fn request_playback(&mut self) {
        let word = match self.session.current_word() {
            Some(word) => word.to_string(),
            None => {
                self.notice = Some(Notice::Warning("Get a word first.".into()));
                return;
            }
        };
        if self.playback_pending.as_deref() == Some(word.as_str()) {
            debug!(word = %word, "Playback already in flight");
            return;
        }
        debug!(word = %word, rate = self.config.speech_rate, "Requesting playback");
        self.playback_pending = Some(word.clone());
        self.spawn_speech(word, true);
    }

    fn spawn_speech(&mut self, text: String, quiz_word: bool) {
        let speech = Arc::clone(&self.providers.speech);
        let player = self.providers.player.clone();
        let tx = self.worker_tx.clone();
        let policy = self.config.retry_policy();
        let rate = self.config.speech_rate;
        self.jobs_in_flight += 1;

        tokio::task::spawn_blocking(move || {
            let result = synthesize_with_retry(speech.as_ref(), &text, rate, &policy, &ThreadSleep)
                .and_then(|audio| match &player {
                    Some(player) => player.play(&audio),
                    None => Ok(()),
                });
            let response = if quiz_word {
                WorkerResponse::Playback { word: text, result }
            } else {
                WorkerResponse::Speech { text, result }
            };
            let _ = tx.send(response);
        });
    }

    /// Speaks arbitrary text without touching the session.
    pub fn speak_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            self.notice = Some(Notice::Warning("Type a word first.".into()));
            return;
        }
        info!(text, "Speaking free text");
        self.notice = Some(Notice::Info(format!("Speaking \"{}\"", text)));
        self.spawn_speech(text.to_string(), false);
    }

    fn lookup(&mut self, word: String, purpose: LookupPurpose) {
        let Some(lexicon) = self.providers.lexicon.clone() else {
            if purpose == LookupPurpose::Hint {
                self.notice = Some(Notice::Warning("No dictionary configured.".into()));
            }
            return;
        };
        if purpose == LookupPurpose::Pronunciation
            && self.pronunciations.contains_key(&word.to_lowercase())
        {
            return;
        }
        let tx = self.worker_tx.clone();
        let policy = self.config.retry_policy();
        self.jobs_in_flight += 1;
        debug!(word = %word, ?purpose, "Requesting lexical lookup");

        tokio::task::spawn_blocking(move || {
            let result = policy.run(&ThreadSleep, "lexicon", || lexicon.lookup(&word));
            let _ = tx.send(WorkerResponse::Lookup {
                word,
                purpose,
                result,
            });
        });
    }

    /// Applies finished background jobs.
    pub fn poll_workers(&mut self) -> Result<()> {
        while let Ok(response) = self.worker_rx.try_recv() {
            self.apply_response(response)?;
        }
        Ok(())
    }

    pub fn apply_response(&mut self, response: WorkerResponse) -> Result<()> {
        self.jobs_in_flight = self.jobs_in_flight.saturating_sub(1);
        match response {
            WorkerResponse::Playback { word, result } => self.apply_playback(word, result),
            WorkerResponse::Speech { text, result } => {
                if let Err(e) = result {
                    self.notice = Some(Notice::Warning(format!(
                        "Could not speak \"{}\": {}",
                        text, e
                    )));
                }
                Ok(())
            }
            WorkerResponse::Lookup {
                word,
                purpose,
                result,
            } => {
                self.apply_lookup(word, purpose, result);
                Ok(())
            }
        }
    }

    fn apply_playback(
        &mut self,
        word: String,
        result: std::result::Result<(), ProviderError>,
    ) -> Result<()> {
        if self.playback_pending.as_deref() == Some(word.as_str()) {
            self.playback_pending = None;
        }
        if self.session.current_word() != Some(word.as_str()) {
            debug!(word = %word, "Ignoring playback for a word no longer current");
            return Ok(());
        }
        match result {
            Ok(()) => match self.session.record_playback(self.providers.clock.now()) {
                Ok(true) => {
                    info!(word = %word, "Timer started after playback");
                    Ok(())
                }
                Ok(false) => Ok(()),
                Err(e) => self.report(e),
            },
            Err(e) => {
                self.notice = Some(Notice::Warning(format!(
                    "Could not generate audio after {} attempts: {}. You can still type an answer.",
                    self.config.retry_policy().attempts,
                    e
                )));
                Ok(())
            }
        }
    }

    fn apply_lookup(
        &mut self,
        word: String,
        purpose: LookupPurpose,
        result: std::result::Result<LexicalInfo, ProviderError>,
    ) {
        let info = match result {
            Ok(info) => info,
            Err(e) => {
                warn!(word = %word, error = %e, "Lexical lookup failed");
                if purpose == LookupPurpose::Hint {
                    self.notice = Some(Notice::Warning(format!(
                        "Could not look up the word: {}",
                        e
                    )));
                }
                return;
            }
        };
        self.pronunciations
            .insert(word.to_lowercase(), info.pronunciation.clone());

        if purpose != LookupPurpose::Hint {
            return;
        }
        let still_answering = self.session.phase() == Phase::AwaitingAnswer
            && self.session.current_word() == Some(word.as_str());
        if !still_answering {
            debug!(word = %word, "Dropping hint for a word no longer current");
        } else if info.is_empty() {
            self.word_info = None;
            self.notice = Some(Notice::Info("No definition found for this word.".into()));
        } else {
            self.word_info = Some(info);
        }
    }

    fn known_pronunciation(&self, word: &str) -> Option<&str> {
        self.pronunciations
            .get(&word.to_lowercase())
            .and_then(|p| p.as_deref())
    }

    /// Timer poll; the host calls this about once a second.
    pub fn tick(&mut self) {
        if !self.session.timer_should_poll() {
            return;
        }
        if let TickOutcome::Expired(resolution) = self.session.tick_timer(self.providers.clock.now()) {
            self.input_buffer.clear();
            self.notice = Some(Notice::Warning(hint_for(&resolution)));
        }
    }

    pub fn skip(&mut self) -> Result<()> {
        match self.session.skip_current() {
            Ok(word) => {
                self.input_buffer.clear();
                self.word_info = None;
                self.notice = Some(Notice::Info(format!(
                    "Skipped \"{}\". {} words remaining.",
                    word,
                    self.session.remaining()
                )));
                Ok(())
            }
            Err(e) => self.report(e),
        }
    }

    pub fn show_word_info(&mut self) {
        if self.session.phase() != Phase::AwaitingAnswer {
            self.notice = Some(Notice::Warning("Hints are available while answering.".into()));
            return;
        }
        if let Some(word) = self.session.current_word().map(str::to_string) {
            self.notice = Some(Notice::Info("Looking up the word...".into()));
            self.lookup(word, LookupPurpose::Hint);
        }
    }

    /// Moves the replay cursor to the next older review entry, wrapping to the newest.
    pub fn select_next_review(&mut self) {
        let len = self.session.review_list().len();
        if len == 0 {
            self.review_cursor = None;
            self.notice = Some(Notice::Warning("The revision list is empty.".into()));
            return;
        }
        self.review_cursor = Some(match self.review_cursor {
            Some(i) if i > 0 && i < len => i - 1,
            _ => len - 1,
        });
    }

    pub fn selected_review(&self) -> Option<&ReviewEntry> {
        self.review_cursor
            .and_then(|i| self.session.review_list().get(i))
    }

    /// Speaks the expected word of the selected review entry.
    pub fn speak_review_entry(&mut self) {
        match self.selected_review().map(|e| e.expected.clone()) {
            Some(word) => self.speak_text(&word),
            None => {
                self.notice = Some(Notice::Warning(
                    "Select a revision entry first (F9).".into(),
                ))
            }
        }
    }

    fn apply_range(&mut self, range: PoolRange) -> Result<()> {
        match self.list.select(range) {
            Ok(pool) => {
                self.range = range;
                self.session.start(pool, self.config.competition_config());
                self.input_buffer.clear();
                self.word_info = None;
                self.review_cursor = None;
                self.notice = Some(Notice::Info(format!(
                    "Currently practicing {} words from total {} words.",
                    self.session.pool().len(),
                    self.list.words.len()
                )));
                Ok(())
            }
            Err(e) => self.report(e),
        }
    }

    pub fn cycle_range(&mut self) -> Result<()> {
        let presets = PoolRange::PRESETS;
        let next = presets
            .iter()
            .position(|r| *r == self.range)
            .map(|i| presets[(i + 1) % presets.len()])
            .unwrap_or(presets[0]);
        self.apply_range(next)
    }

    /// Reloads the curated corpus at the next difficulty level.
    pub fn cycle_level(&mut self) -> Result<()> {
        let Some(level) = self.level else {
            self.notice = Some(Notice::Warning(
                "Difficulty levels apply to the bundled corpus only.".into(),
            ));
            return Ok(());
        };
        let next = Level::ALL[(Level::ALL.iter().position(|l| *l == level).unwrap_or(0) + 1)
            % Level::ALL.len()];
        let source = LevelSource::new(self.corpus.clone(), next)
            .with_sample_size(self.config.sample_size)
            .with_seed(self.seed);
        match source.load() {
            Ok(list) => {
                self.list = list;
                self.level = Some(next);
                self.config.level = next.number();
                self.apply_range(PoolRange::default())
            }
            // Keep the previous pool active.
            Err(e) => self.report(e.into()),
        }
    }

    pub fn toggle_competition(&mut self) {
        self.config.competition = !self.config.competition;
        self.session.set_competition(self.config.competition_config());
        self.notice = Some(Notice::Info(if self.config.competition {
            format!(
                "Competition mode on: {} seconds per word after playback.",
                self.config.seconds_per_word
            )
        } else {
            "Competition mode off.".to_string()
        }));
    }

    pub fn adjust_seconds(&mut self, delta: i32) {
        let seconds = (self.config.seconds_per_word as i32 + delta).max(0) as u32;
        self.config.seconds_per_word = seconds.clamp(
            CompetitionConfig::MIN_SECONDS,
            CompetitionConfig::MAX_SECONDS,
        );
        self.session.set_competition(self.config.competition_config());
    }

    pub fn adjust_rate(&mut self, delta: i32) {
        let rate = (self.config.speech_rate as i32 + delta).max(0) as u32;
        self.config.speech_rate = clamp_rate(rate);
    }

    pub fn reset(&mut self) {
        self.session.reset_progress();
        self.input_buffer.clear();
        self.word_info = None;
        self.review_cursor = None;
        self.notice = Some(Notice::Info("Progress reset.".into()));
    }

    pub fn clear_review(&mut self) {
        self.session.clear_review_list();
        self.review_cursor = None;
        self.notice = Some(Notice::Info("Revision list cleared.".into()));
    }

    pub fn toggle_screen(&mut self) {
        self.screen = match self.screen {
            Screen::Quiz => Screen::SpellCheck,
            Screen::SpellCheck => Screen::Pronounce,
            Screen::Pronounce => Screen::Quiz,
        };
        self.input_buffer.clear();
    }

    fn check_spelling(&mut self) {
        let input = std::mem::take(&mut self.input_buffer);
        if input.trim().is_empty() {
            return;
        }
        let result = check_spelling(
            &input,
            self.corpus.iter().map(String::as_str),
            self.config.suggestion_cutoff,
        );
        info!(input = %input, result = ?result, "Spell check");
        let correct = match &result {
            SpellCheck::Correct => Some(input.trim().to_lowercase()),
            SpellCheck::Suggestion { word, .. } => Some(word.clone()),
            SpellCheck::NoMatch => None,
        };
        self.spell_result = Some((input, result));
        if let Some(word) = correct {
            self.lookup(word, LookupPurpose::Pronunciation);
        }
    }

    /// Speaks the word that was last checked, as typed.
    pub fn speak_checked_word(&mut self) {
        let text = match &self.spell_result {
            Some((input, _)) => input.clone(),
            None => self.input_buffer.clone(),
        };
        self.speak_text(&text);
    }

    /// Speaks the correct spelling or the suggestion for the last check.
    pub fn speak_correct_word(&mut self) {
        let word = match &self.spell_result {
            Some((input, SpellCheck::Correct)) => input.trim().to_lowercase(),
            Some((_, SpellCheck::Suggestion { word, .. })) => word.clone(),
            Some((_, SpellCheck::NoMatch)) => {
                self.notice = Some(Notice::Warning("No close match to speak.".into()));
                return;
            }
            None => {
                self.notice = Some(Notice::Warning("Check a word first.".into()));
                return;
            }
        };
        self.speak_text(&word);
    }

    /// Speaks the typed word and looks up its pronunciation.
    fn pronounce(&mut self) {
        let word = std::mem::take(&mut self.input_buffer).trim().to_string();
        if word.is_empty() {
            self.notice = Some(Notice::Warning("Type a word first.".into()));
            return;
        }
        self.pronounce_word = Some(word.clone());
        self.lookup(word.clone(), LookupPurpose::Pronunciation);
        self.speak_text(&word);
    }

    pub fn speak_pronounce_word(&mut self) {
        match self.pronounce_word.clone() {
            Some(word) => self.speak_text(&word),
            None => self.pronounce(),
        }
    }

    pub fn render(&self, f: &mut Frame) {
        match self.screen {
            Screen::Quiz => self.render_quiz(f),
            Screen::SpellCheck => self.render_spell_check(f),
            Screen::Pronounce => self.render_pronounce(f),
        }
    }

    fn render_quiz(&self, f: &mut Frame) {
        let main_chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3), // Source and settings
                Constraint::Length(3), // Word status
                Constraint::Length(3), // Timer
                Constraint::Length(3), // Input
                Constraint::Length(4), // Feedback
                Constraint::Min(8),    // Stats, review list, hints
                Constraint::Length(3), // Help
            ])
            .split(f.area());

        self.render_header(f, main_chunks[0]);
        self.render_word(f, main_chunks[1]);
        self.render_timer(f, main_chunks[2]);
        self.render_input(f, main_chunks[3], "Your Answer");
        self.render_notice(f, main_chunks[4]);
        self.render_body(f, main_chunks[5]);
        self.render_help(
            f,
            main_chunks[6],
            "Esc quit | Enter submit/next | F1 play | F2 skip | F3 hint | F4 range | F5 competition | F6 reset | F7 clear review | F8 level | F9 select review | F10 hear review | Up/Down rate | PgUp/PgDn seconds | Tab spell check",
        );
    }

    fn render_header(&self, f: &mut Frame, area: Rect) {
        let competition = if self.config.competition {
            format!("ON ({}s)", self.config.seconds_per_word)
        } else {
            "off".to_string()
        };
        let text = Line::from(vec![
            Span::styled(&self.list.label, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(format!(
                " | range {} ({} of {} words) | rate {}% | competition {}",
                self.range,
                self.session.pool().len(),
                self.list.words.len(),
                self.config.speech_rate,
                competition
            )),
        ]);
        f.render_widget(
            Paragraph::new(text).block(Block::default().title("SpellBowl").borders(Borders::ALL)),
            area,
        );
    }

    fn render_word(&self, f: &mut Frame, area: Rect) {
        let text = match self.session.phase() {
            Phase::Idle => "Press Enter to get a random word".to_string(),
            Phase::AwaitingAnswer => {
                let letters = self.session.current_word().map(|w| w.chars().count()).unwrap_or(0);
                if self.playback_pending.is_some()
                    && self.playback_pending.as_deref() == self.session.current_word()
                {
                    format!("Playing... ({} letters)", letters)
                } else {
                    format!("Listen and spell the word ({} letters). F1 to hear it again", letters)
                }
            }
            Phase::Resolved => "Press Enter for the next word, F1 to hear it again".to_string(),
            Phase::Complete => "All words done! Press Enter to start over".to_string(),
        };
        let paragraph = Paragraph::new(Line::from(vec![Span::styled(
            text,
            Style::default().fg(Color::Cyan),
        )]))
        .block(Block::default().title("Current Word").borders(Borders::ALL))
        .alignment(Alignment::Center)
        .style(Style::default().add_modifier(Modifier::BOLD));
        f.render_widget(paragraph, area);
    }

    fn render_timer(&self, f: &mut Frame, area: Rect) {
        let block = Block::default().title("Timer").borders(Borders::ALL);
        let competition = self.session.competition();
        if !competition.config.enabled {
            f.render_widget(Paragraph::new("Competition mode off").block(block), area);
            return;
        }
        if competition.expired {
            f.render_widget(
                Paragraph::new(Span::styled("Time's up!", Style::default().fg(Color::Red)))
                    .block(block),
                area,
            );
            return;
        }
        match competition.remaining_secs(self.providers.clock.now()) {
            Some(remaining) if !self.session.is_submitted() => {
                let ratio = (remaining / competition.config.seconds_per_word as f64).clamp(0.0, 1.0);
                let color = if ratio > 0.5 {
                    Color::Green
                } else if ratio > 0.25 {
                    Color::LightRed
                } else {
                    Color::Red
                };
                let gauge = Gauge::default()
                    .block(block)
                    .gauge_style(Style::default().fg(color))
                    .ratio(ratio)
                    .label(format!("{:.0}s", remaining.ceil()));
                f.render_widget(gauge, area);
            }
            _ => {
                let text = if self.session.phase() == Phase::AwaitingAnswer {
                    "Timer starts after the word is played"
                } else {
                    "Waiting for the next word"
                };
                f.render_widget(Paragraph::new(text).block(block), area);
            }
        }
    }

    fn render_input(&self, f: &mut Frame, area: Rect, title: &str) {
        let block = Block::default().title(title.to_string()).borders(Borders::ALL);
        let input = Paragraph::new(Line::from(vec![Span::raw(&self.input_buffer)]))
            .block(block)
            .alignment(Alignment::Center);
        f.render_widget(input, area);
    }

    fn render_notice(&self, f: &mut Frame, area: Rect) {
        let line = match &self.notice {
            Some(notice) => Line::from(Span::styled(
                notice.text(),
                Style::default().fg(notice.color()),
            )),
            None => Line::from(""),
        };
        f.render_widget(
            Paragraph::new(line)
                .block(Block::default().title("Feedback").borders(Borders::ALL))
                .wrap(Wrap { trim: true }),
            area,
        );
    }

    fn render_body(&self, f: &mut Frame, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(33),
                Constraint::Percentage(34),
                Constraint::Percentage(33),
            ])
            .split(area);

        f.render_widget(
            Paragraph::new(self.stats_lines())
                .block(Block::default().title("Progress").borders(Borders::ALL)),
            chunks[0],
        );
        f.render_widget(
            Paragraph::new(self.review_lines())
                .block(
                    Block::default()
                        .title(format!("Revision List ({})", self.session.review_list().len()))
                        .borders(Borders::ALL),
                )
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
        f.render_widget(
            Paragraph::new(self.word_info_lines())
                .block(Block::default().title("Hint").borders(Borders::ALL))
                .wrap(Wrap { trim: true }),
            chunks[2],
        );
    }

    fn stats_lines(&self) -> Vec<Line<'_>> {
        let snap = self.session.snapshot(self.providers.clock.now());
        let mut text = vec![
            Line::from(format!("Score: {}/{}", snap.score, snap.total)),
            Line::from(format!("Accuracy: {:.1}%", snap.accuracy)),
            Line::from(format!("Remaining: {} of {}", snap.remaining, snap.pool_size)),
            Line::from(format!(
                "Streak: {} (best {})",
                snap.current_streak, snap.best_streak
            )),
            Line::from(""),
        ];

        let graded = self.session.graded_words();
        for (word, correct) in graded.iter().rev().take(10) {
            let (mark, color) = if *correct {
                ("✓", Color::Green)
            } else {
                ("✗", Color::Red)
            };
            text.push(Line::from(vec![
                Span::styled(mark, Style::default().fg(color)),
                Span::raw(format!(" {}", word)),
            ]));
        }
        text
    }

    fn review_lines(&self) -> Vec<Line<'_>> {
        self.session
            .review_list()
            .iter()
            .enumerate()
            .rev()
            .take(15)
            .map(|(idx, entry)| {
                let color = match entry.cause {
                    MissCause::Timeout => Color::Red,
                    MissCause::CaseOnly => Color::Blue,
                    MissCause::Spelling => Color::Yellow,
                };
                let submitted = if entry.submitted.is_empty() {
                    "(no answer)".to_string()
                } else {
                    entry.submitted.clone()
                };
                let marker = if self.review_cursor == Some(idx) { "▶ " } else { "" };
                Line::from(vec![
                    Span::raw(marker),
                    Span::styled(format!("#{} {} ", idx + 1, entry.cause), Style::default().fg(color)),
                    Span::raw(format!(
                        "{} → {} ({:.1}%)",
                        submitted,
                        entry.expected,
                        entry.similarity * 100.0
                    )),
                ])
            })
            .collect()
    }

    fn word_info_lines(&self) -> Vec<Line<'_>> {
        let Some(info) = &self.word_info else {
            let solved = self
                .session
                .last_resolution()
                .filter(|r| r.correct && self.session.phase() == Phase::Resolved);
            if let Some(phones) = solved.and_then(|r| self.known_pronunciation(&r.word)) {
                return vec![Line::from(format!("Pronunciation (ARPAbet): {}", phones))];
            }
            return vec![Line::from("F3 shows definitions for the current word")];
        };
        let mut text = Vec::new();
        if let Some(phones) = &info.pronunciation {
            text.push(Line::from(format!("Pronunciation (ARPAbet): {}", phones)));
        }
        for (pos, definitions) in &info.definitions {
            text.push(Line::from(Span::styled(
                pos.as_str(),
                Style::default().add_modifier(Modifier::BOLD),
            )));
            for (i, definition) in definitions.iter().take(2).enumerate() {
                text.push(Line::from(format!("{}. {}", i + 1, definition)));
            }
        }
        if !info.synonyms.is_empty() {
            let synonyms: Vec<&str> = info.synonyms.iter().take(5).map(String::as_str).collect();
            text.push(Line::from(format!("Synonyms: {}", synonyms.join(", "))));
        }
        if !info.antonyms.is_empty() {
            let antonyms: Vec<&str> = info.antonyms.iter().take(5).map(String::as_str).collect();
            text.push(Line::from(format!("Antonyms: {}", antonyms.join(", "))));
        }
        text
    }

    fn render_spell_check(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(4),
                Constraint::Length(4),
                Constraint::Length(3),
            ])
            .split(f.area());

        self.render_input(f, chunks[0], "Enter a word to check spelling");

        let lines = match &self.spell_result {
            None => vec![Line::from("Type a word and press Enter")],
            Some((input, SpellCheck::Correct)) => vec![
                Line::from(Span::styled(
                    format!("\"{}\": spelling is correct!", input),
                    Style::default().fg(Color::Green),
                )),
                self.pronunciation_line(&input.trim().to_lowercase()),
            ],
            Some((input, SpellCheck::Suggestion { word, similarity })) => vec![
                Line::from(Span::styled(
                    format!("\"{}\" is misspelled. Did you mean: {}?", input, word),
                    Style::default().fg(Color::Red),
                )),
                Line::from(format!("Similarity: {:.1}%", similarity * 100.0)),
                self.pronunciation_line(word),
            ],
            Some((input, SpellCheck::NoMatch)) => vec![Line::from(Span::styled(
                format!("\"{}\" is misspelled and no close match was found.", input),
                Style::default().fg(Color::Red),
            ))],
        };
        f.render_widget(
            Paragraph::new(lines)
                .block(Block::default().title("Spelling Checker").borders(Borders::ALL))
                .wrap(Wrap { trim: true }),
            chunks[1],
        );
        self.render_notice(f, chunks[2]);
        self.render_help(
            f,
            chunks[3],
            "Esc quit | Enter check | F1 speak typed word | F2 speak correct word | Tab pronunciation",
        );
    }

    fn pronunciation_line(&self, word: &str) -> Line<'_> {
        if self.providers.lexicon.is_none() {
            return Line::from("");
        }
        match self.pronunciations.get(&word.to_lowercase()) {
            Some(Some(phones)) => Line::from(Span::styled(
                format!("Pronunciation (ARPAbet): {}", phones),
                Style::default().fg(Color::Magenta),
            )),
            Some(None) => Line::from(format!("Pronunciation not found for \"{}\".", word)),
            None => Line::from("Looking up pronunciation..."),
        }
    }

    fn render_pronounce(&self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(4),
                Constraint::Min(3),
                Constraint::Length(3),
            ])
            .split(f.area());

        self.render_input(f, chunks[0], "Enter a word to pronounce");
        self.render_notice(f, chunks[1]);
        let lines = match &self.pronounce_word {
            None => vec![Line::from("Type any word and press Enter to hear it")],
            Some(word) => vec![
                Line::from(Span::styled(
                    word.as_str(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                self.pronunciation_line(word),
            ],
        };
        f.render_widget(
            Paragraph::new(lines)
                .block(Block::default().title("Word Pronunciation").borders(Borders::ALL))
                .wrap(Wrap { trim: true }),
            chunks[2],
        );
        self.render_help(
            f,
            chunks[3],
            "Esc quit | Enter speak | F1 speak again | Up/Down rate | Tab back to quiz",
        );
    }

    fn render_help(&self, f: &mut Frame, area: Rect, help: &str) {
        let help = Paragraph::new(Line::from(vec![Span::raw(help.to_string())]))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(help, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::types::Grading;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;
    use std::time::Instant;

    struct NoSpeech;

    impl SpeechProvider for NoSpeech {
        fn synthesize(&self, _word: &str, _rate: u32) -> std::result::Result<Vec<u8>, ProviderError> {
            Err(ProviderError::EmptyOutput)
        }
    }

    /// Records every word it is asked to speak after a fixed pause.
    struct RecordingSpeech {
        pause: std::time::Duration,
        spoken: Mutex<Vec<String>>,
    }

    impl RecordingSpeech {
        fn new(pause_ms: u64) -> Arc<Self> {
            Arc::new(Self {
                pause: std::time::Duration::from_millis(pause_ms),
                spoken: Mutex::new(Vec::new()),
            })
        }

        fn spoken(&self) -> Vec<String> {
            self.spoken.lock().unwrap().clone()
        }
    }

    impl SpeechProvider for RecordingSpeech {
        fn synthesize(&self, word: &str, _rate: u32) -> std::result::Result<Vec<u8>, ProviderError> {
            std::thread::sleep(self.pause);
            self.spoken.lock().unwrap().push(word.to_string());
            Ok(vec![0])
        }
    }

    struct StubLexicon {
        pause: std::time::Duration,
    }

    impl LexicalInfoProvider for StubLexicon {
        fn lookup(&self, word: &str) -> std::result::Result<LexicalInfo, ProviderError> {
            std::thread::sleep(self.pause);
            let phones = match word.to_lowercase().as_str() {
                "apple" => "AE1 P AH0 L",
                "grape" => "G R EY1 P",
                "receive" => "R IH0 S IY1 V",
                _ => return Ok(LexicalInfo::default()),
            };
            let mut info = LexicalInfo {
                pronunciation: Some(phones.to_string()),
                ..LexicalInfo::default()
            };
            info.definitions
                .insert("noun".into(), vec![format!("a kind of {}", word)]);
            Ok(info)
        }
    }

    fn lexicon(pause_ms: u64) -> Option<Arc<dyn LexicalInfoProvider>> {
        Some(Arc::new(StubLexicon {
            pause: std::time::Duration::from_millis(pause_ms),
        }))
    }

    fn app_with(
        mut config: Config,
        clock: Arc<ManualClock>,
        speech: Arc<dyn SpeechProvider>,
        lexicon: Option<Arc<dyn LexicalInfoProvider>>,
        corpus: Vec<String>,
    ) -> App {
        config.playback_retry_ms = 0;
        let list = WordList {
            words: vec!["apple".into(), "grape".into()],
            grading: Grading::CaseSensitive,
            label: "test".into(),
        };
        let providers = Providers {
            speech,
            player: None,
            lexicon,
            clock,
        };
        App::new(list, None, config, corpus, providers, Some(1)).unwrap()
    }

    fn app(config: Config, clock: Arc<ManualClock>) -> App {
        app_with(config, clock, Arc::new(NoSpeech), None, Vec::new())
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_input(c);
        }
    }

    fn lines_text(lines: &[Line<'_>]) -> String {
        lines
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    async fn settle(app: &mut App) {
        for _ in 0..300 {
            app.poll_workers().unwrap();
            if app.jobs_in_flight() == 0 {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        panic!("background jobs did not finish");
    }

    #[tokio::test]
    async fn playback_result_starts_timer_and_tick_expires() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let config = Config {
            competition: true,
            seconds_per_word: 5,
            ..Config::default()
        };
        let mut app = app(config, Arc::clone(&clock));
        app.handle_enter().unwrap();
        let word = app.session.current_word().unwrap().to_string();
        app.apply_response(WorkerResponse::Playback {
            word,
            result: Ok(()),
        })
        .unwrap();
        assert!(app.session.timer_should_poll());

        clock.advance(Duration::seconds(6));
        app.tick();
        assert_eq!(app.session.phase(), Phase::Resolved);
        assert_eq!(app.session.review_list()[0].cause, MissCause::Timeout);
    }

    #[tokio::test]
    async fn failed_playback_keeps_word_awaiting() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut app = app(Config::default(), clock);
        app.handle_enter().unwrap();
        let word = app.session.current_word().unwrap().to_string();
        app.apply_response(WorkerResponse::Playback {
            word,
            result: Err(ProviderError::Timeout),
        })
        .unwrap();
        assert_eq!(app.session.phase(), Phase::AwaitingAnswer);
        assert!(matches!(app.notice, Some(Notice::Warning(_))));
    }

    #[tokio::test]
    async fn skip_then_draw_during_playback_speaks_new_word() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let speech = RecordingSpeech::new(100);
        let config = Config {
            competition: true,
            ..Config::default()
        };
        let mut app = app_with(config, clock, speech.clone(), None, Vec::new());

        app.handle_enter().unwrap();
        let first = app.session.current_word().unwrap().to_string();
        app.skip().unwrap();
        app.handle_enter().unwrap();
        let second = app.session.current_word().unwrap().to_string();
        assert_ne!(first, second);
        assert_eq!(app.playback_pending.as_deref(), Some(second.as_str()));

        settle(&mut app).await;
        let spoken = speech.spoken();
        assert!(spoken.contains(&first));
        assert!(spoken.contains(&second));
        assert_eq!(app.playback_pending, None);
        assert!(app.session.competition().started_at.is_some());
        assert!(app.session.timer_should_poll());
    }

    #[tokio::test]
    async fn repeated_play_for_same_word_runs_once() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let speech = RecordingSpeech::new(50);
        let mut app = app_with(Config::default(), clock, speech.clone(), None, Vec::new());

        app.handle_enter().unwrap();
        app.request_playback();
        app.request_playback();
        settle(&mut app).await;
        assert_eq!(speech.spoken().len(), 1);

        app.request_playback();
        settle(&mut app).await;
        assert_eq!(speech.spoken().len(), 2);
    }

    #[tokio::test]
    async fn hint_lookup_does_not_block_the_caller() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut app = app_with(
            Config::default(),
            clock,
            Arc::new(NoSpeech),
            lexicon(300),
            Vec::new(),
        );
        app.handle_enter().unwrap();

        let started = Instant::now();
        app.show_word_info();
        assert!(started.elapsed() < std::time::Duration::from_millis(200));
        assert!(app.word_info.is_none());

        settle(&mut app).await;
        let info = app.word_info.as_ref().unwrap();
        assert!(info.pronunciation.is_some());
        assert!(lines_text(&app.word_info_lines()).contains("Pronunciation (ARPAbet): "));
    }

    #[tokio::test]
    async fn correct_answer_shows_pronunciation() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut app = app_with(
            Config::default(),
            clock,
            Arc::new(NoSpeech),
            lexicon(0),
            Vec::new(),
        );
        app.handle_enter().unwrap();
        let word = app.session.current_word().unwrap().to_string();
        type_text(&mut app, &word);
        app.handle_enter().unwrap();
        settle(&mut app).await;

        let expected = if word == "apple" { "AE1 P AH0 L" } else { "G R EY1 P" };
        assert_eq!(
            lines_text(&app.word_info_lines()),
            format!("Pronunciation (ARPAbet): {}", expected)
        );
    }

    #[tokio::test]
    async fn spell_checker_speaks_typed_and_suggested_words() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let speech = RecordingSpeech::new(0);
        let mut app = app_with(
            Config::default(),
            clock,
            speech.clone(),
            lexicon(0),
            vec!["receive".into(), "believe".into()],
        );
        app.toggle_screen();
        assert_eq!(app.screen, Screen::SpellCheck);
        type_text(&mut app, "recieve");
        app.handle_enter().unwrap();
        app.speak_checked_word();
        settle(&mut app).await;
        app.speak_correct_word();
        settle(&mut app).await;

        assert_eq!(speech.spoken(), vec!["recieve", "receive"]);
        assert_eq!(app.known_pronunciation("receive"), Some("R IH0 S IY1 V"));
        assert_eq!(app.session.total(), 0);
    }

    #[tokio::test]
    async fn pronounce_screen_speaks_any_word() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let speech = RecordingSpeech::new(0);
        let mut app = app_with(Config::default(), clock, speech.clone(), lexicon(0), Vec::new());
        app.toggle_screen();
        app.toggle_screen();
        assert_eq!(app.screen, Screen::Pronounce);

        app.handle_enter().unwrap();
        assert_eq!(app.notice, Some(Notice::Warning("Type a word first.".into())));

        type_text(&mut app, " Grape ");
        app.handle_enter().unwrap();
        settle(&mut app).await;
        app.speak_pronounce_word();
        settle(&mut app).await;

        assert_eq!(app.pronounce_word.as_deref(), Some("Grape"));
        assert_eq!(speech.spoken(), vec!["Grape", "Grape"]);
        assert_eq!(app.known_pronunciation("grape"), Some("G R EY1 P"));
        assert!(app.session.current_word().is_none());
    }

    #[tokio::test]
    async fn review_entries_can_be_replayed() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let speech = RecordingSpeech::new(0);
        let mut app = app_with(Config::default(), clock, speech.clone(), None, Vec::new());

        app.speak_review_entry();
        assert!(matches!(app.notice, Some(Notice::Warning(_))));

        for _ in 0..2 {
            app.handle_enter().unwrap();
            type_text(&mut app, "wrong");
            app.handle_enter().unwrap();
        }
        settle(&mut app).await;
        let before = speech.spoken().len();

        app.select_next_review();
        assert_eq!(app.review_cursor, Some(1));
        app.select_next_review();
        assert_eq!(app.review_cursor, Some(0));
        app.select_next_review();
        assert_eq!(app.review_cursor, Some(1));

        let expected = app.selected_review().unwrap().expected.clone();
        app.speak_review_entry();
        settle(&mut app).await;
        assert_eq!(speech.spoken()[before..], [expected]);
        assert_eq!(app.session.total(), 2);

        app.clear_review();
        assert_eq!(app.review_cursor, None);
        assert!(app.selected_review().is_none());
    }

    #[tokio::test]
    async fn enter_with_blank_answer_warns() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut app = app(Config::default(), clock);
        app.handle_enter().unwrap();
        app.handle_enter().unwrap();
        assert_eq!(app.session.total(), 0);
        assert_eq!(
            app.notice,
            Some(Notice::Warning("Please enter a word before checking.".into()))
        );
    }

    #[tokio::test]
    async fn unrecoverable_errors_reach_the_loop() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut app = app(Config::default(), clock);
        assert!(app.report(QuizError::Terminal("gone".into())).is_err());
        assert!(app.report(QuizError::PoolExhausted).is_ok());
    }

    #[tokio::test]
    async fn cycling_range_resets_progress() {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let mut app = app(Config::default(), clock);
        app.handle_enter().unwrap();
        type_text(&mut app, "wrong");
        app.handle_enter().unwrap();
        assert_eq!(app.session.total(), 1);
        app.cycle_range().unwrap();
        assert_eq!(app.range, PoolRange::First10);
        assert_eq!(app.session.total(), 0);
        assert!(app.session.review_list().is_empty());
    }
}
