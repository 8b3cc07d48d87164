use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use spell_bowl::app::{App, Providers, Screen};
use spell_bowl::clock::SystemClock;
use spell_bowl::config::{Cli, Config};
use spell_bowl::error::{QuizError, Result};
use spell_bowl::providers::{CommandPlayer, CommandSpeech, JsonLexicon, LexicalInfoProvider};
use spell_bowl::sources::{Level, LevelSource, SourceChoice, WordSource};
use spell_bowl::words::builtin_corpus;

use tracing::{debug, error, info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt::format::FmtSpan, EnvFilter};

const TIMER_POLL: Duration = Duration::from_secs(1);

fn setup_logging() -> Result<()> {
    let file_appender = RollingFileAppender::new(Rotation::DAILY, "logs", "spellbowl.log");

    // RUST_LOG wins; otherwise debug builds log debug and release builds info
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cfg!(debug_assertions) {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(file_appender)
        .with_ansi(false)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .try_init()
        .map_err(|e| QuizError::Terminal(e.to_string()))?;

    info!("Logging system initialized");
    debug!("Debug logging {}", if cfg!(debug_assertions) { "enabled" } else { "disabled" });

    Ok(())
}

fn load_corpus(config: &Config) -> Vec<String> {
    match &config.corpus {
        Some(path) => match LevelSource::corpus_from_path(path) {
            Ok(words) if !words.is_empty() => {
                info!(path = %path.display(), words = words.len(), "Loaded corpus");
                words
            }
            Ok(_) => {
                warn!(path = %path.display(), "Corpus file is empty, using bundled words");
                builtin_corpus()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read corpus, using bundled words");
                builtin_corpus()
            }
        },
        None => builtin_corpus(),
    }
}

fn load_lexicon(config: &Config) -> Option<Arc<dyn LexicalInfoProvider>> {
    let path = config.lexicon.as_ref()?;
    match JsonLexicon::from_path(path) {
        Ok(lexicon) => Some(Arc::new(lexicon)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to load lexicon");
            None
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;
    info!("Starting spellbowl");

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load(path),
        None => Config::default(),
    };
    let config = cli.apply(config);
    let corpus = load_corpus(&config);

    let choice = cli.source(&config);
    let list = choice
        .open(corpus.clone(), config.sample_size, cli.seed)?
        .load()?;
    let level = match choice {
        SourceChoice::Level(n) => Some(Level::from_number(n)),
        _ => None,
    };

    let providers = Providers {
        speech: Arc::new(CommandSpeech::new(config.speech_command.clone())),
        player: config
            .player_command
            .clone()
            .map(|argv| Arc::new(CommandPlayer::new(argv))),
        lexicon: load_lexicon(&config),
        clock: Arc::new(SystemClock),
    };
    let mut app = App::new(list, level, config, corpus, providers, cli.seed)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let tick_rate = Duration::from_millis(250);
    let res = run_app(&mut terminal, &mut app, tick_rate);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!("Application error: {}", err);
        println!("Error: {}", err);
    }

    info!(
        score = app.session.score(),
        total = app.session.total(),
        "Application terminated"
    );
    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    tick_rate: Duration,
) -> Result<()> {
    let mut last_poll = Instant::now();

    loop {
        app.poll_workers()?;
        terminal.draw(|f| app.render(f))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match (app.screen, key.code) {
                    (_, KeyCode::Esc) => app.should_quit = true,
                    (_, KeyCode::Char(c)) => app.handle_input(c),
                    (_, KeyCode::Backspace) => app.handle_backspace(),
                    (_, KeyCode::Enter) => app.handle_enter()?,
                    (_, KeyCode::Tab) => app.toggle_screen(),
                    (_, KeyCode::Up) => app.adjust_rate(10),
                    (_, KeyCode::Down) => app.adjust_rate(-10),
                    (Screen::Quiz, KeyCode::F(1)) => app.request_playback(),
                    (Screen::Quiz, KeyCode::F(2)) => app.skip()?,
                    (Screen::Quiz, KeyCode::F(3)) => app.show_word_info(),
                    (Screen::Quiz, KeyCode::F(4)) => app.cycle_range()?,
                    (Screen::Quiz, KeyCode::F(5)) => app.toggle_competition(),
                    (Screen::Quiz, KeyCode::F(6)) => app.reset(),
                    (Screen::Quiz, KeyCode::F(7)) => app.clear_review(),
                    (Screen::Quiz, KeyCode::F(8)) => app.cycle_level()?,
                    (Screen::Quiz, KeyCode::F(9)) => app.select_next_review(),
                    (Screen::Quiz, KeyCode::F(10)) => app.speak_review_entry(),
                    (Screen::Quiz, KeyCode::PageUp) => app.adjust_seconds(5),
                    (Screen::Quiz, KeyCode::PageDown) => app.adjust_seconds(-5),
                    (Screen::SpellCheck, KeyCode::F(1)) => app.speak_checked_word(),
                    (Screen::SpellCheck, KeyCode::F(2)) => app.speak_correct_word(),
                    (Screen::Pronounce, KeyCode::F(1)) => app.speak_pronounce_word(),
                    _ => {}
                }
            }
        }

        // Poll the competition timer only while a word is waiting on it
        if app.session.timer_should_poll() {
            if last_poll.elapsed() >= TIMER_POLL {
                last_poll = Instant::now();
                app.tick();
            }
        } else {
            last_poll = Instant::now();
        }

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
