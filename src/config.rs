use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::providers::{clamp_rate, RetryPolicy, DEFAULT_RATE};
use crate::scoring::SUGGESTION_CUTOFF;
use crate::sources::{LevelSource, SourceChoice};
use crate::types::CompetitionConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub speech_rate: u32,
    pub competition: bool,
    pub seconds_per_word: u32,
    pub level: u8,
    pub speech_command: Vec<String>,
    pub player_command: Option<Vec<String>>,
    pub lexicon: Option<PathBuf>,
    pub corpus: Option<PathBuf>,
    pub sample_size: usize,
    pub suggestion_cutoff: f64,
    pub playback_attempts: u32,
    pub playback_retry_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            speech_rate: DEFAULT_RATE,
            competition: false,
            seconds_per_word: 30,
            level: 1,
            speech_command: vec![
                "espeak-ng".into(),
                "--stdout".into(),
                "-s".into(),
                "{wpm}".into(),
                "{word}".into(),
            ],
            player_command: Some(vec!["aplay".into(), "-q".into()]),
            lexicon: None,
            corpus: None,
            sample_size: LevelSource::DEFAULT_SAMPLE,
            suggestion_cutoff: SUGGESTION_CUTOFF,
            playback_attempts: 3,
            playback_retry_ms: 1000,
        }
    }
}

impl Config {
    /// Reads a JSON config, falling back to defaults when missing or malformed.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => match serde_json::from_slice::<Config>(&bytes) {
                Ok(cfg) => {
                    info!(path = %path.display(), "Loaded config");
                    cfg.normalized()
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Malformed config, using defaults");
                    Config::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Config not readable, using defaults");
                Config::default()
            }
        }
    }

    pub fn normalized(mut self) -> Self {
        self.speech_rate = clamp_rate(self.speech_rate);
        self.seconds_per_word = self.seconds_per_word.clamp(
            CompetitionConfig::MIN_SECONDS,
            CompetitionConfig::MAX_SECONDS,
        );
        self.suggestion_cutoff = self.suggestion_cutoff.clamp(0.0, 1.0);
        self
    }

    pub fn competition_config(&self) -> CompetitionConfig {
        CompetitionConfig::new(self.competition, self.seconds_per_word)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.playback_attempts.max(1),
            delay: std::time::Duration::from_millis(self.playback_retry_ms),
        }
    }
}

/// Spelling and pronunciation trainer for the terminal
#[derive(Parser, Debug, Clone, Default)]
#[clap(version, about)]
pub struct Cli {
    /// path to a JSON config file
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// difficulty level (1-4) for the bundled corpus
    #[clap(short = 'l', long)]
    pub level: Option<u8>,

    /// plain-text document to extract words from
    #[clap(short = 'd', long, conflicts_with_all = ["level", "list"])]
    pub document: Option<PathBuf>,

    /// word list file, one word per line
    #[clap(long, conflicts_with = "level")]
    pub list: Option<PathBuf>,

    /// enable competition mode
    #[clap(long)]
    pub competition: bool,

    /// seconds allowed per word in competition mode
    #[clap(short = 's', long)]
    pub seconds: Option<u32>,

    /// speech rate in percent (30-150)
    #[clap(short = 'r', long)]
    pub rate: Option<u32>,

    /// seed for reproducible word order
    #[clap(long)]
    pub seed: Option<u64>,
}

impl Cli {
    /// Applies command line overrides on top of `config`.
    pub fn apply(&self, mut config: Config) -> Config {
        if let Some(level) = self.level {
            config.level = level;
        }
        if self.competition {
            config.competition = true;
        }
        if let Some(seconds) = self.seconds {
            config.seconds_per_word = seconds;
        }
        if let Some(rate) = self.rate {
            config.speech_rate = rate;
        }
        config.normalized()
    }

    pub fn source(&self, config: &Config) -> SourceChoice {
        if let Some(path) = &self.document {
            SourceChoice::Document(path.clone())
        } else if let Some(path) = &self.list {
            SourceChoice::List(path.clone())
        } else {
            SourceChoice::Level(config.level)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        assert_eq!(Config::load(dir.path().join("nope.json")), Config::default());
    }

    #[test]
    fn partial_file_fills_defaults_and_clamps() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"speech_rate": 400, "competition": true, "seconds_per_word": 2}"#)
            .unwrap();
        let cfg = Config::load(&path);
        assert_eq!(cfg.speech_rate, 150);
        assert!(cfg.competition);
        assert_eq!(cfg.seconds_per_word, 5);
        assert_eq!(cfg.level, 1);
    }

    #[test]
    fn malformed_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert_eq!(Config::load(&path), Config::default());
    }

    #[test]
    fn cli_overrides_config() {
        let cli = Cli::parse_from(["spellbowl", "--competition", "-s", "10", "-r", "80", "-l", "3"]);
        let cfg = cli.apply(Config::default());
        assert!(cfg.competition);
        assert_eq!(cfg.seconds_per_word, 10);
        assert_eq!(cfg.speech_rate, 80);
        assert_eq!(cli.source(&cfg), SourceChoice::Level(3));
    }

    #[test]
    fn document_flag_selects_document_source() {
        let cli = Cli::parse_from(["spellbowl", "--document", "notes.txt"]);
        assert_eq!(
            cli.source(&Config::default()),
            SourceChoice::Document(PathBuf::from("notes.txt"))
        );
    }
}
