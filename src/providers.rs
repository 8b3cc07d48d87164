//! External collaborators: speech synthesis and lexical lookups.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{ProviderError, Result};

pub const MIN_RATE: u32 = 30;
pub const MAX_RATE: u32 = 150;
pub const DEFAULT_RATE: u32 = 100;

pub fn clamp_rate(rate_percent: u32) -> u32 {
    rate_percent.clamp(MIN_RATE, MAX_RATE)
}

pub trait SpeechProvider: Send + Sync {
    /// Audio for `word` spoken at `rate_percent` of normal speed.
    fn synthesize(&self, word: &str, rate_percent: u32) -> std::result::Result<Vec<u8>, ProviderError>;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LexicalInfo {
    /// Definitions keyed by part of speech.
    pub definitions: BTreeMap<String, Vec<String>>,
    pub synonyms: BTreeSet<String>,
    pub antonyms: BTreeSet<String>,
    pub pronunciation: Option<String>,
}

impl LexicalInfo {
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
            && self.synonyms.is_empty()
            && self.antonyms.is_empty()
            && self.pronunciation.is_none()
    }
}

pub trait LexicalInfoProvider: Send + Sync {
    /// Returns an empty `LexicalInfo` for unknown words.
    fn lookup(&self, word: &str) -> std::result::Result<LexicalInfo, ProviderError>;
}

pub trait Delay: Send + Sync {
    fn wait(&self, duration: Duration);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleep;

impl Delay for ThreadSleep {
    fn wait(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Bounded retry with a fixed pause between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn run<T, F, D>(&self, delay: &D, what: &str, mut op: F) -> std::result::Result<T, ProviderError>
    where
        F: FnMut() -> std::result::Result<T, ProviderError>,
        D: Delay + ?Sized,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            match op() {
                Ok(value) => return Ok(value),
                Err(e) if attempt < attempts => {
                    warn!(what, attempt, attempts, error = %e, "Attempt failed, retrying");
                    delay.wait(self.delay);
                    attempt += 1;
                }
                Err(e) => {
                    warn!(what, attempts, error = %e, "Giving up");
                    return Err(e);
                }
            }
        }
    }
}

pub fn synthesize_with_retry<P, D>(
    speech: &P,
    word: &str,
    rate_percent: u32,
    policy: &RetryPolicy,
    delay: &D,
) -> std::result::Result<Vec<u8>, ProviderError>
where
    P: SpeechProvider + ?Sized,
    D: Delay + ?Sized,
{
    let rate = clamp_rate(rate_percent);
    policy.run(delay, "speech", || speech.synthesize(word, rate))
}

fn expand(template: &[String], vars: &[(&str, String)]) -> Vec<String> {
    template
        .iter()
        .map(|arg| {
            vars.iter()
                .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
        })
        .collect()
}

/// Speech through an external synthesizer that writes audio to stdout.
///
/// The argv template understands `{word}`, `{rate}` (percent) and `{wpm}`.
#[derive(Debug, Clone)]
pub struct CommandSpeech {
    argv: Vec<String>,
}

impl CommandSpeech {
    const BASE_WPM: u32 = 175;

    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl SpeechProvider for CommandSpeech {
    fn synthesize(&self, word: &str, rate_percent: u32) -> std::result::Result<Vec<u8>, ProviderError> {
        let rate = clamp_rate(rate_percent);
        let args = expand(
            &self.argv,
            &[
                ("{word}", word.to_string()),
                ("{rate}", rate.to_string()),
                ("{wpm}", (Self::BASE_WPM * rate / 100).to_string()),
            ],
        );
        let (program, rest) = args
            .split_first()
            .ok_or_else(|| ProviderError::Network("speech command is empty".into()))?;

        debug!(program = %program, word, rate, "Running speech command");
        let output = Command::new(program)
            .args(rest)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        if !output.status.success() {
            return Err(ProviderError::Network(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        if output.stdout.is_empty() {
            return Err(ProviderError::EmptyOutput);
        }
        Ok(output.stdout)
    }
}

/// Pipes synthesized audio into an external player.
#[derive(Debug, Clone)]
pub struct CommandPlayer {
    argv: Vec<String>,
}

impl CommandPlayer {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }

    pub fn play(&self, audio: &[u8]) -> std::result::Result<(), ProviderError> {
        let (program, rest) = self
            .argv
            .split_first()
            .ok_or_else(|| ProviderError::Network("player command is empty".into()))?;
        let mut child = Command::new(program)
            .args(rest)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(audio)
                .map_err(|e| ProviderError::Network(e.to_string()))?;
        }
        let status = child
            .wait()
            .map_err(|e| ProviderError::Network(e.to_string()))?;
        if !status.success() {
            return Err(ProviderError::Network(format!("player exited with {}", status)));
        }
        Ok(())
    }
}

/// Lexicon backed by a JSON object mapping words to `LexicalInfo`.
#[derive(Debug, Clone, Default)]
pub struct JsonLexicon {
    entries: HashMap<String, LexicalInfo>,
}

impl JsonLexicon {
    pub fn from_entries(entries: HashMap<String, LexicalInfo>) -> Self {
        let entries = entries
            .into_iter()
            .map(|(word, info)| (word.to_lowercase(), info))
            .collect();
        Self { entries }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let entries: HashMap<String, LexicalInfo> = serde_json::from_reader(file)?;
        info!(path = %path.as_ref().display(), words = entries.len(), "Loaded lexicon");
        Ok(Self::from_entries(entries))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LexicalInfoProvider for JsonLexicon {
    fn lookup(&self, word: &str) -> std::result::Result<LexicalInfo, ProviderError> {
        Ok(self
            .entries
            .get(&word.to_lowercase())
            .cloned()
            .unwrap_or_default())
    }
}
