use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::info;

use crate::error::SourceError;
use crate::types::{Grading, WordList};

/// Something that can produce a word list for a session.
pub trait WordSource {
    fn load(&self) -> Result<WordList, SourceError>;
}

/// Difficulty tiers for the curated corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Grade1To3,
    Grade4To6,
    Grade7To10,
    Grade10To12,
}

impl Level {
    pub const ALL: [Level; 4] = [
        Level::Grade1To3,
        Level::Grade4To6,
        Level::Grade7To10,
        Level::Grade10To12,
    ];

    /// Levels are numbered 1 to 4; anything above 4 is the hardest tier.
    pub fn from_number(n: u8) -> Level {
        match n {
            0 | 1 => Level::Grade1To3,
            2 => Level::Grade4To6,
            3 => Level::Grade7To10,
            _ => Level::Grade10To12,
        }
    }

    pub fn number(self) -> u8 {
        match self {
            Level::Grade1To3 => 1,
            Level::Grade4To6 => 2,
            Level::Grade7To10 => 3,
            Level::Grade10To12 => 4,
        }
    }

    pub fn admits(self, word: &str) -> bool {
        let len = word.chars().count();
        let fits = match self {
            Level::Grade1To3 => (3..=5).contains(&len),
            Level::Grade4To6 => (5..=7).contains(&len),
            Level::Grade7To10 => (7..=10).contains(&len),
            Level::Grade10To12 => len >= 10,
        };
        fits && word.chars().all(|c| c.is_alphabetic() && c.is_lowercase())
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Grade1To3 => write!(f, "Level 1 (Grade 1-3)"),
            Level::Grade4To6 => write!(f, "Level 2 (Grade 4-6)"),
            Level::Grade7To10 => write!(f, "Level 3 (Grade 7-10)"),
            Level::Grade10To12 => write!(f, "Level 4 (Grade 10-12)"),
        }
    }
}

/// Curated corpus filtered by level and randomly sampled.
#[derive(Debug, Clone)]
pub struct LevelSource {
    corpus: Vec<String>,
    level: Level,
    sample_size: usize,
    seed: Option<u64>,
}

impl LevelSource {
    pub const DEFAULT_SAMPLE: usize = 500;

    pub fn new(corpus: Vec<String>, level: Level) -> Self {
        Self {
            corpus,
            level,
            sample_size: Self::DEFAULT_SAMPLE,
            seed: None,
        }
    }

    pub fn with_sample_size(mut self, sample_size: usize) -> Self {
        self.sample_size = sample_size;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Reads a newline separated corpus file.
    pub fn corpus_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<String>, SourceError> {
        let text = fs::read_to_string(path)?;
        Ok(text
            .lines()
            .map(|l| l.trim().to_lowercase())
            .filter(|l| !l.is_empty())
            .collect())
    }
}

impl WordSource for LevelSource {
    fn load(&self) -> Result<WordList, SourceError> {
        if self.corpus.is_empty() {
            return Err(SourceError::NoInput);
        }
        let mut words: Vec<String> = Vec::new();
        for word in self.corpus.iter().filter(|w| self.level.admits(w)) {
            if !words.contains(word) {
                words.push(word.clone());
            }
        }
        if words.is_empty() {
            return Err(SourceError::EmptyResult);
        }

        if words.len() > self.sample_size {
            let mut rng = match self.seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            words = words
                .choose_multiple(&mut rng, self.sample_size)
                .cloned()
                .collect();
        }

        info!(level = %self.level, words = words.len(), "Loaded curated words");
        Ok(WordList {
            words,
            grading: Grading::CaseInsensitive,
            label: self.level.to_string(),
        })
    }
}

fn word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b[a-zA-Z]{4,}\b").expect("word pattern is valid"))
}

/// Words of four or more ASCII letters, deduplicated ignoring case.
///
/// The result is sorted by lowercase form; the spelling kept is the last one seen.
pub fn extract_words(text: &str) -> Vec<String> {
    let mut unique: BTreeMap<String, String> = BTreeMap::new();
    for m in word_pattern().find_iter(text) {
        let word = m.as_str();
        unique.insert(word.to_lowercase(), word.to_string());
    }
    unique.into_values().collect()
}

/// Words extracted from the text of a document.
#[derive(Debug, Clone)]
pub struct DocumentSource {
    text: String,
    label: String,
}

impl DocumentSource {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        Ok(Self::new(fs::read_to_string(path)?, file_label(path)))
    }
}

impl WordSource for DocumentSource {
    fn load(&self) -> Result<WordList, SourceError> {
        if self.text.trim().is_empty() {
            return Err(SourceError::NoInput);
        }
        let words = extract_words(&self.text);
        if words.is_empty() {
            return Err(SourceError::EmptyResult);
        }
        info!(document = %self.label, words = words.len(), "Extracted document words");
        Ok(WordList {
            words,
            grading: Grading::CaseSensitive,
            label: self.label.clone(),
        })
    }
}

/// A word list supplied directly, one word per line.
#[derive(Debug, Clone)]
pub struct ListSource {
    text: String,
    label: String,
}

impl ListSource {
    pub fn new(text: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            label: label.into(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SourceError> {
        let path = path.as_ref();
        Ok(Self::new(fs::read_to_string(path)?, file_label(path)))
    }
}

impl WordSource for ListSource {
    fn load(&self) -> Result<WordList, SourceError> {
        if self.text.trim().is_empty() {
            return Err(SourceError::NoInput);
        }
        let mut words: Vec<String> = Vec::new();
        for line in self.text.lines().map(str::trim) {
            if line.is_empty() || !line.chars().all(char::is_alphabetic) {
                continue;
            }
            if !words.iter().any(|w| w.to_lowercase() == line.to_lowercase()) {
                words.push(line.to_string());
            }
        }
        if words.is_empty() {
            return Err(SourceError::EmptyResult);
        }
        info!(list = %self.label, words = words.len(), "Loaded word list");
        Ok(WordList {
            words,
            grading: Grading::CaseSensitive,
            label: self.label.clone(),
        })
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Which source the learner picked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceChoice {
    Level(u8),
    Document(PathBuf),
    List(PathBuf),
}

impl SourceChoice {
    pub fn open(
        &self,
        corpus: Vec<String>,
        sample_size: usize,
        seed: Option<u64>,
    ) -> Result<Box<dyn WordSource>, SourceError> {
        Ok(match self {
            SourceChoice::Level(n) => Box::new(
                LevelSource::new(corpus, Level::from_number(*n))
                    .with_sample_size(sample_size)
                    .with_seed(seed),
            ),
            SourceChoice::Document(path) => Box::new(DocumentSource::from_path(path)?),
            SourceChoice::List(path) => Box::new(ListSource::from_path(path)?),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn extraction_sorts_by_lowercase_and_keeps_last_spelling() {
        let words = extract_words("The river Rhine flows; the RIVER is long. a cat, the Flows");
        assert_eq!(words, vec!["Flows", "long", "Rhine", "RIVER"]);

        let words = extract_words("Zebra runs past Apple trees Mango");
        assert_eq!(words, vec!["Apple", "Mango", "past", "runs", "trees", "Zebra"]);
    }

    #[test]
    fn extraction_ignores_short_and_mixed_tokens() {
        assert_eq!(extract_words("cat dog abc2def words"), vec!["words"]);
    }

    #[test]
    fn document_source_errors() {
        assert_matches!(DocumentSource::new("   ", "doc").load(), Err(SourceError::NoInput));
        assert_matches!(
            DocumentSource::new("a an the", "doc").load(),
            Err(SourceError::EmptyResult)
        );
    }

    #[test]
    fn document_source_grades_case_sensitively() {
        let list = DocumentSource::new("Paris is lovely", "doc").load().unwrap();
        assert_eq!(list.words, vec!["lovely", "Paris"]);
        assert_eq!(list.grading, Grading::CaseSensitive);
    }

    #[test]
    fn levels_filter_by_length() {
        assert!(Level::Grade1To3.admits("cat"));
        assert!(!Level::Grade1To3.admits("garden"));
        assert!(Level::Grade4To6.admits("garden"));
        assert!(Level::Grade10To12.admits("pronunciation"));
        assert!(!Level::Grade1To3.admits("Cat"));
        assert_eq!(Level::from_number(9), Level::Grade10To12);
    }

    #[test]
    fn level_source_samples_with_seed() {
        let corpus: Vec<String> = crate::words::builtin_corpus();
        let a = LevelSource::new(corpus.clone(), Level::Grade1To3)
            .with_sample_size(10)
            .with_seed(Some(3))
            .load()
            .unwrap();
        let b = LevelSource::new(corpus, Level::Grade1To3)
            .with_sample_size(10)
            .with_seed(Some(3))
            .load()
            .unwrap();
        assert_eq!(a.words.len(), 10);
        assert_eq!(a, b);
        assert_eq!(a.grading, Grading::CaseInsensitive);
        assert!(a.words.iter().all(|w| Level::Grade1To3.admits(w)));
    }

    #[test]
    fn level_source_errors() {
        assert_matches!(
            LevelSource::new(Vec::new(), Level::Grade1To3).load(),
            Err(SourceError::NoInput)
        );
        assert_matches!(
            LevelSource::new(vec!["cat".into()], Level::Grade10To12).load(),
            Err(SourceError::EmptyResult)
        );
    }

    #[test]
    fn list_source_dedups_and_skips_junk() {
        let list = ListSource::new("apple\n\nApple\ngr4pe\n  lemon  \n", "list")
            .load()
            .unwrap();
        assert_eq!(list.words, vec!["apple", "lemon"]);
    }

    #[test]
    fn list_source_reads_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("words.txt");
        std::fs::write(&path, "Beach\nOcean\n").unwrap();
        let list = ListSource::from_path(&path).unwrap().load().unwrap();
        assert_eq!(list.label, "words.txt");
        assert_eq!(list.words.len(), 2);
    }
}
