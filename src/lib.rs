//! Spelling and pronunciation trainer: a quiz session that speaks a word,
//! grades the typed answer and keeps a list of words to review.

pub mod app;
pub mod clock;
pub mod config;
pub mod error;
pub mod providers;
pub mod scoring;
pub mod session;
pub mod sources;
pub mod types;
pub mod words;

pub use error::{QuizError, Result};
pub use session::QuizSession;
pub use types::{Grading, MissCause, Phase, PoolRange, ReviewEntry, WordList, WordPool};
