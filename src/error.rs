use thiserror::Error;

/// Failures reported by the speech and lexical providers.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Provider timed out")]
    Timeout,

    #[error("Provider returned no output")]
    EmptyOutput,
}

/// Failures while loading a word source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("No input supplied")]
    NoInput,

    #[error("Source produced no usable words")]
    EmptyResult,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum QuizError {
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("No words left in the pool")]
    PoolExhausted,

    #[error("Answer is empty")]
    EmptyInput,

    #[error("Provider failure: {0}")]
    Provider(#[from] ProviderError),

    #[error("Failed to load words: {0}")]
    SourceLoad(#[from] SourceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize/deserialize data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Terminal error: {0}")]
    Terminal(String),
}

pub type Result<T> = std::result::Result<T, QuizError>;
