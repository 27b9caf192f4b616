use std::time::Duration;

use thiserror::Error;

use crate::types::ErrorKind;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Input(String),

    /// Fatal: the indexes cannot be prepared, evaluation must not start.
    #[error("Index build failed: {0}")]
    IndexBuild(String),

    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("No option letters could be parsed from the generation output: {0}")]
    GenerationParse(String),

    #[error("Scoring failed: {0}")]
    Scoring(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Category recorded on an evaluation record when this error ends a question.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Retrieval(_) => ErrorKind::Retrieval,
            Error::Generation(_) => ErrorKind::Generation,
            Error::GenerationParse(_) => ErrorKind::GenerationParse,
            Error::Scoring(_) => ErrorKind::Scoring,
            Error::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::Other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
