//! Shared error type for cross-crate boundaries

use thiserror::Error;

/// Top-level error for consumers that sit above individual crates
#[derive(Error, Debug)]
pub enum Error {
    #[error("Audio error: {0}")]
    Audio(String),

    #[error("Template error: {0}")]
    Template(#[from] crate::template::TemplateError),

    #[error("Speech I/O error: {0}")]
    Speech(String),

    #[error("Evaluation error: {0}")]
    Evaluation(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, Error>;
