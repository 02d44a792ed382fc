use std::io;
use thiserror::Error;
use pdsfile::{OpenError, ResolveError};

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to open archive: {0}")]
    Open(#[from] OpenError),

    #[error("{0}")]
    Resolve(#[from] ResolveError),

    #[error("Not a category: {0}")]
    InvalidCategory(String),

    #[error("Invalid file pattern: {0}")]
    InvalidPattern(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Already at the top of the holdings tree")]
    AtRoot,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON encoding error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("REPL Readline error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),
}
