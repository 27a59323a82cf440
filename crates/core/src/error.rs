//! Error types for chess-correlation-core

use thiserror::Error;

use crate::engine::EngineFailure;

#[derive(Error, Debug)]
pub enum Error {
    /// Book, engine or run settings could not be loaded. Fatal before any game is read.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An engine failed while analysing a position of the current game.
    #[error(transparent)]
    Engine(#[from] EngineFailure),

    #[error("Malformed game record: {0}")]
    MalformedGame(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// True when the error comes from a run-level cancellation rather than a real failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Engine(failure) if failure.is_cancelled())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
