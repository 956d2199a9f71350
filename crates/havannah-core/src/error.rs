//! Error types shared across the crate.

use thiserror::Error;

use crate::types::Move;

/// Rejected move request. The board is left untouched.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveError {
    #[error("cell {0} is already occupied")]
    Occupied(Move),

    #[error("{0} is not on the board")]
    OffBoard(Move),

    #[error("the game is already over")]
    GameOver,

    #[error("swap is only legal as the second move with swap enabled")]
    SwapUnavailable,

    #[error("{0} is not a playable move")]
    NotAMove(Move),
}

/// Text parsing failures for moves and sizes.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("invalid move text '{0}'")]
    InvalidMove(String),

    #[error("invalid outcome text '{0}'")]
    InvalidOutcome(String),

    #[error("board size {0} is out of range")]
    InvalidSize(usize),
}

/// Game record (parenthesized move list) failures.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("record syntax error at byte {pos}: {reason}")]
    Syntax { pos: usize, reason: String },

    #[error("record is for size {found}, expected {expected}")]
    SizeMismatch { expected: usize, found: usize },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("record replay failed: {0}")]
    Move(#[from] MoveError),
}

/// Invalid configuration values or unreadable configuration files.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error(transparent)]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A search run that could not complete normally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("worker {worker} panicked: {message}")]
    WorkerPanicked { worker: usize, message: String },
}

pub type MoveResult<T> = Result<T, MoveError>;
pub type RecordResult<T> = Result<T, RecordError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type SearchResult<T> = Result<T, SearchError>;
