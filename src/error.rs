// src/error.rs

use std::io;
use std::path::PathBuf;

/// Errors surfaced while building an opening book.
#[derive(Debug, thiserror::Error)]
pub enum BookError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Scratch directory handling around an archive failed.
    #[error("failed to expand archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid ranked player entry at line {line}: {text:?}")]
    RankedEntry { line: usize, text: String },

    #[error("malformed ranked player list: {0}")]
    RankedList(#[from] csv::Error),

    /// Binary books need 64-bit position keys.
    #[error("binary output requires 64-bit position keys")]
    UnsupportedKey,

    /// A record with a zero weight reached the writer.
    #[error("refusing to write entry with weight {weight} (stored as {stored})")]
    InvalidWeight { weight: u32, stored: u16 },
}

impl BookError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        BookError::Io { path: path.into(), source }
    }
}

pub type BookResult<T> = Result<T, BookError>;
