//! Error types for building, querying and loading tries.

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrieError {
    /// The keyset exceeds a configured or structural limit.
    #[error("build error: {0}")]
    Build(String),

    /// The index was built without the feature the caller asked for.
    #[error("feature unavailable: {0}")]
    FeatureUnavailable(&'static str),

    /// `Agent::id` was called while the agent holds no match.
    #[error("agent has no current match")]
    NoMatch,

    /// Persisted bytes failed header, length or consistency validation.
    #[error("corrupt format: {0}")]
    CorruptFormat(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, TrieError>;

pub(crate) fn corrupt(msg: impl Into<String>) -> TrieError {
    TrieError::CorruptFormat(msg.into())
}
