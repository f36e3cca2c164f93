//! Error types for shelfmark-core

use thiserror::Error;

/// Result type alias using shelfmark-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shelfmark-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Entity not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote transport error (HTTP layer)
    #[error("Remote transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Remote server rejected or failed a sync call
    #[error("Remote sync error: {0}")]
    Remote(String),

    /// Pulled remote data failed to decode against the expected schema
    #[error("Remote decode error: {0}")]
    RemoteDecode(String),
}

impl Error {
    /// Whether this error came from the remote leg of an operation.
    ///
    /// Remote errors are soft: the local mutation has already committed and
    /// the operation is recorded in the pending queue instead of failing.
    pub const fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Remote(_) | Self::RemoteDecode(_)
        )
    }
}
