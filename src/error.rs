use thiserror::Error;

/// Main error type for Entigraph
#[derive(Error, Debug)]
pub enum EntigraphError {
    /// Malformed request payload, id, or relation name
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Target document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Document (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Any other backend failure
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EntigraphError {
    /// True for the error classes that map to a client fault (4xx); everything
    /// else is surfaced as a generic internal error.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            EntigraphError::InvalidArgument(_) | EntigraphError::NotFound(_)
        )
    }
}

/// Convenient Result type using EntigraphError
pub type Result<T> = std::result::Result<T, EntigraphError>;
