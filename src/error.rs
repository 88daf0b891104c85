use thiserror::Error;

/// Main error type for askrag
#[derive(Error, Debug)]
pub enum AskragError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Chat completion API errors
    #[error("Generation error: {0}")]
    Generation(String),

    /// Encyclopedia lookup errors
    #[error("Encyclopedia error: {0}")]
    Encyclopedia(String),

    /// Vector index / similarity search errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Uploaded file type the ingestion pipeline cannot load
    #[error("Unsupported document type: {0}")]
    UnsupportedDocumentType(String),

    /// Parse errors
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A collaborator call exceeded its deadline
    #[error("Timed out after {secs}s waiting for {what}")]
    Timeout { what: String, secs: u64 },
}

/// Convenient Result type using AskragError
pub type Result<T> = std::result::Result<T, AskragError>;
