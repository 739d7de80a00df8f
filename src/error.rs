use thiserror::Error;

/// Main error type for graphrag
#[derive(Error, Debug)]
pub enum GraphragError {
    /// File system I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// HTTP client construction or transport errors
    #[error("HTTP error: {0}")]
    Http(String),

    /// SPARQL endpoint errors
    #[error("SPARQL error: {0}")]
    Sparql(String),

    /// Chat-completion API errors
    #[error("LLM API error: {0}")]
    Llm(String),

    /// Embedding API errors
    #[error("Embedding API error: {0}")]
    Embedding(String),

    /// Malformed response payloads
    #[error("Parse error: {0}")]
    Parse(String),

    /// JSON (de)serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Convenient Result type using GraphragError
pub type Result<T> = std::result::Result<T, GraphragError>;
