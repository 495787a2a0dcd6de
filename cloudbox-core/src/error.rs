//! Error types for cloudbox

use thiserror::Error;

/// Main error type for cloudbox operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Out of bounds read: {0}")]
    OutOfBounds(String),

    #[error("Invalid construction: {0}")]
    InvalidConstruction(String),
}

/// Result type alias for cloudbox operations
pub type Result<T> = std::result::Result<T, Error>;
