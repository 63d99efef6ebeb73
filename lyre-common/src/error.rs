//! Common error types for Lyre

use thiserror::Error;

/// Common result type for Lyre operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the Lyre crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Selector string outside the `ALL_TRACKS | ALBUM:<id> | ...` vocabulary
    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
