//! Common error types shared across the pipeline and its stores.

use thiserror::Error;

#[derive(Error, Debug)]
/// Simplified error type wrapping the most common failure modes.
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("validation error: {0}")]
    Validation(String),
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Parse(err.to_string())
    }
}

/// Convenience alias for results that use [`AppError`].
pub type Result<T> = std::result::Result<T, AppError>;
