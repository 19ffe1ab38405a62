// Central Error Type for the Application

use thiserror::Error;

/// Application-level error type
///
/// Node-scoped failures (binding, backend) never surface here: they are
/// captured in the node's report. This is for run-level problems.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::domain::ConfigError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Backend error: {0}")]
    Backend(#[from] crate::port::BackendError),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
