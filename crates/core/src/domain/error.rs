// Domain Error Types

use thiserror::Error;

/// Load-time task definition errors
///
/// Fatal for the offending task only; the loader keeps going with the rest.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid version: '{0}'")]
    InvalidVersion(String),

    #[error("Malformed version range '{range}': {reason}")]
    MalformedRange { range: String, reason: String },

    #[error("Unregistered step type '{0}'")]
    UnknownStepType(String),

    #[error("Step {step}: missing '{field}' field for type '{kind}'")]
    MissingCommand {
        step: usize,
        kind: String,
        field: String,
    },

    #[error("Step {step}: invalid verification rule: {reason}")]
    InvalidVerify { step: usize, reason: String },

    #[error("Task has no version variants")]
    NoVariants,

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Unresolved `#{name}` placeholder
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unbound variable '#{{{name}}}' in template: {template}")]
pub struct BindingError {
    pub name: String,
    pub template: String,
}

pub type Result<T> = std::result::Result<T, ConfigError>;
