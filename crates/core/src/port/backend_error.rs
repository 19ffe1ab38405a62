// Backend Error
// Shared failure type for every step backend

use thiserror::Error;

/// Connectivity or execution failure of one step against one node
///
/// Aborts the rest of that node's step sequence. The message is carried
/// verbatim into the report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("Connection failed: {0}")]
    Connect(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Command exited with status {}: {stderr}", exit_label(.exit_code))]
    CommandFailed {
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Spawn failed: {0}")]
    Spawn(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("IO error: {0}")]
    Io(String),
}

fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "unknown (killed by signal)".to_string(), |c| c.to_string())
}
