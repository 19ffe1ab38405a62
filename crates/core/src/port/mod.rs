// Port Layer - Interfaces for the step backends

pub mod backend_error;
pub mod parameter_reader;
pub mod query_executor;
pub mod remote_shell;

// Re-exports
pub use backend_error::BackendError;
pub use parameter_reader::ParameterReader;
pub use query_executor::{QueryExecutor, Rows};
pub use remote_shell::{CommandOutput, RemoteShell};
