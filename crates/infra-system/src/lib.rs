// clusterdiag Infrastructure - Process Adapters
// Implements: RemoteShell (ssh / local sh), ParameterReader (sysctl)

pub mod parameter_reader;
pub mod ssh_executor;

pub use parameter_reader::SysctlParameterReader;
pub use ssh_executor::{SshSettings, SshShellExecutor};
