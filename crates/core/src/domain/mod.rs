// Domain Layer - Task model, versions, nodes and reports

pub mod error;
pub mod node;
pub mod report;
pub mod task;
pub mod version;

// Re-exports
pub use error::{BindingError, ConfigError};
pub use node::{Node, NodeId, SshTarget, DEFAULT_SSH_PORT};
pub use report::{
    NodeOutcome, NodeReport, RunMode, RunReport, Severity, SkippedTask, StepResult,
    TaskConfigError, TaskReport, Verdict,
};
pub use task::{
    ReportType, ResultRule, Step, StepKind, TaskDefinition, TaskName, Verification,
    VerifyType, VerifyValue, VersionedVariant,
};
pub use version::{Bound, Version, VersionRange};
