// Task Definition Model
//
// Resolved form of a task file. Raw YAML shapes live in the loader; everything
// here has already been validated and is immutable for the rest of the run.

use crate::domain::error::ConfigError;
use crate::domain::version::{Version, VersionRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task name, e.g. `observer.system.aio`
pub type TaskName = String;

/// Closed registry of step types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    /// SQL query against the node's SQL endpoint
    Sql,
    /// Command over the node's remote shell
    Ssh,
    /// OS / kernel parameter read
    SystemParameter,
}

impl StepKind {
    /// Resolve a `type` tag from a task file
    pub fn from_tag(tag: &str) -> Result<Self, ConfigError> {
        match tag.trim() {
            "sql" => Ok(StepKind::Sql),
            "ssh" => Ok(StepKind::Ssh),
            "get_system_parameter" | "system_parameter" => Ok(StepKind::SystemParameter),
            other => Err(ConfigError::UnknownStepType(other.to_string())),
        }
    }

    /// Name of the step field carrying this kind's command template
    pub fn command_field(&self) -> &'static str {
        match self {
            StepKind::Sql => "sql",
            StepKind::Ssh => "ssh",
            StepKind::SystemParameter => "parameter",
        }
    }
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepKind::Sql => write!(f, "sql"),
            StepKind::Ssh => write!(f, "ssh"),
            StepKind::SystemParameter => write!(f, "system_parameter"),
        }
    }
}

/// Severity a failed verification raises
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportType {
    /// Record the failure, never raise severity
    Execution,
    Warning,
    #[default]
    Critical,
}

/// Comparator applied to a step's output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerifyType {
    #[default]
    Equal,
    Min,
    Max,
    Between,
    Expression,
}

impl fmt::Display for VerifyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerifyType::Equal => "equal",
            VerifyType::Min => "min",
            VerifyType::Max => "max",
            VerifyType::Between => "between",
            VerifyType::Expression => "expression",
        };
        write!(f, "{}", s)
    }
}

/// Threshold operand(s); both forms may carry placeholders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyValue {
    Scalar(String),
    Range(String, String),
}

/// A verification rule: comparator plus operand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub verify_type: VerifyType,
    pub value: VerifyValue,
}

impl Verification {
    pub fn new(verify_type: VerifyType, value: VerifyValue) -> Self {
        Self { verify_type, value }
    }
}

/// Result handling for a step
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResultRule {
    pub set_value: Option<String>,
    pub report_type: ReportType,
    /// `None` means informational: always passes
    pub verification: Option<Verification>,
    pub err_msg: Option<String>,
}

/// One step of a variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Position within the variant, starting at 1
    pub index: usize,
    pub kind: StepKind,
    pub command: String,
    pub result: ResultRule,
}

/// Step sequence valid for one engine version range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionedVariant {
    pub range: VersionRange,
    pub steps: Vec<Step>,
}

/// A named check or display task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDefinition {
    pub name: TaskName,
    pub info: String,
    pub variants: Vec<VersionedVariant>,
}

impl TaskDefinition {
    /// First declared variant whose range contains `version`
    ///
    /// `None` means the task does not apply to this version and is skipped.
    pub fn select_variant(&self, version: &Version) -> Option<&VersionedVariant> {
        self.variants.iter().find(|v| v.range.contains(version))
    }
}
