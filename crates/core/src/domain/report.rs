// Report Model & Aggregation
//
// Step -> node -> task -> run. Every level's status is the maximum severity
// of the level below it. Reports are built incrementally while executing and
// serialized once at the end.

use crate::domain::node::NodeId;
use crate::domain::task::{StepKind, TaskName};
use crate::domain::version::{Version, VersionRange};
use serde::Serialize;
use std::fmt;

/// Ordered severity: `Pass < Warning < Critical < Error`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    #[default]
    Pass,
    Warning,
    Critical,
    /// Execution aborted or never finished
    Error,
}

impl Severity {
    /// Whether this severity should fail the process
    pub fn is_failure(&self) -> bool {
        *self >= Severity::Critical
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Pass => write!(f, "PASS"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Critical => write!(f, "CRITICAL"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// Raw outcome of a verification, before `report_type` mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Passed,
    Failed,
}

/// Outcome of one executed step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    pub index: usize,
    pub kind: StepKind,
    /// Command after placeholder substitution
    pub command: String,
    /// Extracted scalar output
    pub output: String,
    pub verdict: Verdict,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// How a node's step sequence ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum NodeOutcome {
    Completed,
    /// Stopped at `step` by a backend or binding failure
    Aborted { step: usize, reason: String },
}

/// Per-node outcome of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeReport {
    pub node: NodeId,
    pub steps: Vec<StepResult>,
    pub outcome: NodeOutcome,
    pub status: Severity,
}

impl NodeReport {
    pub fn completed(node: impl Into<String>, steps: Vec<StepResult>) -> Self {
        Self::build(node.into(), steps, NodeOutcome::Completed)
    }

    pub fn aborted(
        node: impl Into<String>,
        steps: Vec<StepResult>,
        step: usize,
        reason: impl Into<String>,
    ) -> Self {
        Self::build(
            node.into(),
            steps,
            NodeOutcome::Aborted {
                step,
                reason: reason.into(),
            },
        )
    }

    fn build(node: NodeId, steps: Vec<StepResult>, outcome: NodeOutcome) -> Self {
        let status = match outcome {
            NodeOutcome::Aborted { .. } => Severity::Error,
            NodeOutcome::Completed => steps
                .iter()
                .map(|s| s.severity)
                .max()
                .unwrap_or(Severity::Pass),
        };
        Self {
            node,
            steps,
            outcome,
            status,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self.outcome, NodeOutcome::Aborted { .. })
    }

    pub fn abort_reason(&self) -> Option<&str> {
        match &self.outcome {
            NodeOutcome::Aborted { reason, .. } => Some(reason),
            NodeOutcome::Completed => None,
        }
    }
}

/// Per-task outcome across all target nodes
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub task: TaskName,
    pub info: String,
    pub range: VersionRange,
    /// Sorted by node id
    pub nodes: Vec<NodeReport>,
    /// Nodes that never produced a report (cancelled or deadline hit)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unfinished: Vec<NodeId>,
    pub status: Severity,
}

impl TaskReport {
    pub fn new(
        task: impl Into<String>,
        info: impl Into<String>,
        range: VersionRange,
        mut nodes: Vec<NodeReport>,
        mut unfinished: Vec<NodeId>,
    ) -> Self {
        nodes.sort_by(|a, b| a.node.cmp(&b.node));
        unfinished.sort();

        let node_max = nodes
            .iter()
            .map(|n| n.status)
            .max()
            .unwrap_or(Severity::Pass);
        let status = if unfinished.is_empty() {
            node_max
        } else {
            Severity::Error
        };

        Self {
            task: task.into(),
            info: info.into(),
            range,
            nodes,
            unfinished,
            status,
        }
    }

    pub fn aborted_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_aborted()).count()
    }
}

/// Task that never ran: no variant for the version, or the run was
/// interrupted before it started
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedTask {
    pub task: TaskName,
    pub reason: String,
    /// Skipped by cancellation or deadline; counts as `Error`
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub interrupted: bool,
}

impl SkippedTask {
    pub fn no_variant(task: impl Into<String>, version: &Version) -> Self {
        Self {
            task: task.into(),
            reason: format!("no variant matches version {}", version),
            interrupted: false,
        }
    }

    pub fn interrupted(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            reason: "run interrupted before the task started".to_string(),
            interrupted: true,
        }
    }
}

/// Task excluded at load time
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskConfigError {
    pub task: TaskName,
    pub message: String,
}

/// What the run is for; controls rendering only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Health inspection: verdicts and severities
    #[default]
    Check,
    /// State display: raw step outputs
    Display,
}

/// Everything one invocation produced
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub version: Version,
    pub mode: RunMode,
    pub tasks: Vec<TaskReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedTask>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub config_errors: Vec<TaskConfigError>,
    pub status: Severity,
}

impl RunReport {
    pub fn new(
        version: Version,
        mode: RunMode,
        mut tasks: Vec<TaskReport>,
        skipped: Vec<SkippedTask>,
        config_errors: Vec<TaskConfigError>,
    ) -> Self {
        tasks.sort_by(|a, b| a.task.cmp(&b.task));

        let task_max = tasks
            .iter()
            .map(|t| t.status)
            .max()
            .unwrap_or(Severity::Pass);
        let incomplete = !config_errors.is_empty() || skipped.iter().any(|s| s.interrupted);
        let status = if incomplete { Severity::Error } else { task_max };

        Self {
            version,
            mode,
            tasks,
            skipped,
            config_errors,
            status,
        }
    }

    /// Process exit status: non-zero once anything reached critical
    pub fn exit_code(&self) -> i32 {
        if self.status.is_failure() {
            1
        } else {
            0
        }
    }
}
