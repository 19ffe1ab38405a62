//! Node runner - executes one task variant's steps against one node
//!
//! State machine: `NotStarted -> Running(step) -> Completed | Aborted(reason)`.
//! `Running` only advances after a step's dispatch, bind and verify cycle
//! succeed. Backend and binding failures abort the remaining steps;
//! verification failures only classify severity.

use crate::application::binder::ExecutionContext;
use crate::application::dispatcher::Backends;
use crate::application::verify::{classify, evaluate, Evaluation};
use crate::domain::{
    BindingError, Node, NodeReport, Step, StepResult, Verdict, Verification, VerifyValue, Version,
};
use crate::port::BackendError;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Failure that aborts a node's step sequence
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NodeError {
    #[error("{0}")]
    Binding(#[from] BindingError),

    #[error("{0}")]
    Backend(#[from] BackendError),
}

/// Per-node execution state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeState {
    NotStarted,
    Running(usize),
    Completed,
    Aborted(String),
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeState::NotStarted => write!(f, "NOT_STARTED"),
            NodeState::Running(step) => write!(f, "RUNNING({})", step),
            NodeState::Completed => write!(f, "COMPLETED"),
            NodeState::Aborted(_) => write!(f, "ABORTED"),
        }
    }
}

/// Run `steps` in order against `node` with a fresh execution context
pub async fn run_node(
    backends: &Backends,
    node: &Node,
    task: &str,
    steps: &[Step],
    version: &Version,
) -> NodeReport {
    let mut ctx = ExecutionContext::for_node(node, version);
    let mut results = Vec::with_capacity(steps.len());
    let mut state = NodeState::NotStarted;
    debug!(
        task = %task,
        node = %node.id,
        state = %state,
        steps = steps.len(),
        "Node execution starting"
    );

    for step in steps {
        state = NodeState::Running(step.index);
        debug!(task = %task, node = %node.id, state = %state, "Running step");

        match run_step(backends, node, step, &mut ctx).await {
            Ok(result) => results.push(result),
            Err(e) => {
                let reason = e.to_string();
                warn!(
                    task = %task,
                    node = %node.id,
                    step = step.index,
                    error = %reason,
                    "Node execution aborted"
                );
                state = NodeState::Aborted(reason.clone());
                debug!(task = %task, node = %node.id, state = %state, "Node finished");
                return NodeReport::aborted(node.id.clone(), results, step.index, reason);
            }
        }
    }

    state = NodeState::Completed;
    let report = NodeReport::completed(node.id.clone(), results);
    info!(
        task = %task,
        node = %node.id,
        state = %state,
        status = %report.status,
        "Node finished"
    );
    report
}

/// One dispatch -> bind -> verify cycle
async fn run_step(
    backends: &Backends,
    node: &Node,
    step: &Step,
    ctx: &mut ExecutionContext,
) -> Result<StepResult, NodeError> {
    let command = ctx.substitute(&step.command)?;
    let output = backends.dispatch(node, step.kind, &command).await?;

    if let Some(name) = &step.result.set_value {
        ctx.bind(name.clone(), output.clone());
    }

    let verification = step
        .result
        .verification
        .as_ref()
        .map(|v| substitute_verification(ctx, v))
        .transpose()?;

    let failure = match evaluate(&output, verification.as_ref()) {
        Evaluation::Passed => None,
        Evaluation::Failed(reason) => Some(reason),
        Evaluation::Expression(expr) => {
            if backends.run_expression(node, step.kind, &expr).await? {
                None
            } else {
                Some(format!("expression is false: {}", expr))
            }
        }
    };

    let (verdict, message) = match failure {
        None => (Verdict::Passed, None),
        Some(default_reason) => {
            let message = match &step.result.err_msg {
                Some(template) => ctx.substitute(template)?,
                None => default_reason,
            };
            (Verdict::Failed, Some(message))
        }
    };

    let severity = classify(verdict, step.result.report_type);
    if verdict == Verdict::Failed {
        debug!(
            node = %node.id,
            step = step.index,
            severity = %severity,
            output = %output,
            "Verification failed"
        );
    }

    Ok(StepResult {
        index: step.index,
        kind: step.kind,
        command,
        output,
        verdict,
        severity,
        message,
    })
}

fn substitute_verification(
    ctx: &ExecutionContext,
    verification: &Verification,
) -> Result<Verification, BindingError> {
    let value = match &verification.value {
        VerifyValue::Scalar(v) => VerifyValue::Scalar(ctx.substitute(v)?),
        VerifyValue::Range(lo, hi) => VerifyValue::Range(ctx.substitute(lo)?, ctx.substitute(hi)?),
    };
    Ok(Verification::new(verification.verify_type, value))
}
