// Coordinator - bounded fan-out of one task across the target nodes

pub mod cancel;
pub mod constants;
mod panic_guard;

use constants::*;
pub use cancel::{cancel_channel, CancelSender, CancelToken, Interrupt};
pub use panic_guard::{execute_guarded, PanicGuardResult};

use crate::application::dispatcher::Backends;
use crate::application::node_runner::run_node;
use crate::domain::{Node, NodeId, NodeReport, TaskDefinition, TaskReport, Version, VersionedVariant};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

/// Explicit engine inputs; nothing is read from ambient state
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum node executions in flight (at least 1)
    pub workers: usize,
    /// Global run deadline, measured from the start of the run
    pub deadline: Option<Duration>,
    /// Time in-flight executions get after cancellation
    pub grace_period: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            deadline: None,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

/// Runs one selected task variant on every target node
///
/// Node executions share nothing mutable: each gets its own execution
/// context, the variant is shared read-only and the backends are `Arc`ed.
pub struct Coordinator {
    backends: Backends,
    config: EngineConfig,
}

impl Coordinator {
    pub fn new(backends: Backends, config: EngineConfig) -> Self {
        Self { backends, config }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Execute `variant` of `task` on `nodes`, at most `workers` at a time
    ///
    /// One node's failure (backend error, unbound variable, even a panic)
    /// only affects that node's report. Reports are ordered by node id.
    /// Once `interrupt` fires no new node is scheduled; in-flight nodes get
    /// the grace period, then are abandoned and listed as unfinished.
    pub async fn run_task(
        &self,
        task: &TaskDefinition,
        variant: &VersionedVariant,
        nodes: &[Node],
        version: &Version,
        interrupt: &Interrupt,
    ) -> TaskReport {
        let workers = self.config.workers.max(1);
        info!(
            task = %task.name,
            range = %variant.range,
            nodes = nodes.len(),
            workers = workers,
            "Running task"
        );

        let semaphore = Arc::new(Semaphore::new(workers));
        let steps = Arc::new(variant.steps.clone());
        let task_name: Arc<str> = Arc::from(task.name.as_str());
        let version = Arc::new(version.clone());

        let mut pending: BTreeSet<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
        let mut reports: Vec<NodeReport> = Vec::with_capacity(nodes.len());
        let mut running = JoinSet::new();
        let mut interrupted = false;

        let stop = interrupt.triggered();
        tokio::pin!(stop);

        for node in nodes {
            let permit = tokio::select! {
                biased;
                _ = &mut stop => {
                    interrupted = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => break,
                },
            };

            let backends = self.backends.clone();
            let node = node.clone();
            let steps = Arc::clone(&steps);
            let task_name = Arc::clone(&task_name);
            let version = Arc::clone(&version);

            running.spawn(async move {
                let _permit = permit;
                let execution = run_node(&backends, &node, &task_name, &steps, &version);
                match execute_guarded(execution).await {
                    PanicGuardResult::Success(report) => report,
                    PanicGuardResult::Panicked(msg) => NodeReport::aborted(
                        node.id.clone(),
                        Vec::new(),
                        UNATTRIBUTED_STEP,
                        format!("node execution panicked: {}", msg),
                    ),
                }
            });
        }

        if !interrupted {
            loop {
                tokio::select! {
                    biased;
                    joined = running.join_next() => match joined {
                        Some(result) => collect(result, &mut pending, &mut reports),
                        None => break,
                    },
                    _ = &mut stop => {
                        interrupted = true;
                        break;
                    }
                }
            }
        }

        if interrupted {
            warn!(
                task = %task.name,
                in_flight = running.len(),
                grace_ms = self.config.grace_period.as_millis() as u64,
                "Run interrupted, draining in-flight nodes"
            );
            let drained = tokio::time::timeout(self.config.grace_period, async {
                while let Some(result) = running.join_next().await {
                    collect(result, &mut pending, &mut reports);
                }
            })
            .await;
            if drained.is_err() {
                warn!(task = %task.name, abandoned = running.len(), "Abandoning in-flight nodes");
                running.abort_all();
            }
        }

        let report = TaskReport::new(
            task.name.clone(),
            task.info.clone(),
            variant.range.clone(),
            reports,
            pending.into_iter().collect(),
        );
        info!(
            task = %report.task,
            status = %report.status,
            aborted = report.aborted_count(),
            unfinished = report.unfinished.len(),
            "Task finished"
        );
        report
    }
}

fn collect(
    joined: Result<NodeReport, tokio::task::JoinError>,
    pending: &mut BTreeSet<NodeId>,
    reports: &mut Vec<NodeReport>,
) {
    match joined {
        Ok(report) => {
            pending.remove(&report.node);
            reports.push(report);
        }
        // Panics are caught inside the task; this is a cancelled join
        Err(join_err) => error!("Node execution join failed: {:?}", join_err),
    }
}
