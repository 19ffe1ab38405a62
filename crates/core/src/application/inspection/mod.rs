// Inspection Service - one run over the task catalog

pub mod request;
pub mod version;

pub use request::RunRequest;
pub use version::{detect_version, DEFAULT_VERSION_QUERY};

use crate::application::coordinator::{CancelToken, Coordinator, EngineConfig, Interrupt};
use crate::application::dispatcher::Backends;
use crate::application::loader::TaskCatalog;
use crate::domain::{Node, RunReport, SkippedTask, TaskConfigError};
use crate::error::{AppError, Result};
use std::collections::BTreeMap;
use tokio::time::Instant;
use tracing::{info, warn};

/// Runs selected tasks one after another, each fanned out over all nodes
pub struct InspectionService {
    coordinator: Coordinator,
}

impl InspectionService {
    pub fn new(backends: Backends, config: EngineConfig) -> Self {
        Self {
            coordinator: Coordinator::new(backends, config),
        }
    }

    /// Execute every task of `catalog` chosen by `request.selection` on `nodes`
    ///
    /// Tasks without a variant for the requested version are skipped, not
    /// failed. Once `cancel` fires or the deadline passes, tasks that have
    /// not started are skipped as well.
    pub async fn run(
        &self,
        catalog: &TaskCatalog,
        nodes: &[Node],
        request: &RunRequest,
        cancel: CancelToken,
    ) -> Result<RunReport> {
        if nodes.is_empty() {
            return Err(AppError::Validation("no target nodes".into()));
        }

        let nodes = &with_user_vars(nodes, &request.vars);
        let deadline = self.coordinator.config().deadline.map(|d| Instant::now() + d);
        let interrupt = Interrupt::new(cancel, deadline);

        let selected = catalog.select(&request.selection)?;
        let config_errors: Vec<TaskConfigError> = catalog
            .select_errors(&request.selection)?
            .into_iter()
            .cloned()
            .collect();

        info!(
            version = %request.version,
            tasks = selected.len(),
            nodes = nodes.len(),
            config_errors = config_errors.len(),
            "Starting inspection run"
        );

        let mut reports = Vec::with_capacity(selected.len());
        let mut skipped = Vec::new();

        for task in selected {
            if interrupt.is_triggered() {
                skipped.push(SkippedTask::interrupted(task.name.clone()));
                continue;
            }

            let Some(variant) = task.select_variant(&request.version) else {
                warn!(task = %task.name, version = %request.version, "No variant for version, skipping");
                skipped.push(SkippedTask::no_variant(task.name.clone(), &request.version));
                continue;
            };

            let report = self
                .coordinator
                .run_task(task, variant, nodes, &request.version, &interrupt)
                .await;
            reports.push(report);
        }

        let report = RunReport::new(
            request.version.clone(),
            request.mode,
            reports,
            skipped,
            config_errors,
        );
        info!(
            status = %report.status,
            tasks = report.tasks.len(),
            skipped = report.skipped.len(),
            "Inspection run finished"
        );
        Ok(report)
    }
}

/// Nodes with the run's user variables layered over their own `vars`
fn with_user_vars(nodes: &[Node], vars: &BTreeMap<String, String>) -> Vec<Node> {
    nodes
        .iter()
        .cloned()
        .map(|mut node| {
            node.vars
                .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
            node
        })
        .collect()
}
