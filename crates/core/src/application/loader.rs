//! Task loader - parses YAML task files into validated `TaskDefinition`s
//!
//! A broken task only excludes itself: the loader collects one
//! `TaskConfigError` per offending file and keeps every other task.

use crate::domain::{
    ConfigError, ReportType, ResultRule, Step, StepKind, TaskConfigError, TaskDefinition,
    Verification, VerifyType, VerifyValue, VersionRange, VersionedVariant,
};
use crate::error::{AppError, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Range used when a variant declares no `version`
const ANY_VERSION: &str = "[*, *]";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTask {
    #[serde(default)]
    info: String,
    #[serde(default)]
    task: Vec<RawVariant>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawVariant {
    version: Option<String>,
    #[serde(default)]
    steps: Vec<RawStep>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawStep {
    #[serde(rename = "type")]
    kind: String,
    sql: Option<String>,
    ssh: Option<String>,
    parameter: Option<String>,
    #[serde(default)]
    result: RawResult,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawResult {
    set_value: Option<String>,
    report_type: Option<ReportType>,
    verify_type: Option<VerifyType>,
    verify: Option<serde_yaml::Value>,
    err_msg: Option<String>,
}

/// Loaded tasks plus the ones excluded by configuration errors
#[derive(Debug, Clone, Default)]
pub struct TaskCatalog {
    /// Sorted by name
    pub tasks: Vec<TaskDefinition>,
    pub errors: Vec<TaskConfigError>,
}

impl TaskCatalog {
    /// Tasks chosen by `selection`, in name order
    pub fn select(&self, selection: &TaskSelection) -> Result<Vec<&TaskDefinition>> {
        let matcher = Matcher::new(selection)?;
        Ok(self.tasks.iter().filter(|t| matcher.matches(&t.name)).collect())
    }

    /// Load errors of the tasks `selection` would have chosen
    pub fn select_errors(&self, selection: &TaskSelection) -> Result<Vec<&TaskConfigError>> {
        let matcher = Matcher::new(selection)?;
        Ok(self.errors.iter().filter(|e| matcher.matches(&e.task)).collect())
    }
}

/// Which tasks a run covers, as `*` globs over task names
///
/// A task is chosen when it matches any `include` pattern (every task when
/// `include` is empty) and no `exclude` pattern.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSelection {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl TaskSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn including(patterns: Vec<String>) -> Self {
        Self {
            include: patterns,
            exclude: Vec::new(),
        }
    }

    pub fn excluding(mut self, patterns: Vec<String>) -> Self {
        self.exclude = patterns;
        self
    }
}

struct Matcher {
    include: Vec<glob::Pattern>,
    exclude: Vec<glob::Pattern>,
}

impl Matcher {
    fn new(selection: &TaskSelection) -> Result<Self> {
        Ok(Self {
            include: compile(&selection.include)?,
            exclude: compile(&selection.exclude)?,
        })
    }

    fn matches(&self, name: &str) -> bool {
        let included = self.include.is_empty() || self.include.iter().any(|p| p.matches(name));
        included && !self.exclude.iter().any(|p| p.matches(name))
    }
}

fn compile(patterns: &[String]) -> Result<Vec<glob::Pattern>> {
    patterns
        .iter()
        .map(|p| {
            glob::Pattern::new(p.trim())
                .map_err(|e| AppError::Validation(format!("invalid task pattern '{}': {}", p, e)))
        })
        .collect()
}

/// Parse one task from YAML text
pub fn parse_task(name: &str, yaml: &str) -> std::result::Result<TaskDefinition, ConfigError> {
    let raw: RawTask = serde_yaml::from_str(yaml).map_err(|e| ConfigError::Parse(e.to_string()))?;
    if raw.task.is_empty() {
        return Err(ConfigError::NoVariants);
    }

    let variants = raw
        .task
        .into_iter()
        .map(resolve_variant)
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(TaskDefinition {
        name: name.to_string(),
        info: raw.info.trim().to_string(),
        variants,
    })
}

fn resolve_variant(raw: RawVariant) -> std::result::Result<VersionedVariant, ConfigError> {
    let range = VersionRange::parse(raw.version.as_deref().unwrap_or(ANY_VERSION))?;
    let steps = raw
        .steps
        .into_iter()
        .enumerate()
        .map(|(i, step)| resolve_step(i + 1, step))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(VersionedVariant { range, steps })
}

fn resolve_step(index: usize, raw: RawStep) -> std::result::Result<Step, ConfigError> {
    let kind = StepKind::from_tag(&raw.kind)?;
    let command = match kind {
        StepKind::Sql => raw.sql,
        StepKind::Ssh => raw.ssh,
        StepKind::SystemParameter => raw.parameter,
    }
    .filter(|c| !c.trim().is_empty())
    .ok_or_else(|| ConfigError::MissingCommand {
        step: index,
        kind: raw.kind.clone(),
        field: kind.command_field().to_string(),
    })?;

    let result = resolve_result(index, raw.result)?;
    Ok(Step {
        index,
        kind,
        command,
        result,
    })
}

fn resolve_result(index: usize, raw: RawResult) -> std::result::Result<ResultRule, ConfigError> {
    let invalid = |reason: String| ConfigError::InvalidVerify { step: index, reason };

    let verification = match (raw.verify_type, raw.verify) {
        (None, None) => None,
        (Some(t), None) => return Err(invalid(format!("verify_type '{}' without verify", t))),
        (verify_type, Some(value)) => {
            let verify_type = verify_type.unwrap_or_default();
            let value = verify_value(verify_type, &value).map_err(invalid)?;
            Some(Verification::new(verify_type, value))
        }
    };

    Ok(ResultRule {
        set_value: raw.set_value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        report_type: raw.report_type.unwrap_or_default(),
        verification,
        err_msg: raw.err_msg,
    })
}

fn verify_value(
    verify_type: VerifyType,
    value: &serde_yaml::Value,
) -> std::result::Result<VerifyValue, String> {
    match verify_type {
        VerifyType::Between => {
            let (lo, hi) = match value {
                serde_yaml::Value::Sequence(items) if items.len() == 2 => {
                    (scalar(&items[0])?, scalar(&items[1])?)
                }
                serde_yaml::Value::String(s) => bracketed_pair(s)
                    .ok_or_else(|| format!("between expects [lo, hi], got '{}'", s))?,
                other => return Err(format!("between expects [lo, hi], got {:?}", other)),
            };
            Ok(VerifyValue::Range(lo, hi))
        }
        _ => scalar(value).map(VerifyValue::Scalar),
    }
}

fn scalar(value: &serde_yaml::Value) -> std::result::Result<String, String> {
    match value {
        serde_yaml::Value::String(s) => Ok(s.clone()),
        serde_yaml::Value::Number(n) => Ok(n.to_string()),
        serde_yaml::Value::Bool(b) => Ok(b.to_string()),
        other => Err(format!("expected a scalar verify value, got {:?}", other)),
    }
}

fn bracketed_pair(s: &str) -> Option<(String, String)> {
    let inner = s.trim().strip_prefix('[')?.strip_suffix(']')?;
    let (lo, hi) = inner.split_once(',')?;
    if hi.contains(',') {
        return None;
    }
    Some((lo.trim().to_string(), hi.trim().to_string()))
}

/// Task name from its path under the task root: `observer/system/aio.yaml`
/// becomes `observer.system.aio`
pub fn task_name(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = relative.with_extension("");
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(".")
}

fn is_task_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

fn read_task(name: &str, path: &Path) -> std::result::Result<TaskDefinition, ConfigError> {
    let yaml = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Io(format!("{}: {}", path.display(), e)))?;
    parse_task(name, &yaml)
}

/// Load every `*.yaml` / `*.yml` task under `root`
///
/// # Errors
/// Only if `root` itself cannot be read. Per-task problems end up in
/// `TaskCatalog::errors`.
pub fn load_dir(root: &Path) -> Result<TaskCatalog> {
    if !root.is_dir() {
        return Err(AppError::NotFound(format!(
            "task directory '{}'",
            root.display()
        )));
    }

    let mut catalog = TaskCatalog::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry in task directory");
                continue;
            }
        };
        let path = entry.path();
        if !entry.file_type().is_file() || !is_task_file(path) {
            continue;
        }

        let name = task_name(root, path);
        let parsed = read_task(&name, path);

        match parsed {
            Ok(task) => {
                debug!(task = %task.name, variants = task.variants.len(), "Loaded task");
                catalog.tasks.push(task);
            }
            Err(e) => {
                warn!(task = %name, error = %e, "Excluding task with invalid definition");
                catalog.errors.push(TaskConfigError {
                    task: name,
                    message: e.to_string(),
                });
            }
        }
    }

    catalog.tasks.sort_by(|a, b| a.name.cmp(&b.name));
    info!(
        root = %root.display(),
        loaded = catalog.tasks.len(),
        excluded = catalog.errors.len(),
        "Task catalog loaded"
    );
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Version;

    const AIO_TASK: &str = r#"
info: "check aio-max-nr"
task:
  - version: "[4.0.0.0, *]"
    steps:
      - type: ssh
        ssh: "cat /proc/sys/fs/aio-max-nr"
        result:
          set_value: aio_max_nr
          verify_type: min
          verify: 1048576
          report_type: warning
          err_msg: "aio-max-nr is #{aio_max_nr}"
      - type: get_system_parameter
        parameter: fs.file-max
      - type: sql
        sql: "select count(*) from DBA_OB_SERVERS where status != 'ACTIVE'"
        result:
          verify: 0
  - version: "[*, 3.9.9.9]"
    steps:
      - type: ssh
        ssh: "cat /proc/sys/fs/aio-max-nr"
        result:
          verify_type: between
          verify: "[65536, 1048576]"
"#;

    #[test]
    fn test_parse_full_task() {
        let task = parse_task("observer.aio", AIO_TASK).unwrap();
        assert_eq!(task.info, "check aio-max-nr");
        assert_eq!(task.variants.len(), 2);

        let steps = &task.variants[0].steps;
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[0].kind, StepKind::Ssh);
        assert_eq!(steps[0].result.set_value.as_deref(), Some("aio_max_nr"));
        assert_eq!(steps[0].result.report_type, ReportType::Warning);
        assert_eq!(
            steps[0].result.verification,
            Some(Verification::new(VerifyType::Min, VerifyValue::Scalar("1048576".into())))
        );
        assert_eq!(steps[1].kind, StepKind::SystemParameter);
        assert_eq!(steps[1].command, "fs.file-max");
        assert_eq!(steps[1].result, ResultRule::default());
        assert_eq!(steps[2].result.report_type, ReportType::Critical);
        assert_eq!(
            steps[2].result.verification.as_ref().map(|v| v.verify_type),
            Some(VerifyType::Equal)
        );

        assert_eq!(
            task.variants[1].steps[0].result.verification,
            Some(Verification::new(
                VerifyType::Between,
                VerifyValue::Range("65536".into(), "1048576".into())
            ))
        );
    }

    #[test]
    fn test_selects_by_version() {
        let task = parse_task("observer.aio", AIO_TASK).unwrap();
        let v4 = task.select_variant(&Version::parse("4.2.1.0").unwrap()).unwrap();
        assert_eq!(v4.steps.len(), 3);
        let v3 = task.select_variant(&Version::parse("3.1.4").unwrap()).unwrap();
        assert_eq!(v3.steps.len(), 1);
    }

    #[test]
    fn test_between_accepts_yaml_sequence() {
        let yaml = r#"
task:
  - steps:
      - type: sql
        sql: "select 1"
        result:
          verify_type: between
          verify: [1, 5]
"#;
        let task = parse_task("t", yaml).unwrap();
        assert_eq!(task.variants[0].range, VersionRange::any());
        assert_eq!(
            task.variants[0].steps[0].result.verification.as_ref().map(|v| v.value.clone()),
            Some(VerifyValue::Range("1".into(), "5".into()))
        );
    }

    #[test]
    fn test_config_errors() {
        let unknown_type = "task:\n  - steps:\n      - type: telnet\n        ssh: ls\n";
        assert_eq!(
            parse_task("t", unknown_type).unwrap_err(),
            ConfigError::UnknownStepType("telnet".into())
        );

        let bad_range = "task:\n  - version: \"4.0, *\"\n    steps: []\n";
        assert!(matches!(
            parse_task("t", bad_range).unwrap_err(),
            ConfigError::MalformedRange { .. }
        ));

        let missing_command = "task:\n  - steps:\n      - type: sql\n        ssh: ls\n";
        assert!(matches!(
            parse_task("t", missing_command).unwrap_err(),
            ConfigError::MissingCommand { step: 1, .. }
        ));

        let bad_between = "task:\n  - steps:\n      - type: sql\n        sql: s\n        result:\n          verify_type: between\n          verify: 5\n";
        assert!(matches!(
            parse_task("t", bad_between).unwrap_err(),
            ConfigError::InvalidVerify { step: 1, .. }
        ));

        let type_without_verify = "task:\n  - steps:\n      - type: sql\n        sql: s\n        result:\n          verify_type: max\n";
        assert!(matches!(
            parse_task("t", type_without_verify).unwrap_err(),
            ConfigError::InvalidVerify { .. }
        ));

        assert_eq!(parse_task("t", "info: nothing\n").unwrap_err(), ConfigError::NoVariants);
        assert!(matches!(parse_task("t", "task: [").unwrap_err(), ConfigError::Parse(_)));
    }

    #[test]
    fn test_task_name_from_path() {
        let root = Path::new("/tasks");
        assert_eq!(
            task_name(root, Path::new("/tasks/observer/system/aio.yaml")),
            "observer.system.aio"
        );
        assert_eq!(task_name(root, Path::new("/tasks/clog.yml")), "clog");
    }

    #[test]
    fn test_load_dir_excludes_only_broken_tasks() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("observer");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("aio.yaml"), AIO_TASK).unwrap();
        std::fs::write(
            sub.join("broken.yaml"),
            "task:\n  - version: \"[5.0, 4.0]\"\n    steps: []\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("README.md"), "not a task").unwrap();

        let catalog = load_dir(dir.path()).unwrap();

        assert_eq!(catalog.tasks.len(), 1);
        assert_eq!(catalog.tasks[0].name, "observer.aio");
        assert_eq!(catalog.errors.len(), 1);
        assert_eq!(catalog.errors[0].task, "observer.broken");
        assert!(catalog.errors[0].message.contains("Malformed version range"));
    }

    #[test]
    fn test_load_dir_missing_root() {
        assert!(matches!(
            load_dir(Path::new("/definitely/not/here")),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_select_by_glob() {
        let mk = |name: &str| TaskDefinition {
            name: name.to_string(),
            info: String::new(),
            variants: vec![],
        };
        let catalog = TaskCatalog {
            tasks: vec![mk("observer.system.aio"), mk("observer.clog.disk"), mk("obproxy.conn")],
            errors: vec![],
        };

        let names = |selection: TaskSelection| -> Vec<String> {
            catalog
                .select(&selection)
                .unwrap()
                .iter()
                .map(|t| t.name.clone())
                .collect()
        };

        assert_eq!(
            names(TaskSelection::including(vec!["observer.*".to_string()])),
            vec!["observer.system.aio", "observer.clog.disk"]
        );
        assert_eq!(names(TaskSelection::all()).len(), 3);
        assert_eq!(
            names(TaskSelection::all().excluding(vec!["observer.clog.*".to_string()])),
            vec!["observer.system.aio", "obproxy.conn"]
        );
        assert!(catalog
            .select_errors(&TaskSelection::including(vec!["observer.*".to_string()]))
            .unwrap()
            .is_empty());
        assert!(catalog
            .select(&TaskSelection::including(vec!["[".to_string()]))
            .is_err());
    }
}
