//! End-to-end engine scenarios
//!
//! Task trees are written to a temp directory, loaded through the loader and
//! run by the inspection service against mocked backends.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use clusterdiag_core::application::{
    load_dir, Backends, CancelToken, EngineConfig, InspectionService, PackageCatalog, RunRequest,
    TaskCatalog,
};
use clusterdiag_core::domain::{Node, RunReport, Severity, Version};
use clusterdiag_core::port::parameter_reader::mocks::MockParameterReader;
use clusterdiag_core::port::query_executor::mocks::MockQueryExecutor;
use clusterdiag_core::port::remote_shell::mocks::MockRemoteShell;
use clusterdiag_core::port::BackendError;

fn write_task(root: &Path, relative: &str, yaml: &str) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, yaml).unwrap();
}

fn nodes(n: usize) -> Vec<Node> {
    (1..=n)
        .map(|i| Node::new(format!("node-{}", i), format!("10.0.0.{}", i)))
        .collect()
}

fn version() -> Version {
    Version::parse("4.2.1.0").unwrap()
}

async fn run(
    catalog: &TaskCatalog,
    nodes: &[Node],
    query: MockQueryExecutor,
    shell: Arc<MockRemoteShell>,
    parameters: MockParameterReader,
    workers: usize,
) -> RunReport {
    let backends = Backends::new(Arc::new(query), shell, Arc::new(parameters));
    let service = InspectionService::new(
        backends,
        EngineConfig {
            workers,
            ..Default::default()
        },
    );
    service
        .run(catalog, nodes, &RunRequest::new(version()), CancelToken::never())
        .await
        .unwrap()
}

/// 5 nodes, 2 workers, one node's shell unreachable
#[tokio::test]
async fn test_partial_failure_isolated() {
    let dir = tempfile::tempdir().unwrap();
    write_task(
        dir.path(),
        "observer/os/ulimit.yaml",
        r##"
info: open file limit
task:
  - steps:
      - type: ssh
        ssh: "ulimit -n"
        result:
          set_value: nofile
          verify_type: min
          verify: 20000
      - type: ssh
        ssh: "echo #{nofile}"
"##,
    );
    let catalog = load_dir(dir.path()).unwrap();
    let shell = Arc::new(
        MockRemoteShell::new()
            .with_delay(Duration::from_millis(10))
            .on("ulimit", "655350")
            .fail_node("node-3", BackendError::Connect("connection refused".into())),
    );

    let report = run(
        &catalog,
        &nodes(5),
        MockQueryExecutor::new(),
        shell.clone(),
        MockParameterReader::new(),
        2,
    )
    .await;

    let task = &report.tasks[0];
    assert_eq!(task.task, "observer.os.ulimit");
    assert_eq!(task.nodes.len(), 5);
    assert_eq!(task.aborted_count(), 1);
    assert_eq!(
        task.nodes[2].abort_reason(),
        Some("Connection failed: connection refused")
    );
    for (i, node) in task.nodes.iter().enumerate() {
        if i != 2 {
            assert!(!node.is_aborted());
            assert_eq!(node.steps.len(), 2);
            assert_eq!(node.status, Severity::Pass);
        }
    }
    assert!(task.status >= Severity::Critical);
    assert!(shell.max_in_flight() <= 2);
    assert_eq!(report.exit_code(), 1);
}

/// `max 10` with outputs 8 and 15
#[tokio::test]
async fn test_max_threshold_classification() {
    let dir = tempfile::tempdir().unwrap();
    write_task(
        dir.path(),
        "observer/cluster/major_freeze.yaml",
        r##"
info: pending freeze count
task:
  - version: "[4.0.0.0, *]"
    steps:
      - type: sql
        sql: "select count(*) from oceanbase.CDB_OB_MAJOR_COMPACTION where status != 'IDLE'"
        result:
          set_value: pending
          verify_type: max
          verify: 10
          err_msg: "#{pending} pending compactions on #{node.id}, expected at most 10"
"##,
    );
    let catalog = load_dir(dir.path()).unwrap();
    let query = MockQueryExecutor::new()
        .on_node_scalar("node-1", "CDB_OB_MAJOR_COMPACTION", "8")
        .on_node_scalar("node-2", "CDB_OB_MAJOR_COMPACTION", "15");

    let report = run(
        &catalog,
        &nodes(2),
        query,
        Arc::new(MockRemoteShell::new()),
        MockParameterReader::new(),
        4,
    )
    .await;

    let task = &report.tasks[0];
    assert_eq!(task.nodes[0].status, Severity::Pass);
    assert_eq!(task.nodes[0].steps[0].message, None);
    assert_eq!(task.nodes[1].status, Severity::Critical);
    assert_eq!(
        task.nodes[1].steps[0].message.as_deref(),
        Some("15 pending compactions on node-2, expected at most 10")
    );
    assert_eq!(report.status, Severity::Critical);
}

/// A value bound by step 1 reaches step 2's command
#[tokio::test]
async fn test_bound_value_flows_into_next_step() {
    let dir = tempfile::tempdir().unwrap();
    write_task(
        dir.path(),
        "observer/disk/data_dir.yaml",
        r##"
info: data dir usage
task:
  - steps:
      - type: sql
        sql: "select value from oceanbase.GV$OB_PARAMETERS where name = 'data_dir' and svr_ip = '#{node.host}'"
        result:
          set_value: data_dir
      - type: ssh
        ssh: "df --output=pcent #{data_dir} | tail -1 | tr -d ' %'"
        result:
          set_value: used
          verify_type: max
          verify: 85
          report_type: warning
"##,
    );
    let catalog = load_dir(dir.path()).unwrap();
    let query = MockQueryExecutor::new()
        .on_node_scalar("node-1", "data_dir", "/data/1")
        .on_node_scalar("node-2", "data_dir", "/data/2");
    let shell = Arc::new(
        MockRemoteShell::new()
            .on("df", "40")
            .on_node("node-2", "/data/2", "91"),
    );

    let report = run(
        &catalog,
        &nodes(2),
        query,
        shell.clone(),
        MockParameterReader::new(),
        2,
    )
    .await;

    assert_eq!(
        shell.commands_for("node-1"),
        vec!["df --output=pcent /data/1 | tail -1 | tr -d ' %'"]
    );
    assert_eq!(
        shell.commands_for("node-2"),
        vec!["df --output=pcent /data/2 | tail -1 | tr -d ' %'"]
    );
    let task = &report.tasks[0];
    assert_eq!(task.nodes[0].status, Severity::Pass);
    assert_eq!(task.nodes[1].status, Severity::Warning);
    assert_eq!(report.exit_code(), 0);
}

/// `between [lo, hi]`: both bounds pass, one outside each bound fails
#[tokio::test]
async fn test_between_bounds_inclusive() {
    let dir = tempfile::tempdir().unwrap();
    write_task(
        dir.path(),
        "observer/os/aio.yaml",
        r##"
info: aio-max-nr
task:
  - version: "[*, 3.2.4]"
    steps:
      - type: sql
        sql: "select 1"
  - version: "[4.0.0.0, *]"
    steps:
      - type: get_system_parameter
        parameter: fs.aio-max-nr
        result:
          verify_type: between
          verify: [65536, 1048576]
"##,
    );
    let catalog = load_dir(dir.path()).unwrap();
    let parameters = MockParameterReader::new()
        .with_node("node-1", "fs.aio-max-nr", "65536")
        .with_node("node-2", "fs.aio-max-nr", "1048576")
        .with_node("node-3", "fs.aio-max-nr", "65535")
        .with_node("node-4", "fs.aio-max-nr", "1048577");
    let query = MockQueryExecutor::new();

    let report = run(
        &catalog,
        &nodes(4),
        query,
        Arc::new(MockRemoteShell::new()),
        parameters,
        4,
    )
    .await;

    let statuses: Vec<Severity> = report.tasks[0].nodes.iter().map(|n| n.status).collect();
    assert_eq!(
        statuses,
        vec![
            Severity::Pass,
            Severity::Pass,
            Severity::Critical,
            Severity::Critical
        ]
    );
    assert_eq!(report.tasks[0].range.to_string(), "[4.0.0.0, *]");
}

/// Same inputs, same report, whatever order nodes finish in
#[tokio::test]
async fn test_runs_are_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    write_task(
        dir.path(),
        "observer/os/swap.yaml",
        r##"
info: swappiness
task:
  - steps:
      - type: get_system_parameter
        parameter: vm.swappiness
        result:
          verify: 0
          err_msg: "vm.swappiness is #{node.id}"
"##,
    );
    write_task(
        dir.path(),
        "observer/os/uptime.yaml",
        "info: uptime\ntask:\n  - steps:\n      - type: ssh\n        ssh: uptime\n",
    );
    let catalog = load_dir(dir.path()).unwrap();

    let mut snapshots = Vec::new();
    for _ in 0..2 {
        let mut targets = nodes(6);
        targets.reverse();
        let parameters = MockParameterReader::new()
            .with("vm.swappiness", "0")
            .with_node("node-4", "vm.swappiness", "60");
        let report = run(
            &catalog,
            &targets,
            MockQueryExecutor::new(),
            Arc::new(MockRemoteShell::new().with_delay(Duration::from_millis(3))),
            parameters,
            3,
        )
        .await;
        snapshots.push(serde_json::to_value(&report).unwrap());
    }

    assert_eq!(snapshots[0], snapshots[1]);
    let tasks = snapshots[0]["tasks"].as_array().unwrap();
    assert_eq!(tasks[0]["task"], "observer.os.swap");
    assert_eq!(tasks[1]["task"], "observer.os.uptime");
    assert_eq!(tasks[0]["nodes"][3]["status"], "critical");
}

/// A broken task file is reported without hiding the healthy ones
#[tokio::test]
async fn test_broken_task_only_excludes_itself() {
    let dir = tempfile::tempdir().unwrap();
    write_task(
        dir.path(),
        "observer/ok.yaml",
        "task:\n  - steps:\n      - type: ssh\n        ssh: uptime\n",
    );
    write_task(
        dir.path(),
        "observer/broken.yaml",
        "task:\n  - version: \"[5.0, 4.0]\"\n    steps:\n      - type: ssh\n        ssh: uptime\n",
    );
    let catalog = load_dir(dir.path()).unwrap();

    let report = run(
        &catalog,
        &nodes(1),
        MockQueryExecutor::new(),
        Arc::new(MockRemoteShell::new()),
        MockParameterReader::new(),
        1,
    )
    .await;

    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0].status, Severity::Pass);
    assert_eq!(report.config_errors.len(), 1);
    assert_eq!(report.config_errors[0].task, "observer.broken");
    assert_eq!(report.status, Severity::Error);
}

/// Default runs honor the package `filter`; `--env` values reach commands
#[tokio::test]
async fn test_package_filter_and_user_vars() {
    let dir = tempfile::tempdir().unwrap();
    let tasks = dir.path().join("tasks");
    write_task(
        &tasks,
        "observer/os/home.yaml",
        r##"
info: install dir exists
task:
  - steps:
      - type: ssh
        ssh: "test -d #{home_path} && echo ok"
        result:
          set_value: present
          verify: ok
"##,
    );
    write_task(
        &tasks,
        "observer/sysbench/tps.yaml",
        r##"
info: sysbench run
task:
  - steps:
      - type: ssh
        ssh: "sysbench run"
"##,
    );
    let package_file = dir.path().join("check_package.yaml");
    fs::write(
        &package_file,
        "bench:\n  info_en: benchmarks\n  tasks: [observer.sysbench.*]\nfilter:\n  tasks: [observer.sysbench.*]\n",
    )
    .unwrap();

    let catalog = load_dir(&tasks).unwrap();
    let packages = PackageCatalog::load(&package_file).unwrap();
    let shell = Arc::new(MockRemoteShell::new().on("test -d", "ok").on("sysbench", "1"));
    let backends = Backends::new(
        Arc::new(MockQueryExecutor::new()),
        shell.clone(),
        Arc::new(MockParameterReader::new()),
    );
    let service = InspectionService::new(backends, EngineConfig::default());
    let vars = [("home_path".to_string(), "/home/admin/oceanbase".to_string())]
        .into_iter()
        .collect();

    let request = RunRequest::new(version())
        .with_selection(packages.selection(None, &[]).unwrap())
        .with_vars(vars);
    let report = service
        .run(&catalog, &nodes(1), &request, CancelToken::never())
        .await
        .unwrap();

    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0].task, "observer.os.home");
    assert_eq!(report.status, Severity::Pass);
    assert_eq!(
        shell.commands_for("node-1"),
        vec!["test -d /home/admin/oceanbase && echo ok"]
    );

    let request = RunRequest::new(version())
        .with_selection(packages.selection(Some("bench"), &[]).unwrap());
    let report = service
        .run(&catalog, &nodes(1), &request, CancelToken::never())
        .await
        .unwrap();

    assert_eq!(report.tasks.len(), 1);
    assert_eq!(report.tasks[0].task, "observer.sysbench.tps");
}
