//! clusterdiag - declarative inspection tasks against a database cluster

mod config;
mod export;
mod listing;
mod logging;
mod render;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, ValueEnum};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{info, warn};

use clusterdiag_core::application::{
    cancel_channel, detect_version, load_dir, Backends, InspectionService, PackageCatalog,
    RunRequest, DEFAULT_VERSION_QUERY,
};
use clusterdiag_core::domain::{RunMode, Version};
use clusterdiag_infra_sql::{PoolSettings, SqlQueryExecutor};
use clusterdiag_infra_system::{SshSettings, SshShellExecutor, SysctlParameterReader};

use crate::config::ClusterConfig;
use crate::export::export_report;
use crate::listing::render_listing;
use crate::render::{render, OutputFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
enum ModeArg {
    /// Verify and classify every step
    #[default]
    Check,
    /// Show raw step outputs
    Display,
}

impl From<ModeArg> for RunMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Check => RunMode::Check,
            ModeArg::Display => RunMode::Display,
        }
    }
}

/// `KEY=VALUE` for `--env`; matching quotes around the value are dropped
fn parse_env(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if !valid {
        return Err(format!("invalid variable name '{}'", key));
    }

    let value = value.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);
    Ok((key.to_string(), unquoted.to_string()))
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

#[derive(Parser)]
#[command(name = "clusterdiag")]
#[command(about = "Run declarative inspection tasks against a database cluster", long_about = None)]
#[command(disable_version_flag = true)]
struct Cli {
    /// Cluster description (nodes, credentials, limits)
    #[arg(short, long, env = "CLUSTERDIAG_CONFIG", default_value = "cluster.yaml")]
    config: PathBuf,

    /// Root directory of the task tree
    #[arg(short, long, env = "CLUSTERDIAG_TASKS", default_value = "tasks")]
    tasks: PathBuf,

    /// Check package file (named task lists and the `filter` exclusions)
    #[arg(long, env = "CLUSTERDIAG_PACKAGES", default_value = "check_package.yaml")]
    packages: PathBuf,

    /// Run the tasks of one check package
    #[arg(short, long, conflicts_with = "filter")]
    package: Option<String>,

    /// Task name globs, e.g. `observer.*` (default: every task outside `filter`)
    #[arg(short, long, value_delimiter = ',')]
    filter: Vec<String>,

    /// Variable bound on every node, usable as `#{KEY}` (repeatable)
    #[arg(short, long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
    env: Vec<(String, String)>,

    /// Cluster version; detected over SQL when omitted
    #[arg(long = "version")]
    cluster_version: Option<String>,

    /// Query used for version detection
    #[arg(long, default_value = DEFAULT_VERSION_QUERY)]
    version_query: String,

    /// Maximum nodes inspected concurrently (overrides the config file)
    #[arg(short, long)]
    workers: Option<usize>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    #[arg(short, long, value_enum, default_value_t = ModeArg::Check)]
    mode: ModeArg,

    /// Also write the report to a timestamped file in this directory
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// List check packages and tasks, then exit
    #[arg(long)]
    list: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // 1. Logging
    logging::init()?;
    info!("clusterdiag v{} starting", clusterdiag_core::VERSION);

    // 2. Task tree and check packages
    let task_root = expand(&cli.tasks);
    let catalog = load_dir(&task_root)
        .with_context(|| format!("Failed to load tasks from {}", task_root.display()))?;
    let package_file = expand(&cli.packages);
    let packages = PackageCatalog::load(&package_file)
        .with_context(|| format!("Failed to load check packages from {}", package_file.display()))?;

    if cli.list {
        print!("{}", render_listing(&catalog, &packages));
        return Ok(ExitCode::SUCCESS);
    }
    for error in &catalog.errors {
        warn!(task = %error.task, error = %error.message, "Task excluded");
    }
    let selection = packages.selection(cli.package.as_deref(), &cli.filter)?;

    // 3. Configuration
    let cluster = ClusterConfig::load(&expand(&cli.config))?;
    let nodes = cluster.nodes();

    // 4. Adapters (DI wiring)
    let engine = cluster.engine_config(cli.workers);
    let control_dir = std::env::temp_dir().join(format!("clusterdiag-{}", std::process::id()));
    std::fs::create_dir_all(&control_dir)
        .with_context(|| format!("Failed to create {}", control_dir.display()))?;

    let sql = Arc::new(SqlQueryExecutor::new(
        PoolSettings {
            max_connections: engine.workers as u32,
            connect_timeout: cluster.connect_timeout(),
        },
        cluster.command_timeout(),
    ));
    let shell = Arc::new(SshShellExecutor::new(SshSettings {
        connect_timeout: cluster.connect_timeout(),
        command_timeout: cluster.command_timeout(),
        control_dir: Some(control_dir.clone()),
        env_allowlist: cluster.env_allowlist.clone(),
    }));
    let parameters = Arc::new(SysctlParameterReader::new(shell.clone()));
    let backends = Backends::new(sql.clone(), shell, parameters);

    // 5. Version
    let version = match &cli.cluster_version {
        Some(raw) => Version::parse(raw).context("Invalid --version")?,
        None => detect_version(sql.as_ref(), &nodes, &cli.version_query)
            .await
            .context("Version detection failed; pass --version explicitly")?,
    };

    // 6. Cancellation on Ctrl+C
    let (cancel_tx, cancel) = cancel_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight steps");
            cancel_tx.cancel();
        }
    });

    // 7. Run
    let request = RunRequest::new(version)
        .with_mode(cli.mode.into())
        .with_selection(selection)
        .with_vars(cli.env.iter().cloned().collect());
    let service = InspectionService::new(backends, engine);
    let report = service.run(&catalog, &nodes, &request, cancel).await;

    sql.close().await;
    if let Err(e) = std::fs::remove_dir_all(&control_dir) {
        warn!(error = %e, dir = %control_dir.display(), "Failed to remove ssh control directory");
    }

    // 8. Output
    let report = report?;
    println!("{}", render(&report, cli.format)?);
    if let Some(dir) = &cli.store_dir {
        let path = export_report(&report, cli.format, &expand(dir), Local::now())?;
        eprintln!("Report saved to {}", path.display());
    }

    Ok(ExitCode::from(report.exit_code() as u8))
}
