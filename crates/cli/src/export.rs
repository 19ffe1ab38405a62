//! Report export to a store directory

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clusterdiag_core::domain::{RunMode, RunReport};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::render::{render, OutputFormat};

/// `clusterdiag_<mode>_report_<timestamp>.<ext>`
fn file_name(report: &RunReport, format: OutputFormat, at: DateTime<Local>) -> String {
    let mode = match report.mode {
        RunMode::Check => "check",
        RunMode::Display => "display",
    };
    format!(
        "clusterdiag_{}_report_{}.{}",
        mode,
        at.format("%Y-%m-%d-%H-%M-%S"),
        format.extension()
    )
}

/// Write `report` under `store_dir`, creating it if needed
///
/// Files never carry terminal color codes.
pub fn export_report(
    report: &RunReport,
    format: OutputFormat,
    store_dir: &Path,
    at: DateTime<Local>,
) -> Result<PathBuf> {
    std::fs::create_dir_all(store_dir)
        .with_context(|| format!("Failed to create store dir {}", store_dir.display()))?;

    colored::control::set_override(false);
    let rendered = render(report, format);
    colored::control::unset_override();

    let path = store_dir.join(file_name(report, format, at));
    std::fs::write(&path, rendered?)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    info!(path = %path.display(), "Report exported");
    Ok(path)
}
