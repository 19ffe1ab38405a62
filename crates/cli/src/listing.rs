//! `--list`: available check packages and tasks

use clusterdiag_core::application::{PackageCatalog, TaskCatalog};
use colored::Colorize;
use std::fmt::Write as _;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Tabled)]
struct PackageRow {
    #[tabled(rename = "Package")]
    name: String,
    #[tabled(rename = "Tasks")]
    tasks: String,
    #[tabled(rename = "Info")]
    info: String,
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "Task")]
    name: String,
    #[tabled(rename = "Versions")]
    versions: String,
    #[tabled(rename = "Info")]
    info: String,
}

pub fn render_listing(catalog: &TaskCatalog, packages: &PackageCatalog) -> String {
    let mut out = String::new();

    let mut package_rows = vec![PackageRow {
        name: "(default)".to_string(),
        tasks: "*".to_string(),
        info: "every task except the filter list".to_string(),
    }];
    package_rows.extend(packages.packages().iter().map(|p| PackageRow {
        name: p.name.clone(),
        tasks: p.tasks.join("\n"),
        info: p.info.clone(),
    }));
    let _ = writeln!(out, "{}", "Check packages".bold());
    let _ = writeln!(out, "{}", Table::new(package_rows).with(Style::rounded()));
    if !packages.exclusions().is_empty() {
        let _ = writeln!(out, "  filter: {}", packages.exclusions().join(", "));
    }
    let _ = writeln!(out);

    let task_rows: Vec<TaskRow> = catalog
        .tasks
        .iter()
        .map(|t| TaskRow {
            name: t.name.clone(),
            versions: t
                .variants
                .iter()
                .map(|v| v.range.to_string())
                .collect::<Vec<_>>()
                .join(" "),
            info: t.info.clone(),
        })
        .collect();
    let _ = writeln!(out, "{}", "Tasks".bold());
    let _ = writeln!(out, "{}", Table::new(task_rows).with(Style::rounded()));

    for error in &catalog.errors {
        let _ = writeln!(out, "  {} {} not loaded: {}", "✗".red(), error.task, error.message);
    }
    out
}
