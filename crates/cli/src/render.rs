//! Report rendering
//!
//! JSON and YAML serialize the whole `RunReport`, XML mirrors its nesting.
//! The table and HTML views flatten it to one row per step, plus one row for
//! each aborted or unfinished node.

use anyhow::Result;
use clap::ValueEnum;
use clusterdiag_core::domain::{
    NodeOutcome, NodeReport, RunMode, RunReport, Severity, TaskReport, Verdict,
};
use colored::Colorize;
use std::fmt::Write as _;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Yaml,
    Html,
    Xml,
}

impl OutputFormat {
    /// File extension used when the report is exported
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Html => "html",
            OutputFormat::Xml => "xml",
        }
    }
}

#[derive(Tabled)]
struct CheckRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

#[derive(Tabled)]
struct DisplayRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Node")]
    node: String,
    #[tabled(rename = "Step")]
    step: String,
    #[tabled(rename = "Command")]
    command: String,
    #[tabled(rename = "Output")]
    output: String,
}

pub fn render(report: &RunReport, format: OutputFormat) -> Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
        OutputFormat::Table => render_table(report),
        OutputFormat::Html => render_html(report),
        OutputFormat::Xml => render_xml(report),
    })
}

const UNFINISHED: &str = "did not finish before the run was interrupted";

/// Step index and reason of an aborted node
fn node_problem(node: &NodeReport) -> Option<(String, String)> {
    match &node.outcome {
        NodeOutcome::Aborted { step, reason } => Some((step.to_string(), reason.clone())),
        NodeOutcome::Completed => None,
    }
}

fn check_rows(task: &TaskReport) -> Vec<CheckRow> {
    let mut rows = Vec::new();
    for node in &task.nodes {
        for step in &node.steps {
            rows.push(CheckRow {
                task: task.task.clone(),
                node: node.node.clone(),
                step: step.index.to_string(),
                status: step.severity.to_string(),
                message: step.message.clone().unwrap_or_default(),
            });
        }
        if let Some((step, reason)) = node_problem(node) {
            rows.push(CheckRow {
                task: task.task.clone(),
                node: node.node.clone(),
                step,
                status: Severity::Error.to_string(),
                message: reason,
            });
        }
    }
    for node in &task.unfinished {
        rows.push(CheckRow {
            task: task.task.clone(),
            node: node.clone(),
            step: "-".to_string(),
            status: Severity::Error.to_string(),
            message: UNFINISHED.to_string(),
        });
    }
    rows
}

fn display_rows(task: &TaskReport) -> Vec<DisplayRow> {
    let mut rows = Vec::new();
    for node in &task.nodes {
        for step in &node.steps {
            rows.push(DisplayRow {
                task: task.task.clone(),
                node: node.node.clone(),
                step: step.index.to_string(),
                command: step.command.clone(),
                output: step.output.clone(),
            });
        }
        if let Some((step, reason)) = node_problem(node) {
            rows.push(DisplayRow {
                task: task.task.clone(),
                node: node.node.clone(),
                step,
                command: String::new(),
                output: format!("error: {}", reason),
            });
        }
    }
    for node in &task.unfinished {
        rows.push(DisplayRow {
            task: task.task.clone(),
            node: node.clone(),
            step: "-".to_string(),
            command: String::new(),
            output: format!("error: {}", UNFINISHED),
        });
    }
    rows
}

fn colored_status(status: Severity) -> String {
    let label = status.to_string();
    match status {
        Severity::Pass => label.green().bold().to_string(),
        Severity::Warning => label.yellow().bold().to_string(),
        Severity::Critical | Severity::Error => label.red().bold().to_string(),
    }
}

fn render_table(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}",
        "Cluster version:".bold(),
        report.version.to_string().cyan()
    );
    let _ = writeln!(out);

    if !report.tasks.is_empty() {
        let table = match report.mode {
            RunMode::Check => {
                let rows: Vec<CheckRow> = report.tasks.iter().flat_map(check_rows).collect();
                Table::new(rows).with(Style::rounded()).to_string()
            }
            RunMode::Display => {
                let rows: Vec<DisplayRow> = report.tasks.iter().flat_map(display_rows).collect();
                Table::new(rows).with(Style::rounded()).to_string()
            }
        };
        let _ = writeln!(out, "{}", table);
        let _ = writeln!(out);
    }

    for skipped in &report.skipped {
        let _ = writeln!(
            out,
            "  {} {} skipped: {}",
            "○".dimmed(),
            skipped.task,
            skipped.reason
        );
    }
    for error in &report.config_errors {
        let _ = writeln!(
            out,
            "  {} {} not loaded: {}",
            "✗".red(),
            error.task,
            error.message
        );
    }

    if report.mode == RunMode::Check {
        for task in &report.tasks {
            let _ = writeln!(out, "  {} {}", colored_status(task.status), task.task);
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{} {}", "Overall:".bold(), colored_status(report.status));
    }
    out
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn render_html(report: &RunReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<!DOCTYPE html>");
    let _ = writeln!(out, "<html><head><meta charset=\"utf-8\"><title>clusterdiag report</title></head><body>");
    let _ = writeln!(
        out,
        "<h1>Cluster version {}</h1>\n<p class=\"status {}\">Overall: {}</p>",
        escape(&report.version.to_string()),
        report.status.to_string().to_lowercase(),
        report.status
    );

    for task in &report.tasks {
        let _ = writeln!(
            out,
            "<h2>{} <small>{}</small></h2>\n<p>{}</p>",
            escape(&task.task),
            task.status,
            escape(&task.info)
        );
        let _ = writeln!(out, "<table>");
        match report.mode {
            RunMode::Check => {
                let _ = writeln!(out, "<tr><th>Node</th><th>Step</th><th>Status</th><th>Message</th></tr>");
                for row in check_rows(task) {
                    let _ = writeln!(
                        out,
                        "<tr class=\"{}\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                        row.status.to_lowercase(),
                        escape(&row.node),
                        row.step,
                        row.status,
                        escape(&row.message)
                    );
                }
            }
            RunMode::Display => {
                let _ = writeln!(out, "<tr><th>Node</th><th>Step</th><th>Command</th><th>Output</th></tr>");
                for row in display_rows(task) {
                    let _ = writeln!(
                        out,
                        "<tr><td>{}</td><td>{}</td><td><code>{}</code></td><td><pre>{}</pre></td></tr>",
                        escape(&row.node),
                        row.step,
                        escape(&row.command),
                        escape(&row.output)
                    );
                }
            }
        }
        let _ = writeln!(out, "</table>");
    }

    if !report.skipped.is_empty() || !report.config_errors.is_empty() {
        let _ = writeln!(out, "<ul>");
        for skipped in &report.skipped {
            let _ = writeln!(
                out,
                "<li>{} skipped: {}</li>",
                escape(&skipped.task),
                escape(&skipped.reason)
            );
        }
        for error in &report.config_errors {
            let _ = writeln!(
                out,
                "<li>{} not loaded: {}</li>",
                escape(&error.task),
                escape(&error.message)
            );
        }
        let _ = writeln!(out, "</ul>");
    }

    let _ = writeln!(out, "</body></html>");
    out
}

fn lower(severity: Severity) -> String {
    severity.to_string().to_lowercase()
}

fn render_xml(report: &RunReport) -> String {
    let mut out = String::new();
    let mode = match report.mode {
        RunMode::Check => "check",
        RunMode::Display => "display",
    };
    let _ = writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    let _ = writeln!(
        out,
        "<report version=\"{}\" mode=\"{}\" status=\"{}\">",
        escape(&report.version.to_string()),
        mode,
        lower(report.status)
    );

    for task in &report.tasks {
        let _ = writeln!(
            out,
            "  <task name=\"{}\" range=\"{}\" status=\"{}\">",
            escape(&task.task),
            escape(&task.range.to_string()),
            lower(task.status)
        );
        let _ = writeln!(out, "    <info>{}</info>", escape(&task.info));
        for node in &task.nodes {
            let _ = writeln!(
                out,
                "    <node id=\"{}\" status=\"{}\">",
                escape(&node.node),
                lower(node.status)
            );
            for step in &node.steps {
                let verdict = match step.verdict {
                    Verdict::Passed => "passed",
                    Verdict::Failed => "failed",
                };
                let _ = writeln!(
                    out,
                    "      <step index=\"{}\" kind=\"{}\" verdict=\"{}\" severity=\"{}\">",
                    step.index,
                    step.kind,
                    verdict,
                    lower(step.severity)
                );
                let _ = writeln!(out, "        <command>{}</command>", escape(&step.command));
                let _ = writeln!(out, "        <output>{}</output>", escape(&step.output));
                if let Some(message) = &step.message {
                    let _ = writeln!(out, "        <message>{}</message>", escape(message));
                }
                let _ = writeln!(out, "      </step>");
            }
            if let Some((step, reason)) = node_problem(node) {
                let _ = writeln!(out, "      <aborted step=\"{}\">{}</aborted>", step, escape(&reason));
            }
            let _ = writeln!(out, "    </node>");
        }
        for node in &task.unfinished {
            let _ = writeln!(out, "    <unfinished node=\"{}\"/>", escape(node));
        }
        let _ = writeln!(out, "  </task>");
    }

    for skipped in &report.skipped {
        let _ = writeln!(
            out,
            "  <skipped task=\"{}\" interrupted=\"{}\">{}</skipped>",
            escape(&skipped.task),
            skipped.interrupted,
            escape(&skipped.reason)
        );
    }
    for error in &report.config_errors {
        let _ = writeln!(
            out,
            "  <config_error task=\"{}\">{}</config_error>",
            escape(&error.task),
            escape(&error.message)
        );
    }
    let _ = writeln!(out, "</report>");
    out
}
