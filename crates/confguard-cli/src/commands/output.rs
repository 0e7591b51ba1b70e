//! Shared output formatting for reports and diffs.

use std::fmt::Write;

use anyhow::Result;
use confguard_core::{
    CheckResultDiagnostic, ComplianceReport, ConfigDelta, ConfigDiffResult, DeltaType,
    ResultOption,
};
use miette::{GraphicalReportHandler, GraphicalTheme};

use crate::{DiffFormat, OutputFormat};

/// Print a compliance report in the specified format.
pub fn print(report: &ComplianceReport, format: OutputFormat) -> Result<()> {
    print!("{}", render_report(report, format)?);
    Ok(())
}

/// Renders a compliance report.
pub fn render_report(report: &ComplianceReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report)),
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(report)?)),
        OutputFormat::Compact => Ok(render_compact(report)),
    }
}

fn result_color(result: ResultOption) -> &'static str {
    match result {
        ResultOption::Conforming => "\x1b[32m",
        ResultOption::Nonconforming | ResultOption::InvalidRule => "\x1b[31m",
        ResultOption::Exempted | ResultOption::NotApplicable => "\x1b[34m",
        ResultOption::Disabled => "\x1b[90m",
    }
}

fn render_text(report: &ComplianceReport) -> String {
    let mut out = String::new();
    let mut current_device: Option<&str> = None;

    for result in &report.results {
        if current_device != Some(result.device_name.as_str()) {
            if current_device.is_some() {
                out.push('\n');
            }
            let _ = writeln!(out, "{} [{}]", result.device_name, result.device);
            current_device = Some(&result.device_name);
        }
        let _ = write!(
            out,
            "  {}{:<14}\x1b[0m {}",
            result_color(result.result),
            result.result.as_str(),
            result.rule_name
        );
        if !result.comment.is_empty() {
            let _ = write!(out, " - {}", result.comment);
        }
        out.push('\n');
    }

    let failures: Vec<_> = report
        .results
        .iter()
        .filter(|r| r.result.is_failure())
        .collect();
    if !failures.is_empty() {
        out.push('\n');
        let handler = GraphicalReportHandler::new_themed(GraphicalTheme::unicode_nocolor());
        for failure in failures {
            let diagnostic = CheckResultDiagnostic::from(failure);
            if handler.render_report(&mut out, &diagnostic).is_err() {
                let _ = writeln!(out, "{}", failure.format());
            }
        }
    }

    let summary_color = if report.has_failures() {
        "\x1b[31m"
    } else {
        "\x1b[32m"
    };
    let _ = writeln!(
        out,
        "\n{}Checked {} device(s) against {} rule(s): {}\x1b[0m",
        summary_color,
        report.devices_checked,
        report.rules_checked,
        report.summary()
    );
    out
}

fn render_compact(report: &ComplianceReport) -> String {
    report
        .results
        .iter()
        .map(|result| format!("{}\n", result.format()))
        .collect()
}

/// Renders a diff result.
pub fn render_diff(result: &ConfigDiffResult, format: DiffFormat) -> Result<String> {
    match format {
        DiffFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(result)?)),
        DiffFormat::Text => Ok(render_diff_text(result)),
    }
}

fn delta_label(kind: DeltaType) -> &'static str {
    match kind {
        DeltaType::Insert => "INSERT",
        DeltaType::Delete => "DELETE",
        DeltaType::Change => "CHANGE",
    }
}

fn render_delta(out: &mut String, delta: &ConfigDelta) {
    let _ = writeln!(
        out,
        "@@ {} original line {}, revised line {}",
        delta_label(delta.diff_type),
        delta.original_position + 1,
        delta.revised_position + 1
    );
    if !delta.hierarchy.is_empty() {
        let path: Vec<&str> = delta.hierarchy.iter().map(|a| a.text.as_str()).collect();
        let _ = writeln!(out, "   in: {}", path.join(" > "));
    }
    for line in &delta.pre_context {
        let _ = writeln!(out, "   {line}");
    }
    for line in &delta.original_lines {
        let _ = writeln!(out, " - {line}");
    }
    for line in &delta.revised_lines {
        let _ = writeln!(out, " + {line}");
    }
    for line in &delta.post_context {
        let _ = writeln!(out, "   {line}");
    }
}

fn render_diff_text(result: &ConfigDiffResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Snapshot {} ({}) -> snapshot {} ({})",
        result.original_id, result.original_date, result.revised_id, result.revised_date
    );

    match &result.deltas {
        None => {}
        Some(deltas) if deltas.is_empty() => out.push_str("No differences.\n"),
        Some(deltas) => {
            for (title, entries) in deltas {
                let _ = writeln!(out, "\n== {title} ({} delta(s)) ==", entries.len());
                for delta in entries {
                    render_delta(&mut out, delta);
                }
            }
        }
    }
    out
}
