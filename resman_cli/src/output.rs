//! Report rendering

use crate::scenario::{ScenarioReport, StepReport};
use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use resman_core::{CacheData, CacheEntry, MetricsSummary, Notification, ResourceCatalog};
use std::fmt::Write;

/// Output format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parse output format from string
    pub fn from_string(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => anyhow::bail!("Unknown output format: {}", s),
        }
    }
}

/// Render a scenario report
pub fn render_report(report: &ScenarioReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
        OutputFormat::Text => Ok(report_text(report)),
    }
}

fn report_text(report: &ScenarioReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", "Steps".bold().blue());
    for step in &report.steps {
        let _ = writeln!(out, "  {}", step_line(step));
    }

    let _ = writeln!(out, "\n{}", "Notifications".bold().blue());
    for notification in &report.notifications {
        let _ = writeln!(out, "  {}", notification_line(notification));
    }

    let _ = writeln!(
        out,
        "\n{} ({} entries)",
        "Cache".bold().blue(),
        report.cache.len()
    );
    for entry in &report.cache {
        let _ = writeln!(out, "  {}", entry_line(entry));
    }

    let _ = writeln!(out, "\n{}", "Metrics".bold().blue());
    let _ = writeln!(out, "  {}", metrics_line(&report.metrics));

    out
}

fn step_line(step: &StepReport) -> String {
    let attempts = match step.attempts {
        1 => "1 attempt".to_string(),
        n => format!("{n} attempts"),
    };
    let id = step
        .id
        .as_ref()
        .map(|id| format!(" id={id}"))
        .unwrap_or_default();

    match &step.error {
        None => format!(
            "[{}] {} {} ({attempts}){id}",
            step.index + 1,
            step.operation,
            "ok".green()
        ),
        Some(error) => format!(
            "[{}] {} {} ({attempts}){id}: {error}",
            step.index + 1,
            step.operation,
            "failed".red()
        ),
    }
}

fn notification_line(notification: &Notification) -> String {
    if notification.success {
        format!("{} {}", "✓".green(), notification.message)
    } else {
        format!("{} {}", "✗".red(), notification.message)
    }
}

fn entry_line(entry: &CacheEntry) -> String {
    let stale = if entry.stale {
        format!(" {}", "stale".yellow())
    } else {
        String::new()
    };
    let data = match &entry.data {
        CacheData::Item(record) => record.clone().into_value().to_string(),
        CacheData::List(records) => {
            let ids: Vec<String> = records
                .iter()
                .map(|record| {
                    record
                        .id()
                        .map(|id| id.to_string())
                        .unwrap_or_else(|| "?".to_string())
                })
                .collect();
            format!("{} records [{}]", records.len(), ids.join(", "))
        }
    };
    format!("{}{stale} {data}", entry.key.to_string().cyan())
}

fn metrics_line(summary: &MetricsSummary) -> String {
    let ms = |value: Option<u64>| {
        value
            .map(|v| format!("{v}ms"))
            .unwrap_or_else(|| "n/a".to_string())
    };
    format!(
        "total {}, failures {}, average {}, max {}, slow {}",
        summary.total,
        summary.failures,
        ms(summary.average_duration_ms),
        ms(summary.max_duration_ms),
        summary.slow_operations
    )
}

/// Render the resource catalog
pub fn render_catalog(catalog: &ResourceCatalog, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => {
            let kinds: Vec<_> = catalog.kinds().collect();
            Ok(serde_json::to_string_pretty(&kinds)?)
        }
        OutputFormat::Text => {
            let mut out = String::new();
            for kind in catalog.kinds() {
                let _ = write!(out, "{:<10} {}", kind.name.cyan(), kind.label);
                if !kind.embedded_in.is_empty() {
                    let _ = write!(out, " (embedded in: {})", kind.embedded_in.join(", "));
                }
                out.push('\n');
            }
            Ok(out)
        }
    }
}
