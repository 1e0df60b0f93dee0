//! Report rendering: table, JSON, YAML.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use tabled::settings::Style;
use tabled::{Table, Tabled};

use acisync_core::{KindReport, KindStats, KindStatus, RunReport};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

#[derive(Tabled)]
struct KindRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Created")]
    created: u64,
    #[tabled(rename = "Updated")]
    updated: u64,
    #[tabled(rename = "Unchanged")]
    unchanged: u64,
    #[tabled(rename = "Failed")]
    failed: u64,
    #[tabled(rename = "Verified")]
    verified: u64,
    #[tabled(rename = "Mismatched")]
    mismatched: u64,
}

impl KindRow {
    fn new(kind: String, status: String, stats: &KindStats, mismatched: u64) -> Self {
        Self {
            kind,
            status,
            created: stats.created,
            updated: stats.updated,
            unchanged: stats.unchanged,
            failed: stats.failed,
            verified: stats.verified,
            mismatched,
        }
    }
}

#[derive(Tabled)]
struct IssueRow {
    #[tabled(rename = "Kind")]
    kind: String,
    #[tabled(rename = "Entity")]
    entity: String,
    #[tabled(rename = "Error")]
    class: &'static str,
    #[tabled(rename = "Message")]
    message: String,
}

fn status_cell(report: &KindReport, color: bool) -> String {
    let (text, failed) = match &report.status {
        KindStatus::Completed if report.stats.failed > 0 => ("completed", true),
        KindStatus::Completed => ("completed", false),
        KindStatus::Aborted(_) => ("aborted", true),
        KindStatus::Skipped => ("skipped", false),
    };
    if !color {
        return text.to_owned();
    }
    match (&report.status, failed) {
        (KindStatus::Aborted(_), _) => text.red().bold().to_string(),
        (KindStatus::Skipped, _) => text.dimmed().to_string(),
        (_, true) => text.yellow().to_string(),
        _ => text.green().to_string(),
    }
}

fn render_table(report: &RunReport, color: bool) -> String {
    let mut rows: Vec<KindRow> = report
        .kinds
        .iter()
        .map(|k| KindRow::new(k.kind.to_string(), status_cell(k, color), &k.stats, k.mismatched))
        .collect();
    rows.push(KindRow::new(
        "total".into(),
        String::new(),
        &report.totals(),
        report.mismatched(),
    ));

    let mut out = Table::new(rows).with(Style::rounded()).to_string();

    let issues: Vec<IssueRow> = report
        .kinds
        .iter()
        .flat_map(|k| {
            k.issues.iter().map(move |i| IssueRow {
                kind: k.kind.to_string(),
                entity: i.entity.clone(),
                class: i.class,
                message: i.message.clone(),
            })
        })
        .collect();
    if !issues.is_empty() {
        out.push_str("\n\n");
        out.push_str(&Table::new(issues).with(Style::rounded()).to_string());
    }

    let mode = if report.dry_run { " (dry run)" } else { "" };
    let summary = format!(
        "\n{} kinds in {:.1}s{mode}",
        report.kinds.len(),
        report.elapsed.as_secs_f64()
    );
    out.push_str(&summary);
    out
}

/// Render a run report in the chosen format.
pub fn render_report(
    format: OutputFormat,
    report: &RunReport,
    color: bool,
) -> Result<String, CliError> {
    Ok(match format {
        OutputFormat::Table => render_table(report, color),
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Yaml => serde_yaml::to_string(report)?,
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use acisync_core::{CoreError, EntityKind, Issue};
    use chrono::Utc;

    use super::*;

    fn report() -> RunReport {
        let mut vrfs = KindReport::new(EntityKind::Vrfs);
        vrfs.stats = KindStats {
            created: 2,
            updated: 1,
            unchanged: 5,
            failed: 1,
            verified: 3,
        };
        vrfs.issues.push(Issue::new(
            "prod/main",
            &CoreError::not_found("tenant", "prod"),
        ));
        RunReport {
            started_at: Utc::now(),
            elapsed: Duration::from_millis(1500),
            dry_run: true,
            aborted: false,
            kinds: vec![vrfs, KindReport::skipped(EntityKind::Epgs)],
        }
    }

    #[test]
    fn table_has_kinds_totals_and_issues() {
        let out = render_report(OutputFormat::Table, &report(), false).unwrap();
        assert!(out.contains("vrfs"));
        assert!(out.contains("skipped"));
        assert!(out.contains("total"));
        assert!(out.contains("prod/main"));
        assert!(out.contains("not-found"));
        assert!(out.ends_with("2 kinds in 1.5s (dry run)"));
        assert!(!out.contains('\u{1b}'), "no escape codes without color");
    }

    #[test]
    fn json_keeps_report_structure() {
        let out = render_report(OutputFormat::Json, &report(), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["kinds"][0]["kind"], "vrfs");
        assert_eq!(value["kinds"][0]["stats"]["created"], 2);
        assert_eq!(value["kinds"][1]["status"]["state"], "skipped");
        assert_eq!(value["dry_run"], true);
    }

    #[test]
    fn yaml_renders() {
        let out = render_report(OutputFormat::Yaml, &report(), false).unwrap();
        assert!(out.contains("kind: vrfs"));
    }
}
