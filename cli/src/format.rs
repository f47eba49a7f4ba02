//! Human-readable rendering for CLI output. Pure string builders so every
//! command's output is unit-testable without a backend.

use autoqa_client::{AnalysisSnapshot, ReportRecord, RunRecord, StartedRun, metrics};
use serde::Serialize;

/// Pretty-printed JSON for `--json` output.
pub fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Dashboard metric header: totals, pass rate, latest run.
pub fn run_summary(runs: &[RunRecord]) -> String {
    let totals = metrics::run_totals(runs);
    let mut line = format!(
        "{} runs | {} passed, {} failed | pass rate {}%",
        totals.total,
        totals.passed,
        totals.failed,
        metrics::pass_rate(runs)
    );
    if let Some(latest) = metrics::latest_run(runs) {
        line.push_str(&format!(
            " | latest {} {} ({})",
            latest.run_id,
            latest.status,
            duration_label(latest)
        ));
    }
    line
}

/// One line per run: id, status, start time, duration, then the error or
/// the scenario title.
pub fn run_lines(runs: &[RunRecord]) -> String {
    let mut lines = Vec::with_capacity(runs.len());
    for run in runs {
        let mut line = format!(
            "  {}  {}  {}  {}",
            run.run_id,
            run.status,
            run.started_at.as_deref().unwrap_or("-"),
            duration_label(run)
        );
        if let Some(error) = &run.error {
            line.push_str(&format!("  {error}"));
        } else if !run.scenario_title.is_empty() {
            line.push_str(&format!("  {}", run.scenario_title));
        }
        lines.push(line);
    }
    lines.join("\n")
}

/// One line per report with its artifact URLs resolved against `base`.
pub fn report_lines(reports: &[ReportRecord], base: &str) -> String {
    let mut lines = Vec::with_capacity(reports.len());
    for report in reports {
        let links = report.artifact_urls(base);
        let mut parts = Vec::new();
        if let Some(url) = &links.report_json_url {
            parts.push(format!("json {url}"));
        }
        if let Some(url) = &links.report_pdf_url {
            parts.push(format!("pdf {url}"));
        }
        if let Some(url) = &links.screenshot_url {
            parts.push(format!("screenshot {url}"));
        }
        let artifacts = if parts.is_empty() {
            "no artifacts".to_string()
        } else {
            parts.join(", ")
        };
        lines.push(format!(
            "  {}  {}  {artifacts}",
            report.run_id,
            report.created_at.as_deref().unwrap_or("-")
        ));
    }
    lines.join("\n")
}

/// Compact reports header for `watch`.
pub fn report_summary(reports: &[ReportRecord]) -> String {
    match reports.first() {
        Some(latest) => format!(
            "{} reports | latest {} at {}",
            reports.len(),
            latest.run_id,
            latest.created_at.as_deref().unwrap_or("-")
        ),
        None => "0 reports".to_string(),
    }
}

/// Multi-line analysis card: quality scores, coverage split, findings,
/// risk hotspots, proposed scenario.
pub fn analysis_summary(analysis: &AnalysisSnapshot) -> String {
    let mut lines = vec![format!(
        "analysis for {} ({})",
        analysis.project_id, analysis.application_url
    )];

    let quality = &analysis.quality;
    lines.push(format!(
        "  readiness {} | coverage {}% | {} files impacted | {} open clarifications",
        quality.readiness_score,
        quality.requirement_coverage_pct,
        quality.files_impacted,
        quality.open_clarifications
    ));

    let coverage = &analysis.coverage;
    lines.push(format!(
        "  planned: happy {}%, negative {}%, edge {}%, non-functional {}%",
        coverage.happy, coverage.negative, coverage.edge, coverage.non_functional
    ));

    if analysis.findings.is_empty() {
        lines.push("  no findings".to_string());
    } else {
        lines.push(format!("  {} findings:", analysis.findings.len()));
        for finding in &analysis.findings {
            lines.push(format!(
                "    [{}/{}] {}: {}",
                finding.category, finding.severity, finding.title, finding.detail
            ));
        }
    }

    for hotspot in &analysis.risk_hotspots {
        lines.push(format!(
            "  risk {}: {} ({}) {}",
            hotspot.risk, hotspot.module, hotspot.owner, hotspot.reason
        ));
    }

    match analysis.scenario_title() {
        Some(title) => lines.push(format!(
            "  proposed scenario: {title} (run `autoqa approve` to accept)"
        )),
        None => lines.push("  no proposed scenario".to_string()),
    }

    lines.join("\n")
}

/// Result card for a completed `autoqa run`.
pub fn started_run(started: &StartedRun, base: &str) -> String {
    let run = &started.run;
    let mut lines = vec![format!(
        "run {}: {} ({})",
        run.run_id,
        run.status,
        duration_label(run)
    )];
    if let Some(error) = &run.error {
        lines.push(format!("  error: {error}"));
    }
    if let Some(actual) = &run.actual_result {
        lines.push(format!("  result: {actual}"));
    }
    for (label, url) in [
        ("report", &started.files.report_json_url),
        ("pdf", &started.files.report_pdf_url),
        ("screenshot", &started.files.screenshot_url),
    ] {
        if let Some(url) = url {
            lines.push(format!("  {label}: {}", absolute_url(base, url)));
        }
    }
    lines.join("\n")
}

/// "74s" when the run carries both timestamps, "-" otherwise.
pub fn duration_label(run: &RunRecord) -> String {
    match run.duration_seconds() {
        Some(seconds) => format!("{seconds}s"),
        None => "-".to_string(),
    }
}

/// Backend file links come relative (`/files/...`); resolve them so they
/// are clickable in a terminal.
fn absolute_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}{url}", base.trim_end_matches('/'))
    }
}
