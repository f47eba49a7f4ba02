//! Normalized entities for the QA backend's wire records.
//!
//! The backend is duck-typed JSON; dashboards historically papered over
//! missing fields with `||` fallbacks at every call site. The mappers here
//! centralize that tolerance: every `from_value` constructor is total, with
//! documented defaults per field (counts 0, timestamps absent, status
//! [`RunStatus::Unknown`], strings empty). Calling a mapper twice on
//! equivalent input yields identical output.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Lifecycle state of a run. `Unknown` is the mapper default for missing or
/// unrecognized statuses and equals no terminal state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Pass,
    Fail,
    #[default]
    Unknown,
}

impl RunStatus {
    /// Case-insensitive parse; accepts both bare and past-tense forms
    /// (`PASS`/`passed`, `FAIL`/`failed`). Anything else is `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Self::Pending,
            "running" => Self::Running,
            "pass" | "passed" => Self::Pass,
            "fail" | "failed" => Self::Fail,
            _ => Self::Unknown,
        }
    }

    /// Pass and Fail are terminal; a run never leaves them.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Pass | Self::Fail)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(text)
    }
}

/// Outcome of a single scripted step within a run. Status vocabulary is the
/// backend's own and is carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    pub idx: u64,
    pub action_type: String,
    pub status: String,
    pub error: Option<String>,
}

impl ActionResult {
    pub fn from_value(raw: &Value) -> Self {
        Self {
            idx: count_field(raw, "idx"),
            action_type: str_field(raw, "actionType"),
            status: str_field(raw, "status"),
            error: opt_str_field(raw, "error"),
        }
    }
}

/// One execution of a test scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub project_id: String,
    pub environment: String,
    pub run_type: String,
    pub status: RunStatus,
    /// ISO-8601 as received from the backend; kept verbatim so string
    /// comparison stays a valid recency order.
    pub started_at: Option<String>,
    /// Absent while the run is non-terminal.
    pub finished_at: Option<String>,
    pub error: Option<String>,
    pub pass_count: u64,
    pub fail_count: u64,
    pub pending_count: u64,
    pub action_results: Vec<ActionResult>,
    /// Title of the scenario the run executed, when the backend embeds it.
    pub scenario_title: String,
    pub actual_result: Option<String>,
}

impl RunRecord {
    /// Total mapper: missing fields get defaults, never an error.
    pub fn from_value(raw: &Value) -> Self {
        let scenario_title = raw
            .get("scenario")
            .and_then(|scenario| scenario.get("title"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            run_id: str_field(raw, "runId"),
            project_id: str_field(raw, "projectId"),
            environment: str_field(raw, "environment"),
            run_type: str_field(raw, "runType"),
            status: RunStatus::parse(&str_field(raw, "status")),
            started_at: opt_str_field(raw, "startedAt"),
            finished_at: opt_str_field(raw, "finishedAt"),
            error: opt_str_field(raw, "error"),
            pass_count: count_field(raw, "passCount"),
            fail_count: count_field(raw, "failCount"),
            pending_count: count_field(raw, "pendingCount"),
            action_results: raw
                .get("actionResults")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(ActionResult::from_value).collect())
                .unwrap_or_default(),
            scenario_title,
            actual_result: opt_str_field(raw, "actualResult"),
        }
    }

    /// Wall-clock duration in whole seconds, rounded, never negative.
    /// `None` unless both timestamps are present and parse.
    pub fn duration_seconds(&self) -> Option<u64> {
        let started = parse_timestamp(self.started_at.as_deref()?)?;
        let finished = parse_timestamp(self.finished_at.as_deref()?)?;
        let millis = u64::try_from((finished - started).num_milliseconds()).unwrap_or(0);
        Some((millis + 500) / 1000)
    }
}

/// Map the `/api/runs` payload (an object of `runId → run`) into records,
/// newest first by `started_at`. Entries that omit `runId` in the body
/// inherit it from their map key. Non-object input maps to an empty list.
pub fn map_runs(raw: &Value) -> Vec<RunRecord> {
    let Some(entries) = raw.as_object() else {
        return Vec::new();
    };

    let mut runs: Vec<RunRecord> = entries
        .iter()
        .map(|(run_id, value)| {
            let mut run = RunRecord::from_value(value);
            if run.run_id.is_empty() {
                run.run_id = run_id.clone();
            }
            run
        })
        .collect();
    sort_runs_newest_first(&mut runs);
    runs
}

/// Dashboard order: greatest `started_at` string first, missing timestamps
/// last. Stable, so same-instant runs keep their relative order.
pub fn sort_runs_newest_first(runs: &mut [RunRecord]) {
    runs.sort_by(|a, b| {
        let key_a = a.started_at.as_deref().unwrap_or("");
        let key_b = b.started_at.as_deref().unwrap_or("");
        key_b.cmp(key_a)
    });
}

/// Persisted artifact bundle for a finished run. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub run_id: String,
    pub created_at: Option<String>,
    pub has_json: bool,
    pub has_pdf: bool,
    pub has_screenshot: bool,
}

impl ReportRecord {
    /// Flags derive from the index entry's `json`/`pdf`/`screenshot` fields
    /// being non-null (path string or `true`).
    pub fn from_value(raw: &Value) -> Self {
        Self {
            run_id: str_field(raw, "runId"),
            created_at: opt_str_field(raw, "createdAt"),
            has_json: flag_field(raw, "json"),
            has_pdf: flag_field(raw, "pdf"),
            has_screenshot: flag_field(raw, "screenshot"),
        }
    }
}

/// Map the `/api/reports` payload (`{reports: [...]}`), newest first by
/// `created_at`. Missing or non-array `reports` maps to an empty list.
pub fn map_reports(raw: &Value) -> Vec<ReportRecord> {
    let mut reports: Vec<ReportRecord> = raw
        .get("reports")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(ReportRecord::from_value).collect())
        .unwrap_or_default();
    reports.sort_by(|a, b| {
        let key_a = a.created_at.as_deref().unwrap_or("");
        let key_b = b.created_at.as_deref().unwrap_or("");
        key_b.cmp(key_a)
    });
    reports
}

/// Classification of an analysis finding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingCategory {
    Gap,
    Ambiguity,
    Edge,
    #[default]
    Unknown,
}

impl FindingCategory {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gap" => Self::Gap,
            "ambiguity" => Self::Ambiguity,
            "edge" => Self::Edge,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for FindingCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            Self::Gap => "gap",
            Self::Ambiguity => "ambiguity",
            Self::Edge => "edge",
            Self::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// Single issue raised by the requirement analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub category: FindingCategory,
    /// Severity vocabulary is the backend's (`Low`/`Medium`/`High`), kept
    /// verbatim.
    pub severity: String,
    pub title: String,
    pub detail: String,
}

impl Finding {
    pub fn from_value(raw: &Value) -> Self {
        Self {
            category: FindingCategory::parse(&str_field(raw, "category")),
            severity: str_field(raw, "severity"),
            title: str_field(raw, "title"),
            detail: str_field(raw, "detail"),
        }
    }
}

/// Aggregate quality scores from the analysis summary cards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityScores {
    pub readiness_score: u64,
    pub requirement_coverage_pct: u64,
    pub files_impacted: u64,
    pub open_clarifications: u64,
}

impl QualityScores {
    pub fn from_value(raw: &Value) -> Self {
        Self {
            readiness_score: count_field(raw, "readinessScore"),
            requirement_coverage_pct: count_field(raw, "requirementCoveragePct"),
            files_impacted: count_field(raw, "filesImpacted"),
            open_clarifications: count_field(raw, "openClarifications"),
        }
    }
}

/// Planned coverage split across scenario kinds, in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageBreakdown {
    pub happy: f64,
    pub negative: f64,
    pub edge: f64,
    pub non_functional: f64,
}

impl CoverageBreakdown {
    pub fn from_value(raw: &Value) -> Self {
        Self {
            happy: float_field(raw, "happy"),
            negative: float_field(raw, "negative"),
            edge: float_field(raw, "edge"),
            non_functional: float_field(raw, "nonFunctional"),
        }
    }
}

/// Module the analysis flagged as risky.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskHotspot {
    pub module: String,
    pub risk: String,
    pub owner: String,
    pub reason: String,
}

impl RiskHotspot {
    pub fn from_value(raw: &Value) -> Self {
        Self {
            module: str_field(raw, "module"),
            risk: str_field(raw, "risk"),
            owner: str_field(raw, "owner"),
            reason: str_field(raw, "reason"),
        }
    }
}

/// Latest AI-analysis result. Replaced wholesale on each fetch, never
/// merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisSnapshot {
    pub project_id: String,
    pub application_url: String,
    pub target_type: String,
    /// Proposed test scenario awaiting approval. Kept as raw JSON so that
    /// approving it round-trips fields this client does not model.
    pub scenario: Option<Value>,
    pub findings: Vec<Finding>,
    pub quality: QualityScores,
    pub coverage: CoverageBreakdown,
    pub risk_hotspots: Vec<RiskHotspot>,
}

impl AnalysisSnapshot {
    pub fn from_value(raw: &Value) -> Self {
        Self {
            project_id: str_field(raw, "projectId"),
            application_url: str_field(raw, "applicationUrl"),
            target_type: str_field(raw, "targetType"),
            scenario: match raw.get("scenario") {
                None | Some(Value::Null) => None,
                Some(scenario) => Some(scenario.clone()),
            },
            findings: raw
                .get("findings")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(Finding::from_value).collect())
                .unwrap_or_default(),
            quality: QualityScores::from_value(raw.get("quality").unwrap_or(&Value::Null)),
            coverage: CoverageBreakdown::from_value(raw.get("coverage").unwrap_or(&Value::Null)),
            risk_hotspots: raw
                .get("riskHotspots")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(RiskHotspot::from_value).collect())
                .unwrap_or_default(),
        }
    }

    /// Title of the proposed scenario, when one is present and titled.
    pub fn scenario_title(&self) -> Option<&str> {
        self.scenario
            .as_ref()
            .and_then(|scenario| scenario.get("title"))
            .and_then(Value::as_str)
            .filter(|title| !title.is_empty())
    }
}

fn str_field(value: &Value, key: &str) -> String {
    value
        .get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Optional string: absent, null, and empty all normalize to `None`.
fn opt_str_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}

/// Non-negative count: absent and non-numeric default to 0; fractional
/// values round.
fn count_field(value: &Value, key: &str) -> u64 {
    let Some(number) = value.get(key) else {
        return 0;
    };
    number
        .as_u64()
        .or_else(|| number.as_f64().map(|f| f.max(0.0).round() as u64))
        .unwrap_or(0)
}

fn float_field(value: &Value, key: &str) -> f64 {
    value.get(key).and_then(Value::as_f64).unwrap_or(0.0)
}

/// Artifact-presence flag: a path string counts as set, `null`/absent/empty
/// do not.
fn flag_field(value: &Value, key: &str) -> bool {
    match value.get(key) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::String(path)) => !path.is_empty(),
        None | Some(Value::Null) => false,
        Some(_) => true,
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    // The backend emits Python datetime.isoformat(): naive, no offset.
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
