//! Artifact URL construction.
//!
//! Artifacts are static files served by the backend, addressed purely by
//! `run_id`: `/files/reports/{run_id}.json`, `/files/reports/{run_id}.pdf`
//! and `/files/screenshots/{run_id}.png`. URLs are always computed, never
//! stored.

use serde::Serialize;
use serde_json::Value;

use crate::model::ReportRecord;

/// `{base}/files/reports/{run_id}.json`
pub fn json_report_url(base: &str, run_id: &str) -> String {
    format!("{}/files/reports/{run_id}.json", base.trim_end_matches('/'))
}

/// `{base}/files/reports/{run_id}.pdf`
pub fn pdf_report_url(base: &str, run_id: &str) -> String {
    format!("{}/files/reports/{run_id}.pdf", base.trim_end_matches('/'))
}

/// `{base}/files/screenshots/{run_id}.png`
pub fn screenshot_url(base: &str, run_id: &str) -> String {
    format!(
        "{}/files/screenshots/{run_id}.png",
        base.trim_end_matches('/')
    )
}

/// Links to a run's artifacts; each may be absent when the artifact was not
/// produced.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactLinks {
    pub report_json_url: Option<String>,
    pub report_pdf_url: Option<String>,
    pub screenshot_url: Option<String>,
}

impl ArtifactLinks {
    /// Map the `files` object of a `/api/run` response. Total: missing or
    /// null entries become `None`.
    pub fn from_value(raw: &Value) -> Self {
        Self {
            report_json_url: link_field(raw, "reportJsonUrl"),
            report_pdf_url: link_field(raw, "reportPdfUrl"),
            screenshot_url: link_field(raw, "screenshotUrl"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.report_json_url.is_none()
            && self.report_pdf_url.is_none()
            && self.screenshot_url.is_none()
    }
}

fn link_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

impl ReportRecord {
    /// Computed artifact links: a URL is present iff the corresponding
    /// presence flag is set.
    pub fn artifact_urls(&self, base: &str) -> ArtifactLinks {
        ArtifactLinks {
            report_json_url: self
                .has_json
                .then(|| json_report_url(base, &self.run_id)),
            report_pdf_url: self.has_pdf.then(|| pdf_report_url(base, &self.run_id)),
            screenshot_url: self
                .has_screenshot
                .then(|| screenshot_url(base, &self.run_id)),
        }
    }
}
