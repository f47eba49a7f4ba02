//! Backend actions with cache folding.
//!
//! Actions are single-shot: exactly one network call, no retries. A
//! successful action folds its confirmed result into the sync engine
//! immediately instead of waiting for the next poll tick, so the UI reflects
//! the action without a visible lag window.
//!
//! The backend reports some domain failures as HTTP 200 with an
//! `{status: "error", message}` envelope (notably "no approved scenario"
//! from `/api/run`); those surface as [`ActionError::Rejected`].

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde_json::{Value, json};

use crate::artifacts::ArtifactLinks;
use crate::error::{ActionError, TransportError};
use crate::model::{AnalysisSnapshot, RunRecord};
use crate::sync::{ResourceKey, SyncEngine};
use crate::transport::Transport;

/// Options for `/api/run`. Defaults mirror the backend's: headless on,
/// browser closed at the end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub headless: bool,
    pub keep_browser_open: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            headless: true,
            keep_browser_open: false,
        }
    }
}

/// Confirmed result of a started run: the mapped record plus the backend's
/// artifact links.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedRun {
    pub run: RunRecord,
    pub files: ArtifactLinks,
}

/// Identity of an analysis request; `target_type` defaults to `website`
/// like the backend's.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzeRequest {
    pub project_id: String,
    pub application_url: String,
    pub target_type: String,
}

impl AnalyzeRequest {
    pub fn new(project_id: impl Into<String>, application_url: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            application_url: application_url.into(),
            target_type: "website".to_string(),
        }
    }

    pub fn with_target_type(mut self, target_type: impl Into<String>) -> Self {
        self.target_type = target_type.into();
        self
    }
}

/// Triggers backend actions and folds confirmed results into the cache.
#[derive(Clone)]
pub struct ActionDispatcher {
    transport: Transport,
    engine: SyncEngine,
}

impl ActionDispatcher {
    pub fn new(transport: Transport, engine: SyncEngine) -> Self {
        Self { transport, engine }
    }

    /// Execute the approved scenario.
    ///
    /// On success the returned run is injected into the runs cache at a
    /// fresh sequence number (so an in-flight poll cannot clobber it) and
    /// the reports cache is invalidated, because a finished run implies a
    /// new report.
    pub async fn start_run(&self, options: RunOptions) -> Result<StartedRun, ActionError> {
        let body = json!({
            "headless": options.headless,
            "keepBrowserOpen": options.keep_browser_open,
        });
        let raw = self.transport.post("/api/run", &body).await?;
        let raw = ensure_accepted(raw)?;

        let run = RunRecord::from_value(raw.get("run").unwrap_or(&Value::Null));
        let files = ArtifactLinks::from_value(raw.get("files").unwrap_or(&Value::Null));

        self.engine.inject_run(run.clone());
        self.engine.invalidate(ResourceKey::Reports);

        Ok(StartedRun { run, files })
    }

    /// Approve a scenario for execution. The scenario object is posted
    /// wholesale, preserving fields this client does not model.
    pub async fn approve_scenario(&self, scenario: &Value) -> Result<(), ActionError> {
        let body = json!({ "scenario": scenario });
        let raw = self.transport.post("/api/approve", &body).await?;
        ensure_accepted(raw)?;
        Ok(())
    }

    /// Analyze pasted requirement text. The returned snapshot replaces the
    /// latest-analysis cache immediately.
    pub async fn analyze_text(
        &self,
        request: &AnalyzeRequest,
        requirement_text: &str,
    ) -> Result<AnalysisSnapshot, ActionError> {
        let body = json!({
            "projectId": request.project_id,
            "applicationUrl": request.application_url,
            "targetType": request.target_type,
            "requirementText": requirement_text,
        });
        let raw = self.transport.post("/api/analyze", &body).await?;
        let raw = ensure_accepted(raw)?;

        let analysis = AnalysisSnapshot::from_value(&raw);
        self.engine.inject_analysis(analysis.clone());
        Ok(analysis)
    }

    /// Analyze an uploaded requirement document. Multipart fields:
    /// `projectId`, `applicationUrl`, `targetType`, `file`.
    pub async fn analyze_upload(
        &self,
        request: &AnalyzeRequest,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<AnalysisSnapshot, ActionError> {
        let form = upload_form(request, file_name, bytes)?;
        let raw = self.transport.post_multipart("/api/analyze/upload", form).await?;
        let raw = ensure_accepted(raw)?;

        let analysis = AnalysisSnapshot::from_value(&raw);
        self.engine.inject_analysis(analysis.clone());
        Ok(analysis)
    }
}

fn upload_form(
    request: &AnalyzeRequest,
    file_name: &str,
    bytes: Vec<u8>,
) -> Result<Form, TransportError> {
    let mime = mime_guess::from_path(file_name).first_or_octet_stream();
    let part = Part::bytes(bytes)
        .file_name(file_name.to_string())
        .mime_str(mime.essence_str())
        .map_err(|e| TransportError::Network {
            message: format!("failed to build upload form: {e}"),
        })?;

    Ok(Form::new()
        .text("projectId", request.project_id.clone())
        .text("applicationUrl", request.application_url.clone())
        .text("targetType", request.target_type.clone())
        .part("file", part))
}

/// Reject 200-status bodies carrying the backend's error envelope.
fn ensure_accepted(raw: Value) -> Result<Value, ActionError> {
    let status = raw.get("status").and_then(Value::as_str).unwrap_or_default();
    if status == "error" {
        let message = raw
            .get("message")
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .unwrap_or("backend rejected the request")
            .to_string();
        return Err(ActionError::Rejected { message });
    }
    Ok(raw)
}
