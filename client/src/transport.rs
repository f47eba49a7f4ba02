//! HTTP transport for the QA backend.
//!
//! Every request flows through [`Transport::execute`], which classifies the
//! outcome into the three-way [`TransportError`] taxonomy:
//!
//! - connection failures and timeouts become [`TransportError::Network`]
//! - non-2xx statuses become [`TransportError::Http`] with the backend's
//!   `detail`/`message` text extracted when the body is JSON
//! - 2xx bodies that fail to parse as JSON become [`TransportError::Decode`]
//!   with the raw body preserved for diagnosis

use std::time::Duration;

use reqwest::multipart::Form;
use serde_json::Value;

use crate::error::{TransportError, TransportResult};

/// JSON-over-HTTP client bound to a single backend base URL.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
}

impl Transport {
    /// Build a transport with the given base URL and per-request timeout.
    ///
    /// The base URL is stored without a trailing slash so paths can be
    /// appended verbatim (`/api/runs`, `/files/reports/{id}.json`).
    pub fn new(base_url: &str, request_timeout: Duration) -> TransportResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| TransportError::Network {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Backend base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for a backend path (path must start with `/`).
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET `path` and decode the body as JSON.
    pub async fn get(&self, path: &str) -> TransportResult<Value> {
        let url = self.url_for(path);
        tracing::debug!("GET {url}");
        self.execute(self.http.get(&url)).await
    }

    /// POST `body` as JSON to `path` and decode the response body as JSON.
    pub async fn post(&self, path: &str, body: &Value) -> TransportResult<Value> {
        let url = self.url_for(path);
        tracing::debug!("POST {url}");
        self.execute(self.http.post(&url).json(body)).await
    }

    /// POST a multipart form to `path` and decode the response body as JSON.
    pub async fn post_multipart(&self, path: &str, form: Form) -> TransportResult<Value> {
        let url = self.url_for(path);
        tracing::debug!("POST (multipart) {url}");
        self.execute(self.http.post(&url).multipart(form)).await
    }

    /// Send the request and classify the outcome.
    async fn execute(&self, request: reqwest::RequestBuilder) -> TransportResult<Value> {
        let response = request
            .send()
            .await
            .map_err(|e| TransportError::network(&e))?;

        let status = response.status();
        let raw = response
            .text()
            .await
            .map_err(|e| TransportError::network(&e))?;

        if !status.is_success() {
            return Err(TransportError::Http {
                status: status.as_u16(),
                message: error_message(&raw, status.as_u16()),
                raw,
            });
        }

        serde_json::from_str(&raw).map_err(|_| TransportError::Decode { raw })
    }
}

/// Best-effort extraction of a human-readable message from an error body.
///
/// FastAPI reports validation and HTTP errors under `detail`; the app's own
/// error envelopes use `message`. Anything else falls back to a generic
/// status line.
fn error_message(raw: &str, status: u16) -> String {
    if let Ok(body) = serde_json::from_str::<Value>(raw) {
        for key in ["detail", "message"] {
            if let Some(text) = body.get(key).and_then(Value::as_str)
                && !text.is_empty()
            {
                return text.to_string();
            }
        }
    }
    format!("request failed with status {status}")
}
