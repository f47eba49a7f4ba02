//! Typed client for the AutoQA backend.
//!
//! Replaces the product's scattered per-page fetch-and-poll loops with one
//! synchronization facade:
//!
//! - [`transport`]: JSON request helper with a tagged error taxonomy
//!   (network / HTTP / decode), never panics on a bad body.
//! - [`model`]: total mappers from the backend's duck-typed JSON into
//!   normalized entities.
//! - [`sync`]: the cache. Coalesced refreshes, issuance-order application,
//!   stale-while-revalidate, subscriptions, and the shared polling timer.
//! - [`actions`]: start-run / approve / analyze, folding confirmed results
//!   into the cache without waiting for the next poll.
//! - [`metrics`]: pure projections (pass rate, latest run, coverage) over
//!   the current snapshot.
//!
//! Entry point is [`QaClient`]:
//!
//! ```no_run
//! use autoqa_client::{ClientConfig, QaClient, ResourceKey};
//!
//! # async fn demo() -> Result<(), autoqa_client::TransportError> {
//! let client = QaClient::new(ClientConfig::default())?;
//! let snapshot = client.engine().refresh(ResourceKey::Runs).await;
//! if let Some(runs) = snapshot.runs() {
//!     println!("pass rate: {}%", autoqa_client::metrics::pass_rate(runs));
//! }
//! # Ok(())
//! # }
//! ```

pub mod actions;
pub mod artifacts;
pub mod client;
pub mod config;
pub mod error;
pub mod metrics;
pub mod model;
pub mod sync;
pub mod transport;

pub use actions::{ActionDispatcher, AnalyzeRequest, RunOptions, StartedRun};
pub use artifacts::{ArtifactLinks, json_report_url, pdf_report_url, screenshot_url};
pub use client::QaClient;
pub use config::{ClientConfig, ConfigError, ConfigLoader};
pub use error::{ActionError, TransportError, TransportResult};
pub use model::{
    AnalysisSnapshot, Finding, FindingCategory, ReportRecord, RunRecord, RunStatus,
};
pub use sync::{
    HttpFetcher, PollerHandle, ResourceData, ResourceFetcher, ResourceKey, Snapshot, SyncEngine,
};
pub use transport::Transport;
