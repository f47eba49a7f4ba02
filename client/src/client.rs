//! Top-level facade bundling config, transport, sync engine and actions.
//!
//! One [`QaClient`] per backend; construct it explicitly and share it.
//! There is deliberately no global instance.

use serde_json::Value;

use crate::actions::ActionDispatcher;
use crate::config::ClientConfig;
use crate::error::{TransportError, TransportResult};
use crate::sync::SyncEngine;
use crate::transport::Transport;

pub struct QaClient {
    config: ClientConfig,
    transport: Transport,
    engine: SyncEngine,
    actions: ActionDispatcher,
}

impl QaClient {
    pub fn new(config: ClientConfig) -> Result<Self, TransportError> {
        let transport = Transport::new(config.base(), config.request_timeout)?;
        let engine = SyncEngine::with_transport(transport.clone(), config.poll_interval);
        let actions = ActionDispatcher::new(transport.clone(), engine.clone());
        Ok(Self {
            config,
            transport,
            engine,
            actions,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn actions(&self) -> &ActionDispatcher {
        &self.actions
    }

    /// Liveness probe; returns the backend's health body.
    pub async fn health(&self) -> TransportResult<Value> {
        self.transport.get("/api/health").await
    }

    /// Currently approved scenario. The backend answers `{}` when none has
    /// been approved; that normalizes to `None`.
    pub async fn approved_scenario(&self) -> TransportResult<Option<Value>> {
        let raw = self.transport.get("/api/scenario/approved").await?;
        Ok(match &raw {
            Value::Null => None,
            Value::Object(fields) if fields.is_empty() => None,
            _ => Some(raw),
        })
    }
}
