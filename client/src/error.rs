//! Error taxonomy for backend interactions.
//!
//! Every async operation in this crate returns a tagged result; nothing
//! throws a bare panic at the caller. `TransportError` is cloneable so the
//! sync engine can carry the last failure inside a snapshot that travels
//! through a `watch` channel.

use thiserror::Error;

/// Errors from a single HTTP exchange with the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Host unreachable, connection refused, or request timeout.
    #[error("backend not reachable: {message}")]
    Network { message: String },

    /// Non-2xx response. `message` is best-effort extracted from the body's
    /// `detail` or `message` field; `raw` preserves the body for diagnostics.
    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        raw: String,
    },

    /// 2xx response whose body is not valid JSON. The raw text is kept
    /// verbatim for diagnostics.
    #[error("non-JSON response from backend")]
    Decode { raw: String },
}

impl TransportError {
    pub(crate) fn network(err: &reqwest::Error) -> Self {
        TransportError::Network {
            message: err.to_string(),
        }
    }

    /// HTTP status code, when the backend answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Errors from dispatched backend actions (start run, approve, analyze).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ActionError {
    /// The request itself failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The backend answered 2xx but refused the action with
    /// `{status: "error", message}` in the body.
    #[error("{message}")]
    Rejected { message: String },
}

/// Result type for transport-level operations.
pub type TransportResult<T> = Result<T, TransportError>;
