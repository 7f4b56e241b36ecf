use std::path::PathBuf;

use hierarchy_model::ResolveError;
use serde_json::{Value, json};
use thiserror::Error;

/// Request-level failures. Every variant is answered with
/// `{"error": "<message>"}` and leaves the connection usable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Malformed(String),

    #[error("{0}")]
    BackendFailure(String),
}

impl ProtocolError {
    pub fn missing(param: &str) -> Self {
        Self::Malformed(format!("Missing {param}"))
    }

    /// Classify a resolver error, prefixing backend failures with `context`.
    #[must_use]
    pub fn resolve(context: &str, err: &ResolveError) -> Self {
        if err.is_not_found() {
            Self::NotFound(err.to_string())
        } else {
            Self::BackendFailure(format!("{context}: {err}"))
        }
    }

    #[must_use]
    pub fn to_response(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// Conditions that abort provider startup.
#[derive(Error, Debug)]
pub enum StartupError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read parts directory {}: {source}", .path.display())]
    PartsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid part descriptor {}: {reason}", .path.display())]
    InvalidPart { path: PathBuf, reason: String },

    #[error(
        "duplicate part id {unique_id} in {} and {}",
        .first.display(),
        .second.display()
    )]
    DuplicatePart {
        unique_id: String,
        first: PathBuf,
        second: PathBuf,
    },
}

impl StartupError {
    pub(crate) fn invalid_part(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPart {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
