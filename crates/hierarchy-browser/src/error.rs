use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Connection error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider closed the connection")]
    Closed,

    #[error("Invalid response: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with `{"error": ...}`.
    #[error("{0}")]
    Provider(String),

    #[error("Unexpected response to {method}: missing {field}")]
    UnexpectedResponse {
        method: &'static str,
        field: &'static str,
    },
}

impl ClientError {
    #[must_use]
    pub fn is_provider_error(&self) -> bool {
        matches!(self, Self::Provider(_))
    }
}

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Part {unique_id} has an empty script")]
    EmptyScript { unique_id: String },

    #[error("Failed to write {}: {source}", .path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to encode part manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PartExecutionError {
    #[error("Unknown part: {0}")]
    UnknownPart(String),

    #[error("Script engine error: {0}")]
    Engine(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Script exceeded its {}s time limit", .0.as_secs())]
    Timeout(Duration),

    #[error("Script exceeded its memory limit")]
    MemoryLimit,
}
