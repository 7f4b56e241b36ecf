use hierarchy_browser::{ClientError, InventoryError, PartExecutionError};
use hierarchy_fs::FsError;
use hierarchy_model::HierarchyError;
use hierarchy_provider::StartupError;
use hierarchy_static::StaticError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Cannot start the async runtime: {0}")]
    Runtime(#[source] std::io::Error),

    #[error("Invalid class hierarchy in settings: {0}")]
    Classes(#[from] HierarchyError),

    #[error(transparent)]
    Startup(#[from] StartupError),

    #[error("Static objects: {0}")]
    Static(#[from] StaticError),

    #[error("Filesystem backend: {0}")]
    Fs(#[from] FsError),

    #[error("Cannot open browser session: {0}")]
    Session(#[from] InventoryError),

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("Part failed: {0}")]
    Part(#[from] PartExecutionError),

    #[error("No object with id {id}")]
    ObjectNotFound { id: String },

    #[error("{operation} failed: {details}")]
    OperationFailed {
        operation: &'static str,
        details: String,
    },
}

impl AppError {
    pub fn object_not_found(id: impl Into<String>) -> Self {
        Self::ObjectNotFound { id: id.into() }
    }

    pub fn operation_failed(operation: &'static str, details: impl ToString) -> Self {
        Self::OperationFailed {
            operation,
            details: details.to_string(),
        }
    }
}
