use hierarchy_model::ResolveError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum FsError {
    #[error("Root directory not found: {0}")]
    MissingRoot(String),

    #[error("Path escapes the root directory: {0}")]
    PathEscape(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for FsError {
    fn from(err: std::io::Error) -> Self {
        FsError::IoError(err.to_string())
    }
}

impl From<FsError> for ResolveError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::PathEscape(id) => ResolveError::invalid_path(id),
            other => ResolveError::backend_from("filesystem", other),
        }
    }
}
