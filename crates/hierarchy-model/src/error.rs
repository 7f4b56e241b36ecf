use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Object not found: {id}")]
    NotFound { id: String },

    #[error("Invalid object path: {id}")]
    InvalidPath { id: String },

    #[error("IO error ({kind}): {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
    },

    #[error("Backend failure in {context}: {details}")]
    Backend {
        context: &'static str,
        details: String,
    },
}

impl ResolveError {
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn invalid_path(id: impl Into<String>) -> Self {
        Self::InvalidPath { id: id.into() }
    }

    pub fn backend(context: &'static str, details: impl Into<String>) -> Self {
        Self::Backend {
            context,
            details: details.into(),
        }
    }

    pub fn backend_from<E>(context: &'static str, error: E) -> Self
    where
        E: std::fmt::Display,
    {
        Self::backend(context, error.to_string())
    }

    /// Whether the error means the addressed object does not exist, as opposed
    /// to the backend failing while looking for it.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::InvalidPath { .. })
    }
}

impl From<std::io::Error> for ResolveError {
    fn from(err: std::io::Error) -> Self {
        ResolveError::Io {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}
