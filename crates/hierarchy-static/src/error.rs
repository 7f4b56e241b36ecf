use std::path::PathBuf;

use hierarchy_model::ResolveError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum StaticError {
    #[error("Objects directory not found: {}", .0.display())]
    MissingRoot(PathBuf),

    #[error("Path escapes the objects directory: {0}")]
    PathEscape(String),

    #[error("Cannot read {}: {message}", .path.display())]
    Unreadable { path: PathBuf, message: String },

    #[error("Object {id} in {} is already defined in the same directory", .file.display())]
    DuplicateId { id: String, file: PathBuf },
}

impl From<StaticError> for ResolveError {
    fn from(err: StaticError) -> Self {
        match err {
            StaticError::PathEscape(id) => ResolveError::invalid_path(id),
            other => ResolveError::backend_from("static objects", other),
        }
    }
}

#[cfg(test)]
mod tests {
    use hierarchy_model::ResolveError;

    use super::StaticError;

    #[test]
    fn path_escape_maps_to_invalid_path() {
        let mapped = ResolveError::from(StaticError::PathEscape("/../etc".to_string()));
        assert_eq!(mapped, ResolveError::invalid_path("/../etc"));
    }

    #[test]
    fn unreadable_maps_to_backend_failure() {
        let mapped = ResolveError::from(StaticError::Unreadable {
            path: "/srv/Objects".into(),
            message: "permission denied".to_string(),
        });
        assert!(!mapped.is_not_found());
        assert!(mapped.to_string().contains("permission denied"));
    }
}
