use thiserror::Error;

use super::validation::NameError;

/// Failure of a project operation. Every operation returns exactly one of
/// these or a value; none leaves a partial mutation behind.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("internal error: {0}")]
    Internal(&'static str),
}

impl From<NameError> for ProjectError {
    fn from(e: NameError) -> Self {
        Self::InvalidArgument(e.to_string())
    }
}

pub type ProjectResult<T> = std::result::Result<T, ProjectError>;

/// Logs a store failure and hides its detail behind a generic internal error.
pub trait ProjectStoreExt<T> {
    fn or_internal(self, operation: &'static str) -> ProjectResult<T>;
}

impl<T> ProjectStoreExt<T> for crate::error::Result<T> {
    fn or_internal(self, operation: &'static str) -> ProjectResult<T> {
        self.map_err(|e| {
            tracing::error!("{operation}: {e}");
            ProjectError::Internal(operation)
        })
    }
}
