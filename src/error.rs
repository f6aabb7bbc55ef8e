//! Request-boundary error for command and query handlers.

use thiserror::Error;

use crate::bus::BusError;
use crate::domain::ValidationError;
use crate::ml::TrainingError;
use crate::repository::RepositoryError;

#[derive(Debug, Error)]
pub enum ServiceError {
    /// Input rejected before any handler ran.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// The record was persisted but its event could not be published.
    #[error("event publish failed: {0}")]
    Publish(#[from] BusError),

    #[error("training failed: {0}")]
    Training(#[from] TrainingError),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        ServiceError::Validation(err.to_string())
    }
}

impl ServiceError {
    /// Map this error to an HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            ServiceError::Validation(_) => 422,
            ServiceError::NotFound(_) => 404,
            ServiceError::Repository(_) => 500,
            ServiceError::Publish(_) => 500,
            ServiceError::Training(_) => 500,
        }
    }

    /// Whether the detail may be shown to the caller.
    pub fn is_client_error(&self) -> bool {
        self.status_code() < 500
    }
}
