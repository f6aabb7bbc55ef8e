use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RepositoryError {
    #[error("repository lock poisoned during {0}")]
    LockPoisoned(&'static str),

    #[error("prescription {0} not found")]
    NotFound(Uuid),

    #[error("storage error: {0}")]
    Storage(String),
}
