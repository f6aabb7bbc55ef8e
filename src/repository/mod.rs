//! Persistence accessors for prescriptions and training runs.
//!
//! Handlers depend on the traits; bootstrap picks the implementation. The
//! bundled implementation keeps everything in process memory.

mod error;
mod in_memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::{NewPrescription, NewTrainingMetadata, Prescription, TrainingMetadata};

pub use error::RepositoryError;
pub use in_memory::{InMemoryPrescriptionRepository, InMemoryTrainingMetadataRepository};

#[async_trait]
pub trait PrescriptionRepository: Send + Sync {
    /// Persist a new prescription, returning it with generated fields filled in.
    async fn create(&self, new: NewPrescription) -> Result<Prescription, RepositoryError>;

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Prescription>, RepositoryError>;

    /// All prescriptions for a patient, newest first.
    async fn get_by_patient_id(&self, patient_id: Uuid)
        -> Result<Vec<Prescription>, RepositoryError>;

    /// Every prescription, newest first.
    async fn get_all(&self) -> Result<Vec<Prescription>, RepositoryError>;

    /// Replace a stored prescription, bumping its version.
    async fn update(&self, prescription: Prescription) -> Result<Prescription, RepositoryError>;
}

#[async_trait]
pub trait TrainingMetadataRepository: Send + Sync {
    async fn create(&self, new: NewTrainingMetadata) -> Result<TrainingMetadata, RepositoryError>;

    /// The most recent run by `trained_at`.
    async fn latest(&self) -> Result<Option<TrainingMetadata>, RepositoryError>;
}
