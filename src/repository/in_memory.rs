use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::error::RepositoryError;
use super::{PrescriptionRepository, TrainingMetadataRepository};
use crate::domain::{NewPrescription, NewTrainingMetadata, Prescription, TrainingMetadata};

/// Prescriptions held in insertion order. Clone-friendly via Arc.
#[derive(Clone, Default)]
pub struct InMemoryPrescriptionRepository {
    storage: Arc<RwLock<Vec<Prescription>>>,
}

impl InMemoryPrescriptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first<F>(&self, predicate: F) -> Result<Vec<Prescription>, RepositoryError>
    where
        F: Fn(&Prescription) -> bool,
    {
        let storage = self
            .storage
            .read()
            .map_err(|_| RepositoryError::LockPoisoned("read"))?;

        // Reverse first so equal timestamps keep the later insert on top.
        let mut found: Vec<Prescription> =
            storage.iter().rev().filter(|p| predicate(p)).cloned().collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(found)
    }
}

#[async_trait]
impl PrescriptionRepository for InMemoryPrescriptionRepository {
    async fn create(&self, new: NewPrescription) -> Result<Prescription, RepositoryError> {
        let prescription = Prescription::create(new, Utc::now());
        let mut storage = self
            .storage
            .write()
            .map_err(|_| RepositoryError::LockPoisoned("write"))?;
        storage.push(prescription.clone());
        Ok(prescription)
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<Prescription>, RepositoryError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| RepositoryError::LockPoisoned("read"))?;
        Ok(storage.iter().find(|p| p.id == id).cloned())
    }

    async fn get_by_patient_id(
        &self,
        patient_id: Uuid,
    ) -> Result<Vec<Prescription>, RepositoryError> {
        self.newest_first(|p| p.patient_id == patient_id)
    }

    async fn get_all(&self) -> Result<Vec<Prescription>, RepositoryError> {
        self.newest_first(|_| true)
    }

    async fn update(&self, mut prescription: Prescription) -> Result<Prescription, RepositoryError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| RepositoryError::LockPoisoned("write"))?;
        let slot = storage
            .iter_mut()
            .find(|p| p.id == prescription.id)
            .ok_or(RepositoryError::NotFound(prescription.id))?;

        prescription.created_at = slot.created_at;
        prescription.version = slot.version;
        prescription.touch(Utc::now());
        *slot = prescription.clone();
        Ok(prescription)
    }
}

/// Append-only training run log.
#[derive(Clone, Default)]
pub struct InMemoryTrainingMetadataRepository {
    runs: Arc<RwLock<Vec<TrainingMetadata>>>,
}

impl InMemoryTrainingMetadataRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.runs.read().map(|runs| runs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl TrainingMetadataRepository for InMemoryTrainingMetadataRepository {
    async fn create(&self, new: NewTrainingMetadata) -> Result<TrainingMetadata, RepositoryError> {
        let run = TrainingMetadata::create(new);
        let mut runs = self
            .runs
            .write()
            .map_err(|_| RepositoryError::LockPoisoned("write"))?;
        runs.push(run.clone());
        Ok(run)
    }

    async fn latest(&self) -> Result<Option<TrainingMetadata>, RepositoryError> {
        let runs = self
            .runs
            .read()
            .map_err(|_| RepositoryError::LockPoisoned("read"))?;
        // max_by_key keeps the last maximum, so ties go to the later append.
        Ok(runs.iter().max_by_key(|run| run.trained_at).cloned())
    }
}
