use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One training run, appended after every successful fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub id: Uuid,
    pub model_version: String,
    pub trained_at: DateTime<Utc>,
    pub accuracy_score: Option<f64>,
    pub dataset_size: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTrainingMetadata {
    pub model_version: String,
    pub trained_at: DateTime<Utc>,
    pub accuracy_score: Option<f64>,
    pub dataset_size: usize,
}

impl TrainingMetadata {
    pub fn create(new: NewTrainingMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            model_version: new.model_version,
            trained_at: new.trained_at,
            accuracy_score: new.accuracy_score,
            dataset_size: new.dataset_size,
        }
    }
}
