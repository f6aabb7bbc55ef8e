use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::NewTrainingMetadata;
use crate::error::ServiceError;
use crate::mediator::{Handler, Mediator, Request};
use crate::ml::{self, TrainingError, TrainingSample};

/// Version reported when there was nothing to train on.
pub const EMPTY_MODEL_VERSION: &str = "0.0.0";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TrainModel {
    /// Accepted for compatibility; every request retrains.
    #[serde(default)]
    pub force_retrain: bool,
}

impl Request for TrainModel {
    type Response = TrainModelResponse;
    const NAME: &'static str = "TrainModel";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainModelResponse {
    pub model_version: String,
    pub accuracy_score: f64,
    pub dataset_size: usize,
    pub trained_at: String,
    pub message: String,
}

pub fn model_version(dataset_size: usize) -> String {
    format!("1.{dataset_size}.0")
}

#[async_trait]
impl Handler<TrainModel> for Mediator {
    async fn handle(&self, cmd: TrainModel) -> Result<TrainModelResponse, ServiceError> {
        let ctx = self.context();
        info!(force_retrain = cmd.force_retrain, "train model started");

        let prescriptions = ctx.prescriptions().get_all().await?;
        if prescriptions.is_empty() {
            warn!("no prescriptions to train on");
            return Ok(TrainModelResponse {
                model_version: EMPTY_MODEL_VERSION.into(),
                accuracy_score: 0.0,
                dataset_size: 0,
                trained_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false),
                message: "No training data available".into(),
            });
        }

        let samples: Vec<TrainingSample> = prescriptions
            .iter()
            .map(|p| TrainingSample {
                symptom_text: p.symptom_text(),
                diagnosis: p.diagnosis.clone(),
            })
            .collect();
        let path = ctx.settings().model_path();
        let report = tokio::task::spawn_blocking(move || ml::train_and_save(&samples, &path))
            .await
            .map_err(|e| TrainingError::Worker(e.to_string()))??;
        info!(path = %ctx.settings().model_path().display(), "model artifact saved");

        let trained_at = Utc::now();
        let version = model_version(report.dataset_size);
        ctx.training_runs()
            .create(NewTrainingMetadata {
                model_version: version.clone(),
                trained_at,
                accuracy_score: Some(report.accuracy),
                dataset_size: report.dataset_size,
            })
            .await?;

        info!(
            model_version = %version,
            accuracy = report.accuracy,
            dataset_size = report.dataset_size,
            held_out = report.held_out,
            "train model completed"
        );
        Ok(TrainModelResponse {
            model_version: version,
            accuracy_score: report.accuracy,
            dataset_size: report.dataset_size,
            trained_at: trained_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            message: format!("Model trained successfully on {} records", report.dataset_size),
        })
    }
}
