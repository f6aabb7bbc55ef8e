//! Model training through the mediator.

use std::sync::Arc;

use prescriptions::config::MODEL_FILE_NAME;
use prescriptions::handlers::{CreatePrescription, TrainModel};
use prescriptions::ml::{self, ModelBundle, TrainingSample};
use prescriptions::repository::{InMemoryTrainingMetadataRepository, TrainingMetadataRepository};
use prescriptions::{Context, Mediator};
use uuid::Uuid;

use crate::support::{new_prescription, settings, RecordingPublisher};

fn mediator_with_runs(dir: &std::path::Path) -> (Mediator, Arc<InMemoryTrainingMetadataRepository>) {
    let runs = Arc::new(InMemoryTrainingMetadataRepository::new());
    let ctx = Context::new(Arc::new(settings(dir)), RecordingPublisher::new())
        .with_training_runs(runs.clone());
    (Mediator::new(ctx), runs)
}

/// Store one prescription per `(diagnosis, space-separated symptoms)`.
async fn seed(mediator: &Mediator, records: &[(&str, &str)]) {
    for (diagnosis, symptoms) in records {
        let symptoms: Vec<&str> = symptoms.split_whitespace().collect();
        mediator
            .send(CreatePrescription {
                prescription: new_prescription(Uuid::new_v4(), diagnosis, &symptoms),
                correlation_id: None,
            })
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn no_data_reports_empty_model() {
    let dir = tempfile::tempdir().unwrap();
    let (mediator, runs) = mediator_with_runs(dir.path());

    let response = mediator.send(TrainModel::default()).await.unwrap();
    assert_eq!(response.model_version, "0.0.0");
    assert_eq!(response.accuracy_score, 0.0);
    assert_eq!(response.dataset_size, 0);
    assert_eq!(response.message, "No training data available");

    assert!(!dir.path().join(MODEL_FILE_NAME).exists());
    assert!(runs.is_empty());
}

#[tokio::test]
async fn single_label_trains_on_everything() {
    let dir = tempfile::tempdir().unwrap();
    let (mediator, runs) = mediator_with_runs(dir.path());
    seed(
        &mediator,
        &[
            ("Influenza", "fever cough"),
            ("Influenza", "fever aches"),
            ("Influenza", "chills"),
        ],
    )
    .await;

    let response = mediator
        .send(TrainModel {
            force_retrain: true,
        })
        .await
        .unwrap();
    assert_eq!(response.accuracy_score, 1.0);
    assert_eq!(response.dataset_size, 3);
    assert_eq!(response.model_version, "1.3.0");
    assert_eq!(response.message, "Model trained successfully on 3 records");

    let artifact = dir.path().join(MODEL_FILE_NAME);
    let bundle = ModelBundle::load(&artifact).unwrap();
    assert_eq!(bundle.predict("fever"), Some("Influenza"));

    let latest = runs.latest().await.unwrap().unwrap();
    assert_eq!(latest.model_version, "1.3.0");
    assert_eq!(latest.accuracy_score, Some(1.0));
    assert_eq!(latest.dataset_size, 3);
}

#[tokio::test]
async fn multiple_labels_score_on_held_out_records() {
    let dir = tempfile::tempdir().unwrap();
    let (mediator, runs) = mediator_with_runs(dir.path());
    let mut records = Vec::new();
    for _ in 0..5 {
        records.push(("Influenza", "fever cough chills"));
        records.push(("Allergic rhinitis", "sneezing itchy eyes"));
    }
    seed(&mediator, &records).await;

    let response = mediator.send(TrainModel::default()).await.unwrap();
    assert_eq!(response.dataset_size, 10);
    assert_eq!(response.model_version, "1.10.0");

    // One record is held out at N = 10, so accuracy is either 0 or 1.
    assert_eq!(ml::test_count(10), 1);
    assert!(response.accuracy_score == 0.0 || response.accuracy_score == 1.0);
    assert!(dir.path().join(MODEL_FILE_NAME).exists());
    assert_eq!(runs.len(), 1);
}

#[tokio::test]
async fn retraining_overwrites_the_artifact_and_appends_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let (mediator, runs) = mediator_with_runs(dir.path());
    seed(&mediator, &[("Cold", "sneezing")]).await;
    mediator.send(TrainModel::default()).await.unwrap();

    seed(&mediator, &[("Cold", "runny nose")]).await;
    let response = mediator.send(TrainModel::default()).await.unwrap();

    assert_eq!(response.model_version, "1.2.0");
    assert_eq!(runs.len(), 2);
    assert_eq!(runs.latest().await.unwrap().unwrap().dataset_size, 2);
}

#[test]
fn held_out_size_follows_the_fraction() {
    for n in [5usize, 7, 10, 12, 20, 33] {
        let fraction = ml::test_fraction(n);
        assert!((0.1..=0.2).contains(&fraction));

        let samples: Vec<TrainingSample> = (0..n)
            .map(|i| TrainingSample {
                symptom_text: if i % 2 == 0 { "fever cough" } else { "itchy rash" }.into(),
                diagnosis: if i % 2 == 0 { "Flu" } else { "Dermatitis" }.into(),
            })
            .collect();
        let report = ml::train(&samples).unwrap();
        assert_eq!(report.held_out, (fraction * n as f64 - 1e-9).ceil() as usize);
        assert_eq!(report.dataset_size, n);
    }
}
