//! Shared fixtures: recording/failing test doubles and builders.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use prescriptions::bus::{BusError, EventPublisher};
use prescriptions::domain::{NewPrescription, Prescription};
use prescriptions::llm::{LlmError, SuggestedMedication, Suggestion, SuggestionClient};
use prescriptions::repository::{PrescriptionRepository, RepositoryError};
use prescriptions::{Context, EventEnvelope, Mediator, Settings};
use serde_json::Map;
use uuid::Uuid;

/// Publisher that records every event and can be told to fail.
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, EventEnvelope)>>,
    fail: AtomicBool,
}

impl RecordingPublisher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let publisher = Self::default();
        publisher.fail.store(true, Ordering::SeqCst);
        Arc::new(publisher)
    }

    pub fn events(&self) -> Vec<(String, EventEnvelope)> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, event: &EventEnvelope) -> Result<(), BusError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BusError::SendFailed("broker rejected the message".into()));
        }
        self.events
            .lock()
            .unwrap()
            .push((topic.to_string(), event.clone()));
        Ok(())
    }
}

/// LLM double returning a fixed suggestion, or failing when there is none.
pub struct StubLlm {
    suggestion: Option<Suggestion>,
}

impl StubLlm {
    pub fn answering(diagnosis: &str, confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            suggestion: Some(Suggestion {
                diagnosis: diagnosis.into(),
                medications: vec![SuggestedMedication {
                    name: "Paracetamol".into(),
                    dosage: "500mg".into(),
                    frequency: "every 6 hours".into(),
                    duration: "3 days".into(),
                }],
                notes: "Rest and fluids".into(),
                confidence,
            }),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { suggestion: None })
    }
}

#[async_trait]
impl SuggestionClient for StubLlm {
    async fn suggest(
        &self,
        _symptoms: &[String],
        _patient_history: Option<&str>,
    ) -> Result<Suggestion, LlmError> {
        self.suggestion.clone().ok_or(LlmError::EmptyResponse)
    }
}

/// Repository whose every operation fails.
pub struct BrokenRepository;

#[async_trait]
impl PrescriptionRepository for BrokenRepository {
    async fn create(&self, _new: NewPrescription) -> Result<Prescription, RepositoryError> {
        Err(RepositoryError::Storage("connection refused".into()))
    }

    async fn get_by_id(&self, _id: Uuid) -> Result<Option<Prescription>, RepositoryError> {
        Err(RepositoryError::Storage("connection refused".into()))
    }

    async fn get_by_patient_id(
        &self,
        _patient_id: Uuid,
    ) -> Result<Vec<Prescription>, RepositoryError> {
        Err(RepositoryError::Storage("connection refused".into()))
    }

    async fn get_all(&self) -> Result<Vec<Prescription>, RepositoryError> {
        Err(RepositoryError::Storage("connection refused".into()))
    }

    async fn update(&self, _p: Prescription) -> Result<Prescription, RepositoryError> {
        Err(RepositoryError::Storage("connection refused".into()))
    }
}

/// Settings pointing model storage at `model_dir`, with an LLM key set.
pub fn settings(model_dir: &std::path::Path) -> Settings {
    Settings {
        model_storage_path: model_dir.to_string_lossy().into_owned(),
        openai_api_key: "test-key".into(),
        ..Settings::default()
    }
}

pub fn mediator(settings: Settings, publisher: Arc<RecordingPublisher>) -> Mediator {
    Mediator::new(Context::new(Arc::new(settings), publisher))
}

pub fn new_prescription(patient_id: Uuid, diagnosis: &str, symptoms: &[&str]) -> NewPrescription {
    NewPrescription {
        appointment_id: Uuid::new_v4(),
        patient_id,
        doctor_id: Uuid::new_v4(),
        symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
        diagnosis: diagnosis.into(),
        medications: vec!["Paracetamol".into()],
        dosage: Map::new(),
        notes: None,
    }
}

/// Poll `condition` until it holds, failing after two seconds.
pub async fn wait_for(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}
