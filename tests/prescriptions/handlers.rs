//! Command/query handler behaviour through the mediator.

use std::sync::Arc;

use prescriptions::bus::{BusPublisher, EventPublisher};
use prescriptions::handlers::{
    CreatePrescription, GetPrescriptionById, GetPrescriptionsByPatient, SuggestPrescription,
    SuggestionSource, FALLBACK_DIAGNOSIS, FALLBACK_NOTES,
};
use prescriptions::repository::{InMemoryPrescriptionRepository, PrescriptionRepository};
use prescriptions::{Context, EventEnvelope, EventKind, Mediator, ServiceError, Settings};
use serde_json::Map;
use uuid::Uuid;

use crate::support::{
    mediator, new_prescription, settings, BrokenRepository, RecordingPublisher, StubLlm,
};

#[tokio::test]
async fn create_then_get_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::new();
    let mediator = mediator(settings(dir.path()), Arc::clone(&publisher));
    let patient = Uuid::new_v4();

    let created = mediator
        .send(CreatePrescription {
            prescription: new_prescription(patient, "Influenza", &["fever", "cough"]),
            correlation_id: Some("corr-1".into()),
        })
        .await
        .unwrap();

    assert_eq!(created.version, 1);
    assert_eq!(created.created_at, created.updated_at);
    assert_eq!(created.patient_id, patient);

    let fetched = mediator
        .send(GetPrescriptionById { id: created.id })
        .await
        .unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_publishes_saved_event() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::new();
    let mediator = mediator(settings(dir.path()), Arc::clone(&publisher));

    let created = mediator
        .send(CreatePrescription {
            prescription: new_prescription(Uuid::new_v4(), "Influenza", &["fever"]),
            correlation_id: Some("corr-7".into()),
        })
        .await
        .unwrap();

    let events = publisher.events();
    assert_eq!(events.len(), 1);
    let (topic, event) = &events[0];
    assert_eq!(topic, "prescription-saved");
    assert_eq!(event.kind(), Some(EventKind::PrescriptionSaved));
    assert_eq!(event.aggregate_id(), created.id.to_string());
    assert_eq!(event.correlation_id(), "corr-7");
    assert_eq!(event.source_service(), "prescriptions.api");
    assert_eq!(event.payload()["prescription_id"], created.id.to_string());
    assert_eq!(event.payload()["patient_id"], created.patient_id.to_string());
    assert_eq!(event.payload()["doctor_id"], created.doctor_id.to_string());
    assert_eq!(event.payload()["appointment_id"], created.appointment_id.to_string());
    assert_eq!(event.payload()["diagnosis"], "Influenza");
}

#[tokio::test]
async fn missing_correlation_id_is_generated() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::new();
    let mediator = mediator(settings(dir.path()), Arc::clone(&publisher));

    mediator
        .send(CreatePrescription {
            prescription: new_prescription(Uuid::new_v4(), "Cold", &[]),
            correlation_id: None,
        })
        .await
        .unwrap();

    let (_, event) = &publisher.events()[0];
    assert!(Uuid::parse_str(event.correlation_id()).is_ok());
}

#[tokio::test]
async fn invalid_diagnosis_is_rejected_before_persisting() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::new();
    let repo = Arc::new(InMemoryPrescriptionRepository::new());
    let ctx = Context::new(Arc::new(settings(dir.path())), publisher.clone())
        .with_prescriptions(repo.clone());
    let mediator = Mediator::new(ctx);

    let err = mediator
        .send(CreatePrescription {
            prescription: new_prescription(Uuid::new_v4(), "", &["fever"]),
            correlation_id: None,
        })
        .await
        .unwrap_err();

    assert_eq!(err.status_code(), 422);
    assert!(repo.get_all().await.unwrap().is_empty());
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn persistence_failure_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::new();
    let ctx = Context::new(Arc::new(settings(dir.path())), publisher.clone())
        .with_prescriptions(Arc::new(BrokenRepository));
    let mediator = Mediator::new(ctx);

    let err = mediator
        .send(CreatePrescription {
            prescription: new_prescription(Uuid::new_v4(), "Cold", &["cough"]),
            correlation_id: None,
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Repository(_)));
    assert_eq!(err.status_code(), 500);
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn publish_failure_after_persist_keeps_the_record() {
    let dir = tempfile::tempdir().unwrap();
    let repo = Arc::new(InMemoryPrescriptionRepository::new());
    let ctx = Context::new(Arc::new(settings(dir.path())), RecordingPublisher::failing())
        .with_prescriptions(repo.clone());
    let mediator = Mediator::new(ctx);

    let err = mediator
        .send(CreatePrescription {
            prescription: new_prescription(Uuid::new_v4(), "Cold", &["cough"]),
            correlation_id: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Publish(_)));
    assert_eq!(err.status_code(), 500);

    let stored = repo.get_all().await.unwrap();
    assert_eq!(stored.len(), 1);
    let fetched = mediator
        .send(GetPrescriptionById { id: stored[0].id })
        .await
        .unwrap();
    assert_eq!(fetched.diagnosis, "Cold");
}

#[tokio::test]
async fn unknown_id_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let mediator = mediator(settings(dir.path()), RecordingPublisher::new());

    let err = mediator
        .send(GetPrescriptionById { id: Uuid::new_v4() })
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::NotFound(_)));
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn patient_listing_is_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let mediator = mediator(settings(dir.path()), RecordingPublisher::new());
    let patient = Uuid::new_v4();

    let mut ids = Vec::new();
    for diagnosis in ["A", "B", "C"] {
        let created = mediator
            .send(CreatePrescription {
                prescription: new_prescription(patient, diagnosis, &["x"]),
                correlation_id: None,
            })
            .await
            .unwrap();
        ids.push(created.id);
    }
    ids.reverse();

    let list = mediator
        .send(GetPrescriptionsByPatient { patient_id: patient })
        .await
        .unwrap();
    assert_eq!(list.total, 3);
    assert_eq!(list.items.iter().map(|p| p.id).collect::<Vec<_>>(), ids);

    let empty = mediator
        .send(GetPrescriptionsByPatient {
            patient_id: Uuid::new_v4(),
        })
        .await
        .unwrap();
    assert_eq!(empty.total, 0);
    assert!(empty.items.is_empty());
}

#[tokio::test]
async fn in_process_publish_never_errors() {
    let publisher = BusPublisher::in_process();
    publisher.start().await;
    let event = EventEnvelope::new(EventKind::PrescriptionSaved, "agg", None, Map::new());
    for _ in 0..3 {
        publisher.publish("prescription-saved", &event).await.unwrap();
    }
}

fn suggest(symptoms: &[&str]) -> SuggestPrescription {
    SuggestPrescription {
        symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
        patient_history: None,
        correlation_id: Some("corr-s".into()),
    }
}

#[tokio::test]
async fn llm_disabled_returns_exact_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::new();
    let settings = Settings {
        enable_llm_suggestions: false,
        ..settings(dir.path())
    };
    let ctx = Context::new(Arc::new(settings), publisher.clone())
        .with_llm(StubLlm::answering("Flu", 0.9));
    let mediator = Mediator::new(ctx);

    let response = mediator.send(suggest(&["fever"])).await.unwrap();
    assert_eq!(response.diagnosis, FALLBACK_DIAGNOSIS);
    assert!(response.medications.is_empty());
    assert_eq!(response.notes, FALLBACK_NOTES);
    assert_eq!(response.confidence, 0.0);
    assert_eq!(response.source, SuggestionSource::Fallback);
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn missing_api_key_returns_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let settings = Settings {
        openai_api_key: String::new(),
        ..settings(dir.path())
    };
    let ctx = Context::new(Arc::new(settings), RecordingPublisher::new())
        .with_llm(StubLlm::answering("Flu", 0.9));

    let response = Mediator::new(ctx).send(suggest(&["fever"])).await.unwrap();
    assert_eq!(response.source, SuggestionSource::Fallback);
}

#[tokio::test]
async fn llm_suggestion_is_returned_and_published() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::new();
    let ctx = Context::new(Arc::new(settings(dir.path())), publisher.clone())
        .with_llm(StubLlm::answering("Influenza", 0.85));

    let response = Mediator::new(ctx)
        .send(suggest(&["fever", "aches"]))
        .await
        .unwrap();
    assert_eq!(response.source, SuggestionSource::Llm);
    assert_eq!(response.diagnosis, "Influenza");
    assert_eq!(response.medications.len(), 1);

    let events = publisher.events();
    assert_eq!(events.len(), 1);
    let (topic, event) = &events[0];
    assert_eq!(topic, "prescription-suggested");
    assert_eq!(event.kind(), Some(EventKind::PrescriptionSuggested));
    assert_eq!(event.correlation_id(), "corr-s");
    assert!(Uuid::parse_str(event.aggregate_id()).is_ok());
    assert_eq!(event.payload()["symptoms"], serde_json::json!(["fever", "aches"]));
    assert_eq!(event.payload()["diagnosis"], "Influenza");
    assert_eq!(event.payload()["confidence"], 0.85);
}

#[tokio::test]
async fn llm_failure_returns_fallback() {
    let dir = tempfile::tempdir().unwrap();
    let publisher = RecordingPublisher::new();
    let ctx = Context::new(Arc::new(settings(dir.path())), publisher.clone())
        .with_llm(StubLlm::failing());

    let response = Mediator::new(ctx).send(suggest(&["fever"])).await.unwrap();
    assert_eq!(response.source, SuggestionSource::Fallback);
    assert_eq!(response.diagnosis, FALLBACK_DIAGNOSIS);
    assert!(publisher.events().is_empty());
}

#[tokio::test]
async fn suggestion_publish_failure_is_swallowed() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new(Arc::new(settings(dir.path())), RecordingPublisher::failing())
        .with_llm(StubLlm::answering("Migraine", 0.6));

    let response = Mediator::new(ctx).send(suggest(&["headache"])).await.unwrap();
    assert_eq!(response.source, SuggestionSource::Llm);
    assert_eq!(response.diagnosis, "Migraine");
}

#[tokio::test]
async fn empty_symptoms_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mediator = mediator(settings(dir.path()), RecordingPublisher::new());

    let err = mediator.send(suggest(&[])).await.unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
}
