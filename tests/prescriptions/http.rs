//! HTTP routes end to end: axum server on an ephemeral port, reqwest client.

use std::sync::Arc;

use prescriptions::app::App;
use prescriptions::bus::MessageBus;
use prescriptions::shutdown::ShutdownSignal;
use prescriptions::{Context, Settings};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::support::{settings, RecordingPublisher, StubLlm};

struct TestServer {
    base: String,
    publisher: Arc<RecordingPublisher>,
    _models: tempfile::TempDir,
}

/// Bind to port 0 and serve `ctx` customised by `configure`.
async fn start_server_with(
    configure: impl FnOnce(Settings) -> Settings,
    llm: Option<Arc<StubLlm>>,
) -> TestServer {
    let models = tempfile::tempdir().unwrap();
    let settings = Arc::new(configure(settings(models.path())));
    let publisher = RecordingPublisher::new();

    let mut ctx = Context::new(Arc::clone(&settings), publisher.clone());
    if let Some(llm) = llm {
        ctx = ctx.with_llm(llm);
    }
    let app = App::from_parts(settings, Arc::new(MessageBus::in_process()), ctx);
    let router = app.router();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestServer {
        base: format!("http://{addr}"),
        publisher,
        _models: models,
    }
}

async fn start_server() -> TestServer {
    start_server_with(|s| s, None).await
}

fn create_body(patient_id: Uuid, diagnosis: &str) -> Value {
    json!({
        "appointment_id": Uuid::new_v4(),
        "patient_id": patient_id,
        "doctor_id": Uuid::new_v4(),
        "symptoms": ["fever", "cough"],
        "diagnosis": diagnosis,
        "medications": ["Oseltamivir"],
        "dosage": { "Oseltamivir": "75mg twice daily" },
        "notes": "Review in one week",
    })
}

#[tokio::test]
async fn health_check() {
    let server = start_server().await;
    let resp = reqwest::get(format!("{}/health", server.base)).await.unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "status": "healthy",
            "service": "Prescriptions API",
            "version": "1.0.0",
            "environment": "production",
        })
    );
}

#[tokio::test]
async fn create_and_fetch_prescription() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    let patient = Uuid::new_v4();

    let resp = client
        .post(format!("{}/api/prescriptions", server.base))
        .header("x-correlation-id", "corr-http")
        .json(&create_body(patient, "Influenza"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);

    let created: Value = resp.json().await.unwrap();
    assert_eq!(created["version"], 1);
    assert_eq!(created["diagnosis"], "Influenza");
    assert_eq!(created["dosage"]["Oseltamivir"], "75mg twice daily");
    assert!(created["created_at"].is_string());
    assert_eq!(created["created_at"], created["updated_at"]);
    let id = created["id"].as_str().unwrap().to_string();

    let fetched: Value = client
        .get(format!("{}/api/prescriptions/{id}", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(fetched, created);

    let events = server.publisher.events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].1.correlation_id(), "corr-http");
}

#[tokio::test]
async fn list_by_patient() {
    let server = start_server().await;
    let client = reqwest::Client::new();
    let patient = Uuid::new_v4();

    for diagnosis in ["Cold", "Flu"] {
        let resp = client
            .post(format!("{}/api/prescriptions", server.base))
            .json(&create_body(patient, diagnosis))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 201);
    }

    let body: Value = client
        .get(format!("{}/api/prescriptions/patient/{patient}", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["total"], 2);
    assert_eq!(body["items"][0]["diagnosis"], "Flu");
    assert_eq!(body["items"][1]["diagnosis"], "Cold");

    let empty: Value = client
        .get(format!("{}/api/prescriptions/patient/{}", server.base, Uuid::new_v4()))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(empty, json!({ "items": [], "total": 0 }));
}

#[tokio::test]
async fn unknown_prescription_is_404() {
    let server = start_server().await;
    let resp = reqwest::get(format!("{}/api/prescriptions/{}", server.base, Uuid::new_v4()))
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["detail"], "Prescription not found");
}

#[tokio::test]
async fn invalid_input_is_422() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/api/prescriptions/not-a-uuid", server.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let resp = client
        .post(format!("{}/api/prescriptions", server.base))
        .json(&create_body(Uuid::new_v4(), ""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    let resp = client
        .post(format!("{}/api/prescriptions", server.base))
        .json(&json!({ "diagnosis": "Flu" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);
    let body: Value = resp.json().await.unwrap();
    assert!(body["detail"].is_string());

    let resp = client
        .post(format!("{}/api/prescriptions/suggest", server.base))
        .json(&json!({ "symptoms": [] }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 422);

    assert!(server.publisher.events().is_empty());
}

#[tokio::test]
async fn suggest_falls_back_without_llm() {
    let server = start_server_with(
        |s| Settings {
            enable_llm_suggestions: false,
            ..s
        },
        None,
    )
    .await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/prescriptions/suggest", server.base))
        .json(&json!({ "symptoms": ["fever"], "patient_history": "asthma" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({
            "diagnosis": "Unable to determine diagnosis - please consult a physician",
            "medications": [],
            "notes": "LLM service unavailable. Please consult a qualified medical professional.",
            "confidence": 0.0,
            "source": "fallback",
        })
    );
}

#[tokio::test]
async fn suggest_uses_llm_when_configured() {
    let server = start_server_with(|s| s, Some(StubLlm::answering("Influenza", 0.8))).await;

    let body: Value = reqwest::Client::new()
        .post(format!("{}/api/prescriptions/suggest", server.base))
        .json(&json!({ "symptoms": ["fever", "aches"] }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["source"], "llm");
    assert_eq!(body["diagnosis"], "Influenza");
    assert_eq!(body["medications"][0]["name"], "Paracetamol");
    assert_eq!(server.publisher.events().len(), 1);
}

#[tokio::test]
async fn train_with_and_without_body() {
    let server = start_server().await;
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{}/api/prescriptions/train", server.base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["model_version"], "0.0.0");
    assert_eq!(body["message"], "No training data available");

    client
        .post(format!("{}/api/prescriptions", server.base))
        .json(&create_body(Uuid::new_v4(), "Influenza"))
        .send()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/api/prescriptions/train", server.base))
        .json(&json!({ "force_retrain": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["model_version"], "1.1.0");
    assert_eq!(body["accuracy_score"], 1.0);
    assert_eq!(body["dataset_size"], 1);
}

#[tokio::test]
async fn unknown_route_is_404() {
    let server = start_server().await;
    let resp = reqwest::get(format!("{}/nope", server.base)).await.unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn run_serves_until_shutdown() {
    let models = tempfile::tempdir().unwrap();
    let app = App::build(settings(models.path()));
    let bus = Arc::clone(app.bus());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = ShutdownSignal::new();

    let handle = tokio::spawn(app.run(listener, shutdown.clone()));

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status(), 200);

    shutdown.trigger();
    tokio::time::timeout(std::time::Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(!bus.subscriber().is_running());
}
