use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;

use super::error::ApiError;
use super::extract::{parse_uuid, ValidJson};
use super::session::Session;
use super::AppState;
use crate::domain::NewPrescription;
use crate::error::ServiceError;
use crate::handlers::{
    CreatePrescription, GetPrescriptionById, GetPrescriptionsByPatient, SuggestPrescription,
    TrainModel,
};

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": state.settings.app_name,
        "version": state.settings.app_version,
        "environment": state.settings.environment,
    }))
}

/// `POST /api/prescriptions`
pub async fn create_prescription(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(prescription): ValidJson<NewPrescription>,
) -> Result<impl IntoResponse, ApiError> {
    let session = Session::from_headers(&headers);
    let created = state
        .mediator
        .send(CreatePrescription {
            prescription,
            correlation_id: session.correlation_id(),
        })
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /api/prescriptions/:id`
pub async fn get_prescription(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_uuid("prescription_id", &id)?;
    let prescription = state.mediator.send(GetPrescriptionById { id }).await?;
    Ok(Json(prescription))
}

/// `GET /api/prescriptions/patient/:patient_id`
pub async fn get_prescriptions_by_patient(
    State(state): State<AppState>,
    Path(patient_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let patient_id = parse_uuid("patient_id", &patient_id)?;
    let list = state
        .mediator
        .send(GetPrescriptionsByPatient { patient_id })
        .await?;
    Ok(Json(list))
}

#[derive(Deserialize)]
pub struct SuggestPrescriptionRequest {
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub patient_history: Option<String>,
}

/// `POST /api/prescriptions/suggest`
pub async fn suggest_prescription(
    State(state): State<AppState>,
    headers: HeaderMap,
    ValidJson(request): ValidJson<SuggestPrescriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = Session::from_headers(&headers);
    let suggestion = state
        .mediator
        .send(SuggestPrescription {
            symptoms: request.symptoms,
            patient_history: request.patient_history,
            correlation_id: session.correlation_id(),
        })
        .await?;
    Ok(Json(suggestion))
}

/// `POST /api/prescriptions/train`
///
/// The body is optional; an empty body means default options.
pub async fn train_model(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        TrainModel::default()
    } else {
        serde_json::from_slice::<TrainModel>(&body)
            .map_err(|e| ServiceError::Validation(format!("invalid request body: {e}")))?
    };
    let response = state.mediator.send(request).await?;
    Ok(Json(response))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not Found" })))
}
