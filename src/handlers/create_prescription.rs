use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{error, info};
use uuid::Uuid;

use crate::domain::{NewPrescription, Prescription};
use crate::error::ServiceError;
use crate::event::{EventEnvelope, EventKind};
use crate::mediator::{Handler, Mediator, Request};

pub struct CreatePrescription {
    pub prescription: NewPrescription,
    pub correlation_id: Option<String>,
}

impl Request for CreatePrescription {
    type Response = PrescriptionResponse;
    const NAME: &'static str = "CreatePrescription";

    fn validate(&self) -> Result<(), ServiceError> {
        Ok(self.prescription.validate()?)
    }
}

/// Wire shape of a stored prescription.
#[derive(Debug, Clone, PartialEq, Serialize, serde::Deserialize)]
pub struct PrescriptionResponse {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub symptoms: Vec<String>,
    pub diagnosis: String,
    pub medications: Vec<String>,
    pub dosage: Map<String, Value>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub version: u32,
}

impl From<Prescription> for PrescriptionResponse {
    fn from(p: Prescription) -> Self {
        Self {
            id: p.id,
            appointment_id: p.appointment_id,
            patient_id: p.patient_id,
            doctor_id: p.doctor_id,
            symptoms: p.symptoms,
            diagnosis: p.diagnosis,
            medications: p.medications,
            dosage: p.dosage,
            notes: p.notes,
            created_at: p.created_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            updated_at: p.updated_at.to_rfc3339_opts(SecondsFormat::Micros, false),
            version: p.version,
        }
    }
}

/// Event payload announcing a saved prescription.
pub fn saved_payload(p: &Prescription) -> Map<String, Value> {
    let payload = json!({
        "prescription_id": p.id.to_string(),
        "patient_id": p.patient_id.to_string(),
        "doctor_id": p.doctor_id.to_string(),
        "appointment_id": p.appointment_id.to_string(),
        "diagnosis": p.diagnosis,
    });
    match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

#[async_trait]
impl Handler<CreatePrescription> for Mediator {
    async fn handle(&self, cmd: CreatePrescription) -> Result<PrescriptionResponse, ServiceError> {
        let ctx = self.context();
        info!(
            patient_id = %cmd.prescription.patient_id,
            doctor_id = %cmd.prescription.doctor_id,
            "create prescription started"
        );

        let saved = ctx.prescriptions().create(cmd.prescription).await?;

        let event = EventEnvelope::new(
            EventKind::PrescriptionSaved,
            saved.id.to_string(),
            cmd.correlation_id,
            saved_payload(&saved),
        );
        let topic = &ctx.settings().prescription_saved_topic;
        if let Err(e) = ctx.publisher().publish(topic, &event).await {
            error!(
                prescription_id = %saved.id,
                event_id = %event.event_id(),
                error = %e,
                "prescription saved but event not published"
            );
            return Err(e.into());
        }

        info!(prescription_id = %saved.id, "create prescription completed");
        Ok(saved.into())
    }
}
