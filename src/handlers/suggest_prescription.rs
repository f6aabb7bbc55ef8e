use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::ServiceError;
use crate::event::{EventEnvelope, EventKind};
use crate::llm::{SuggestedMedication, Suggestion};
use crate::mediator::{Context, Handler, Mediator, Request};

pub const FALLBACK_DIAGNOSIS: &str = "Unable to determine diagnosis - please consult a physician";
pub const FALLBACK_NOTES: &str =
    "LLM service unavailable. Please consult a qualified medical professional.";

pub struct SuggestPrescription {
    pub symptoms: Vec<String>,
    pub patient_history: Option<String>,
    pub correlation_id: Option<String>,
}

impl Request for SuggestPrescription {
    type Response = SuggestPrescriptionResponse;
    const NAME: &'static str = "SuggestPrescription";

    fn validate(&self) -> Result<(), ServiceError> {
        if self.symptoms.is_empty() {
            return Err(ServiceError::Validation(
                "symptoms: at least one symptom is required".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionSource {
    Llm,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestPrescriptionResponse {
    pub diagnosis: String,
    pub medications: Vec<SuggestedMedication>,
    pub notes: String,
    pub confidence: f64,
    pub source: SuggestionSource,
}

impl SuggestPrescriptionResponse {
    pub fn fallback() -> Self {
        Self {
            diagnosis: FALLBACK_DIAGNOSIS.into(),
            medications: Vec::new(),
            notes: FALLBACK_NOTES.into(),
            confidence: 0.0,
            source: SuggestionSource::Fallback,
        }
    }
}

impl From<Suggestion> for SuggestPrescriptionResponse {
    fn from(s: Suggestion) -> Self {
        Self {
            diagnosis: s.diagnosis,
            medications: s.medications,
            notes: s.notes,
            confidence: s.confidence,
            source: SuggestionSource::Llm,
        }
    }
}

fn suggested_payload(symptoms: &[String], suggestion: &SuggestPrescriptionResponse) -> Map<String, Value> {
    let payload = json!({
        "symptoms": symptoms,
        "diagnosis": suggestion.diagnosis,
        "confidence": suggestion.confidence,
    });
    match payload {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

async fn publish_suggested(
    ctx: &Context,
    query: SuggestPrescription,
    suggestion: &SuggestPrescriptionResponse,
) {
    let event = EventEnvelope::new(
        EventKind::PrescriptionSuggested,
        Uuid::new_v4().to_string(),
        query.correlation_id,
        suggested_payload(&query.symptoms, suggestion),
    );
    let topic = &ctx.settings().prescription_suggested_topic;
    if let Err(e) = ctx.publisher().publish(topic, &event).await {
        error!(event_id = %event.event_id(), error = %e, "suggestion event not published");
    }
}

#[async_trait]
impl Handler<SuggestPrescription> for Mediator {
    async fn handle(
        &self,
        query: SuggestPrescription,
    ) -> Result<SuggestPrescriptionResponse, ServiceError> {
        let ctx = self.context();
        info!(symptoms = ?query.symptoms, "suggest prescription started");

        let Some(llm) = ctx.llm() else {
            warn!("LLM suggestions disabled or not configured, returning fallback");
            return Ok(SuggestPrescriptionResponse::fallback());
        };

        let suggestion = match llm
            .suggest(&query.symptoms, query.patient_history.as_deref())
            .await
        {
            Ok(suggestion) => SuggestPrescriptionResponse::from(suggestion),
            Err(e) => {
                error!(error = %e, "LLM suggestion failed, returning fallback");
                return Ok(SuggestPrescriptionResponse::fallback());
            }
        };

        publish_suggested(ctx, query, &suggestion).await;
        info!(confidence = suggestion.confidence, "suggest prescription completed");
        Ok(suggestion)
    }
}
