use serde::Deserialize;

use super::{LlmError, SuggestedMedication, Suggestion};

pub const SYSTEM_PROMPT: &str = r#"You are a medical AI assistant. Given symptoms, provide a structured prescription suggestion.
Always respond with valid JSON in this exact format:
{
  "diagnosis": "string",
  "medications": [{"name": "string", "dosage": "string", "frequency": "string", "duration": "string"}],
  "notes": "string",
  "confidence": 0.0
}
Important: This is for informational purposes only and must be reviewed by a licensed physician."#;

pub const TEMPERATURE: f64 = 0.2;

/// Confidence assumed when the model omits it.
const DEFAULT_CONFIDENCE: f64 = 0.5;

pub fn user_content(symptoms: &[String], patient_history: Option<&str>) -> String {
    let mut content = format!("Symptoms: {}", symptoms.join(", "));
    if let Some(history) = patient_history.filter(|h| !h.is_empty()) {
        content.push_str("\nPatient history: ");
        content.push_str(history);
    }
    content
}

#[derive(Deserialize)]
struct RawSuggestion {
    #[serde(default)]
    diagnosis: String,
    #[serde(default)]
    medications: Vec<SuggestedMedication>,
    #[serde(default)]
    notes: String,
    confidence: Option<f64>,
}

/// Parse the model's JSON content into a suggestion.
pub fn parse_suggestion(content: &str) -> Result<Suggestion, LlmError> {
    let raw: RawSuggestion = serde_json::from_str(content)?;
    let confidence = raw.confidence.unwrap_or(DEFAULT_CONFIDENCE);
    if !(0.0..=1.0).contains(&confidence) {
        return Err(LlmError::ConfidenceOutOfRange(confidence));
    }
    Ok(Suggestion {
        diagnosis: raw.diagnosis,
        medications: raw.medications,
        notes: raw.notes,
        confidence,
    })
}
