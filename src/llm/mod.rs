//! Chat-completion backed prescription suggestions.
//!
//! The suggestion handler only sees [`SuggestionClient`]; any error it
//! returns is turned into the fallback suggestion by the caller.

mod openai;
mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use openai::{ChatCompletionClient, ChatEndpoint};
pub use prompt::{parse_suggestion, user_content, SYSTEM_PROMPT, TEMPERATURE};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM client is not configured: {0}")]
    NotConfigured(String),

    #[error("LLM request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("LLM returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("LLM response had no content")]
    EmptyResponse,

    #[error("LLM response is not valid JSON: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("LLM confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedMedication {
    pub name: String,
    pub dosage: String,
    pub frequency: String,
    pub duration: String,
}

/// A structured suggestion as produced by the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub diagnosis: String,
    pub medications: Vec<SuggestedMedication>,
    pub notes: String,
    pub confidence: f64,
}

#[async_trait]
pub trait SuggestionClient: Send + Sync {
    async fn suggest(
        &self,
        symptoms: &[String],
        patient_history: Option<&str>,
    ) -> Result<Suggestion, LlmError>;
}
