use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use super::prompt::{parse_suggestion, user_content, SYSTEM_PROMPT, TEMPERATURE};
use super::{LlmError, Suggestion, SuggestionClient};
use crate::config::Settings;

/// Where chat completions are sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEndpoint {
    /// `POST {base_url}/chat/completions` with a bearer token.
    OpenAi { base_url: String, model: String },
    /// `POST {endpoint}/openai/deployments/{deployment}/chat/completions`
    /// with an `api-key` header.
    Azure {
        endpoint: String,
        deployment: String,
        api_version: String,
    },
}

impl ChatEndpoint {
    fn url(&self) -> String {
        match self {
            ChatEndpoint::OpenAi { base_url, .. } => {
                format!("{}/chat/completions", base_url.trim_end_matches('/'))
            }
            ChatEndpoint::Azure {
                endpoint,
                deployment,
                api_version,
            } => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                endpoint.trim_end_matches('/'),
                deployment,
                api_version
            ),
        }
    }

    fn model(&self) -> &str {
        match self {
            ChatEndpoint::OpenAi { model, .. } => model,
            ChatEndpoint::Azure { deployment, .. } => deployment,
        }
    }
}

/// OpenAI-compatible chat-completion client.
pub struct ChatCompletionClient {
    http_client: Client,
    endpoint: ChatEndpoint,
    api_key: String,
}

impl ChatCompletionClient {
    pub fn new(
        endpoint: ChatEndpoint,
        api_key: impl Into<String>,
        timeout: std::time::Duration,
    ) -> Result<Self, LlmError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            endpoint,
            api_key: api_key.into(),
        })
    }

    /// Build the client selected by settings (OpenAI or Azure OpenAI).
    pub fn from_settings(settings: &Settings) -> Result<Self, LlmError> {
        if settings.openai_api_key.is_empty() {
            return Err(LlmError::NotConfigured("openai_api_key is empty".into()));
        }

        let endpoint = if settings.use_azure_openai {
            if settings.azure_openai_endpoint.is_empty() {
                return Err(LlmError::NotConfigured(
                    "azure_openai_endpoint is empty".into(),
                ));
            }
            ChatEndpoint::Azure {
                endpoint: settings.azure_openai_endpoint.clone(),
                deployment: settings.azure_openai_deployment.clone(),
                api_version: settings.azure_openai_api_version.clone(),
            }
        } else {
            ChatEndpoint::OpenAi {
                base_url: settings.openai_base_url.clone(),
                model: settings.openai_model.clone(),
            }
        };

        Self::new(endpoint, settings.openai_api_key.clone(), settings.llm_timeout())
    }

    pub fn endpoint(&self) -> &ChatEndpoint {
        &self.endpoint
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl SuggestionClient for ChatCompletionClient {
    async fn suggest(
        &self,
        symptoms: &[String],
        patient_history: Option<&str>,
    ) -> Result<Suggestion, LlmError> {
        let body = json!({
            "model": self.endpoint.model(),
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": user_content(symptoms, patient_history) },
            ],
            "temperature": TEMPERATURE,
            "response_format": { "type": "json_object" },
        });

        let request = self.http_client.post(self.endpoint.url()).json(&body);
        let request = match self.endpoint {
            ChatEndpoint::OpenAi { .. } => request.bearer_auth(&self.api_key),
            ChatEndpoint::Azure { .. } => request.header("api-key", &self.api_key),
        };

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let completion: CompletionResponse = response.json().await?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(LlmError::EmptyResponse)?;
        debug!(model = %self.endpoint.model(), "chat completion received");

        parse_suggestion(&content)
    }
}
