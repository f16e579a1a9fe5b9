use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::prompt;

/// Errors from talking to an Ollama-compatible `/api/generate` endpoint.
#[derive(Debug, thiserror::Error)]
pub enum OllamaError {
    #[error("failed to send request to Ollama: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("Ollama request failed: {0}")]
    Status(reqwest::StatusCode),
    #[error("failed to parse Ollama response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("model did not return valid JSON after {0} attempts")]
    InvalidJson(usize),
}

#[derive(Clone)]
pub struct OllamaClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>, // "json" for structured output
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    pub fn new(base_url: String, model: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model,
            api_key: None,
            client: reqwest::Client::new(),
        }
    }

    /// Attach a bearer token, for Ollama instances sitting behind an auth proxy.
    pub fn with_api_key(mut self, api_key: Option<String>) -> Self {
        self.api_key = api_key.filter(|k| !k.is_empty());
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Free-form text completion.
    pub async fn generate(&self, prompt: &str) -> Result<String, OllamaError> {
        self.send(prompt, None).await
    }

    /// Completion constrained to JSON output.
    pub async fn generate_json(&self, prompt: &str) -> Result<String, OllamaError> {
        self.send(prompt, Some("json")).await
    }

    /// Generate JSON, asking the model to repair its output when it does not parse.
    pub async fn generate_json_with_retry(
        &self,
        prompt: &str,
        max_attempts: usize,
    ) -> Result<String, OllamaError> {
        let mut request = prompt.to_string();

        for attempt in 0..max_attempts {
            let response = self.generate_json(&request).await?;

            if serde_json::from_str::<serde_json::Value>(&response).is_ok() {
                return Ok(response);
            }

            debug!(model = %self.model, attempt, "model returned invalid JSON");
            request = prompt::build_retry_prompt(&response);
        }

        Err(OllamaError::InvalidJson(max_attempts))
    }

    async fn send(&self, prompt: &str, format: Option<&str>) -> Result<String, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);

        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format,
        };

        let mut builder = self.client.post(&url).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(OllamaError::Transport)?;

        if !response.status().is_success() {
            return Err(OllamaError::Status(response.status()));
        }

        let ollama_response: OllamaResponse =
            response.json().await.map_err(OllamaError::Decode)?;

        Ok(ollama_response.response)
    }
}
