use async_trait::async_trait;
use extract::OllamaError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Everything the generation backend sees for one request. Built right
/// before the call and never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt_context: String,
    pub query: String,
}

impl GenerationRequest {
    pub fn new(prompt_context: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            prompt_context: prompt_context.into(),
            query: query.into(),
        }
    }

    /// Single prompt string for completion-style backends.
    pub fn render(&self) -> String {
        if self.prompt_context.is_empty() {
            format!("User: {}\nAssistant:", self.query)
        } else {
            format!("{}\nUser: {}\nAssistant:", self.prompt_context, self.query)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    #[error("generation backend error: {0}")]
    Backend(#[from] OllamaError),
    #[error("generation backend returned an empty response")]
    EmptyResponse,
    #[error("generation timed out after {0:?}")]
    Timeout(Duration),
    #[error("generation was cancelled")]
    Cancelled,
    #[error("generation backend unavailable: {0}")]
    Unavailable(String),
}

/// "Given context and a query, return generated text."
///
/// Any error sends the orchestrator down the knowledge-base fallback, so
/// implementations should not retry internally.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
