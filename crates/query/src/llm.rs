use async_trait::async_trait;
use extract::OllamaClient;

use crate::generation::{GenerationBackend, GenerationError, GenerationRequest};

/// Generation through an Ollama `/api/generate` model.
#[derive(Clone)]
pub struct QueryLLM {
    client: OllamaClient,
}

impl QueryLLM {
    pub fn new(client: OllamaClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &OllamaClient {
        &self.client
    }
}

#[async_trait]
impl GenerationBackend for QueryLLM {
    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let text = self.client.generate(&request.render()).await?;
        let text = text.trim();

        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }

        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_transport_failure_is_backend_error() {
        let llm = QueryLLM::new(OllamaClient::new(
            "http://127.0.0.1:9".to_string(),
            "llama3".to_string(),
        ));
        let err = llm
            .generate(&GenerationRequest::new("", "halo"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Backend(_)));
    }
}
