pub mod llm;
pub mod normalizer;
pub mod pattern;
pub mod prompt;
pub mod schema;

pub use llm::{OllamaClient, OllamaError};
pub use normalizer::EntityNormalizer;
pub use pattern::PatternEntityExtractor;
pub use schema::{EntityMap, EntityMatch, ExtractionError, ExtractionResult};

use async_trait::async_trait;

/// Pulls named entities out of raw text.
///
/// Extraction is an enrichment: callers are expected to degrade an error to
/// an empty map rather than fail the request.
#[async_trait]
pub trait EntityExtractor: Send + Sync {
    async fn extract(&self, text: &str) -> Result<EntityMap, ExtractionError>;
}

/// Entity extraction backed by an LLM that answers in JSON.
pub struct LlmEntityExtractor {
    llm_client: OllamaClient,
    normalizer: EntityNormalizer,
    max_attempts: usize,
}

impl LlmEntityExtractor {
    pub fn new(llm_client: OllamaClient) -> Self {
        Self {
            llm_client,
            normalizer: EntityNormalizer::new(),
            max_attempts: 2,
        }
    }

    /// Parse a model answer into normalized entities.
    pub fn parse_response(&self, json_str: &str) -> Result<EntityMap, ExtractionError> {
        let result: ExtractionResult = serde_json::from_str(json_str)?;
        Ok(self.normalizer.collect(result.entities))
    }
}

#[async_trait]
impl EntityExtractor for LlmEntityExtractor {
    async fn extract(&self, text: &str) -> Result<EntityMap, ExtractionError> {
        if text.trim().is_empty() {
            return Ok(EntityMap::new());
        }

        let prompt = prompt::build_extraction_prompt(text);

        let json_str = self
            .llm_client
            .generate_json_with_retry(&prompt, self.max_attempts)
            .await?;

        let entities = self.parse_response(&json_str)?;
        tracing::debug!(
            model = self.llm_client.model(),
            count = entities.len(),
            "entities extracted"
        );

        Ok(entities)
    }
}
