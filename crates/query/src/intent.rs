use async_trait::async_trait;
use extract::{OllamaClient, OllamaError};
use serde::{Deserialize, Serialize};

/// Structured answer from an intent detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub intent: String,
    pub fulfillment_text: String,
    #[serde(default)]
    pub confidence: f32,
}

#[derive(Debug, thiserror::Error)]
pub enum IntentError {
    #[error("intent backend error: {0}")]
    Backend(#[from] OllamaError),
    #[error("failed to parse intent result: {0}")]
    Parse(#[from] serde_json::Error),
}

/// "Given text, return a structured intent result."
#[async_trait]
pub trait IntentDetector: Send + Sync {
    async fn detect(&self, text: &str) -> Result<IntentResult, IntentError>;
}

pub struct LlmIntentDetector {
    client: OllamaClient,
    language: String,
}

impl LlmIntentDetector {
    pub fn new(client: OllamaClient, language: impl Into<String>) -> Self {
        Self {
            client,
            language: language.into(),
        }
    }

    fn build_prompt(&self, text: &str) -> String {
        format!(
            r#"Classify the intent of the user message and write a short reply in language "{}".

Output ONLY a JSON object with this schema:
{{"intent": "snake_case_intent_name", "fulfillment_text": "reply to the user", "confidence": 0.0}}

MESSAGE:
{}

JSON OUTPUT:"#,
            self.language, text
        )
    }

    pub fn parse_response(json_str: &str) -> Result<IntentResult, IntentError> {
        let mut result: IntentResult = serde_json::from_str(json_str)?;
        result.confidence = result.confidence.clamp(0.0, 1.0);
        Ok(result)
    }
}

#[async_trait]
impl IntentDetector for LlmIntentDetector {
    async fn detect(&self, text: &str) -> Result<IntentResult, IntentError> {
        let json_str = self
            .client
            .generate_json_with_retry(&self.build_prompt(text), 2)
            .await?;
        Self::parse_response(&json_str)
    }
}
