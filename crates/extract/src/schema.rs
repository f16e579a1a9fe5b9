use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::llm::OllamaError;

/// Entity surface text -> label. Repeated spans of the same text collapse
/// into one entry; the last label seen wins.
pub type EntityMap = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMatch {
    pub text: String,
    pub label: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default)]
    pub entities: Vec<EntityMatch>,
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("entity model backend error: {0}")]
    Backend(#[from] OllamaError),
    #[error("failed to parse extraction result: {0}")]
    Parse(#[from] serde_json::Error),
}
