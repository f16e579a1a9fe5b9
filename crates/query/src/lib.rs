pub mod conversation;
pub mod generation;
pub mod intent;
pub mod knowledge;
pub mod llm;
pub mod orchestrator;

pub use conversation::{ConversationGuard, ConversationStore, DEFAULT_USER_ID, Role, Turn};
pub use generation::{GenerationBackend, GenerationError, GenerationRequest};
pub use intent::{IntentDetector, IntentError, IntentResult, LlmIntentDetector};
pub use knowledge::{DEFAULT_NOT_FOUND, KnowledgeBase};
pub use llm::QueryLLM;
pub use orchestrator::{
    Orchestrator, OrchestratorError, OrchestratorOptions, OrchestratorResponse, ResponseSource,
};
