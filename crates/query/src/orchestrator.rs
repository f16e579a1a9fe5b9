//! Request handling: extract entities, score relevance, pick a context,
//! generate, and fall back to the knowledge base when generation fails.

use classify::{RelevanceClassifier, RelevanceResult};
use extract::{EntityExtractor, EntityMap};
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::conversation::{ConversationStore, Turn, render_history};
use crate::generation::{GenerationBackend, GenerationError, GenerationRequest};
use crate::knowledge::KnowledgeBase;

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Prompt is required.")]
    InvalidInput,
}

/// Where the response text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Generated,
    KnowledgeBase,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrchestratorResponse {
    pub response: String,
    pub relevance: RelevanceResult,
    pub entities: EntityMap,
    pub source: ResponseSource,
    #[serde(skip)]
    pub generation_time: Duration,
}

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Upper bound on each backend call, extraction and generation alike.
    /// `None` leaves it to the backend.
    pub backend_timeout: Option<Duration>,
    /// Process-wide cap on in-flight generation calls. `None` means users
    /// never wait on each other.
    pub max_concurrent_generations: Option<usize>,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            backend_timeout: Some(Duration::from_secs(60)),
            max_concurrent_generations: None,
        }
    }
}

pub struct Orchestrator {
    extractor: Arc<dyn EntityExtractor>,
    classifier: RelevanceClassifier,
    knowledge: Arc<KnowledgeBase>,
    generator: Arc<dyn GenerationBackend>,
    conversations: Arc<ConversationStore>,
    generation_permits: Option<Semaphore>,
    backend_timeout: Option<Duration>,
}

impl Orchestrator {
    pub fn new(
        extractor: Arc<dyn EntityExtractor>,
        classifier: RelevanceClassifier,
        knowledge: Arc<KnowledgeBase>,
        generator: Arc<dyn GenerationBackend>,
        conversations: Arc<ConversationStore>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            extractor,
            classifier,
            knowledge,
            generator,
            conversations,
            generation_permits: options
                .max_concurrent_generations
                .map(|permits| Semaphore::new(permits.max(1))),
            backend_timeout: options.backend_timeout,
        }
    }

    pub fn conversations(&self) -> &Arc<ConversationStore> {
        &self.conversations
    }

    pub fn knowledge(&self) -> &Arc<KnowledgeBase> {
        &self.knowledge
    }

    pub async fn handle(
        &self,
        user_id: &str,
        prompt: &str,
    ) -> Result<OrchestratorResponse, OrchestratorError> {
        self.handle_with_cancel(user_id, prompt, std::future::pending())
            .await
    }

    /// Like [`handle`](Self::handle), but backend calls are abandoned as soon
    /// as `cancel` resolves: extraction yields no entities and the
    /// knowledge-base answer replaces generation.
    pub async fn handle_with_cancel<C>(
        &self,
        user_id: &str,
        prompt: &str,
        cancel: C,
    ) -> Result<OrchestratorResponse, OrchestratorError>
    where
        C: Future<Output = ()> + Send,
    {
        if prompt.trim().is_empty() {
            return Err(OrchestratorError::InvalidInput);
        }

        let span = info_span!("handle", request_id = %Uuid::new_v4(), user_id);
        self.respond(user_id, prompt, cancel).instrument(span).await
    }

    async fn respond<C>(
        &self,
        user_id: &str,
        prompt: &str,
        cancel: C,
    ) -> Result<OrchestratorResponse, OrchestratorError>
    where
        C: Future<Output = ()> + Send,
    {
        // Held until the assistant turn is written, so one user's turns
        // always alternate.
        let mut conversation = self.conversations.lock(user_id).await;
        let prior = conversation.turns().to_vec();
        conversation.push(Turn::user(prompt));

        let mut cancel = std::pin::pin!(cancel);
        let mut cancelled = false;

        let entities = tokio::select! {
            result = self.within_timeout(self.extractor.extract(prompt)) => match result {
                Ok(Ok(entities)) => entities,
                Ok(Err(e)) => {
                    warn!(error = %e, "entity extraction failed, continuing without entities");
                    EntityMap::new()
                }
                Err(limit) => {
                    warn!(?limit, "entity extraction timed out, continuing without entities");
                    EntityMap::new()
                }
            },
            _ = cancel.as_mut() => {
                cancelled = true;
                warn!("request cancelled during entity extraction, continuing without entities");
                EntityMap::new()
            }
        };

        let relevance = self.classifier.classify(prompt);
        info!(
            score = relevance.score,
            relevant = relevance.is_relevant,
            entities = entities.len(),
            "query scored"
        );

        let request = GenerationRequest::new(self.select_context(&relevance, &prior), prompt);

        let started = Instant::now();
        let outcome = if cancelled {
            Err(GenerationError::Cancelled)
        } else {
            self.generate(&request, cancel.as_mut()).await
        };
        let generation_time = started.elapsed();

        let (response, source) = match outcome {
            Ok(text) => (text, ResponseSource::Generated),
            Err(e) => {
                warn!(error = %e, "generation failed, answering from knowledge base");
                (
                    self.knowledge.search(prompt, &entities),
                    ResponseSource::KnowledgeBase,
                )
            }
        };

        conversation.push(Turn::assistant(response.clone()));
        debug!(?source, turns = conversation.turns().len(), "response recorded");

        Ok(OrchestratorResponse {
            response,
            relevance,
            entities,
            source,
            generation_time,
        })
    }

    /// Relevant queries get the domain corpus followed by the prior turns;
    /// everything else gets the prior turns alone.
    pub fn select_context(&self, relevance: &RelevanceResult, prior: &[Turn]) -> String {
        let history = render_history(prior);

        if !relevance.is_relevant {
            return history;
        }

        if history.is_empty() {
            self.knowledge.corpus().to_string()
        } else {
            format!("{}\n{}", self.knowledge.corpus(), history)
        }
    }

    /// Bounds a backend call by the configured timeout. `Err` carries the
    /// limit that elapsed.
    async fn within_timeout<F: Future>(&self, call: F) -> Result<F::Output, Duration> {
        match self.backend_timeout {
            Some(limit) => tokio::time::timeout(limit, call).await.map_err(|_| limit),
            None => Ok(call.await),
        }
    }

    /// One attempt, no retries. Waiting for a permit counts against the
    /// timeout.
    async fn generate<C>(
        &self,
        request: &GenerationRequest,
        cancel: Pin<&mut C>,
    ) -> Result<String, GenerationError>
    where
        C: Future<Output = ()> + Send,
    {
        let call = async {
            let _permit = match &self.generation_permits {
                Some(permits) => match permits.acquire().await {
                    Ok(permit) => Some(permit),
                    Err(e) => return Err(GenerationError::Unavailable(e.to_string())),
                },
                None => None,
            };
            self.generator.generate(request).await
        };

        let text = tokio::select! {
            result = self.within_timeout(call) => result.map_err(GenerationError::Timeout)??,
            _ = cancel => return Err(GenerationError::Cancelled),
        };

        if text.trim().is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text)
    }
}
