use anyhow::{Context, Result};
use classify::{
    FitOptions, LinearSequenceModel, RelevanceClassifier, SequenceClassifier, load_examples,
};
use extract::{EntityExtractor, LlmEntityExtractor, OllamaClient, PatternEntityExtractor};
use query::{
    ConversationStore, IntentDetector, KnowledgeBase, LlmIntentDetector, Orchestrator,
    OrchestratorOptions, QueryLLM,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::{Cache, CachedClassifier, CachedExtractor};
use crate::config::{AppConfig, ExtractorKind, RelevanceConfig};
use crate::metrics::Metrics;

pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub intents: Arc<dyn IntentDetector>,
    pub metrics: Arc<Metrics>,
    pub cache: Arc<Cache>,
}

impl AppState {
    pub fn new(
        orchestrator: Orchestrator,
        intents: Arc<dyn IntentDetector>,
        cache: Arc<Cache>,
    ) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            intents,
            metrics: Metrics::new(),
            cache,
        }
    }
}

/// Wire every capability from configuration.
pub async fn build_state(config: &AppConfig) -> Result<Arc<AppState>> {
    let knowledge = KnowledgeBase::load(
        &config.knowledge.corpus_path,
        config.knowledge.not_found.clone(),
    )
    .await?;
    info!(
        path = ?config.knowledge.corpus_path,
        bytes = knowledge.len(),
        "knowledge corpus loaded"
    );

    let cache_entries = if config.cache.enabled {
        config.cache.max_entries
    } else {
        0
    };
    let cache = Arc::new(Cache::new(cache_entries));

    let model: Arc<dyn SequenceClassifier> =
        Arc::new(load_relevance_model(&config.relevance).await?);
    let model: Arc<dyn SequenceClassifier> = if config.cache.enabled {
        Arc::new(CachedClassifier::new(model, Arc::clone(&cache)))
    } else {
        model
    };
    let classifier = RelevanceClassifier::new(model, config.relevance.threshold);

    let ollama = |model: &str| {
        OllamaClient::new(config.ollama.base_url.clone(), model.to_string())
            .with_api_key(config.ollama.api_key.clone())
    };

    let extractor: Arc<dyn EntityExtractor> = match config.ollama.entity_extractor {
        ExtractorKind::Llm => Arc::new(LlmEntityExtractor::new(ollama(
            &config.ollama.extraction_model,
        ))),
        ExtractorKind::Pattern => Arc::new(PatternEntityExtractor::new()),
    };
    let extractor: Arc<dyn EntityExtractor> = if config.cache.enabled {
        Arc::new(CachedExtractor::new(extractor, Arc::clone(&cache)))
    } else {
        extractor
    };

    let generator = Arc::new(QueryLLM::new(ollama(&config.ollama.generation_model)));
    let intents = Arc::new(LlmIntentDetector::new(
        ollama(&config.ollama.generation_model),
        config.ollama.intent_language.clone(),
    ));

    let timeout_secs = config.concurrency.request_timeout_secs;
    let orchestrator = Orchestrator::new(
        extractor,
        classifier,
        Arc::new(knowledge),
        generator,
        Arc::new(ConversationStore::new()),
        OrchestratorOptions {
            backend_timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
            max_concurrent_generations: config.concurrency.max_concurrent_llm_calls,
        },
    );

    info!(
        generation_model = %config.ollama.generation_model,
        extractor = ?config.ollama.entity_extractor,
        threshold = config.relevance.threshold,
        "orchestrator ready"
    );

    Ok(Arc::new(AppState::new(orchestrator, intents, cache)))
}

/// Saved weights when configured, otherwise fit on the labeled examples.
async fn load_relevance_model(config: &RelevanceConfig) -> Result<LinearSequenceModel> {
    if let Some(path) = &config.model_path {
        info!(path = ?path, "loading relevance classifier weights");
        return LinearSequenceModel::load(path).await;
    }

    let examples = load_examples(&config.examples_path).await?;
    let options = FitOptions {
        max_length: config.max_length,
        ..FitOptions::default()
    };
    let model = LinearSequenceModel::fit(&examples, &options)
        .context("Failed to fit relevance classifier")?;

    info!(
        examples = examples.len(),
        accuracy = model.accuracy(&examples, config.threshold),
        "relevance classifier fitted"
    );
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn workspace_file(relative: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../..").join(relative)
    }

    #[tokio::test]
    async fn test_build_state_from_bundled_data() {
        let mut config = AppConfig::default();
        config.knowledge.corpus_path = workspace_file("data/satnusa.md");
        config.relevance.examples_path = workspace_file("data/relevance_examples.json");
        config.ollama.entity_extractor = ExtractorKind::Pattern;

        let state = build_state(&config).await.unwrap();
        assert!(state.orchestrator.knowledge().corpus().contains("Satnusa"));
        assert!(state.orchestrator.conversations().is_empty());
    }

    #[tokio::test]
    async fn test_missing_corpus_is_a_startup_error() {
        let mut config = AppConfig::default();
        config.knowledge.corpus_path = PathBuf::from("/nonexistent/corpus.md");
        assert!(build_state(&config).await.is_err());
    }
}
