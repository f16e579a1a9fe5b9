use async_trait::async_trait;
use classify::{ClassifierError, SequenceClassifier};
use dashmap::DashMap;
use extract::{EntityExtractor, EntityMap, ExtractionError};
use sha2::{Digest, Sha256};
use std::hash::Hash;
use std::sync::Arc;

/// Memoises model outputs per prompt. The classifier is deterministic; for
/// the LLM extractor a hit replays the first extraction of that prompt.
pub struct Cache {
    entities: DashMap<String, EntityMap>,
    logits: DashMap<String, [f32; 2]>,
    max_entries: usize,
}

impl Cache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entities: DashMap::new(),
            logits: DashMap::new(),
            max_entries,
        }
    }

    pub fn set_entities(&self, text: &str, entities: EntityMap) {
        if self.max_entries == 0 {
            return;
        }
        evict_if_full(&self.entities, self.max_entries);
        self.entities.insert(hash_text(text), entities);
    }

    pub fn get_entities(&self, text: &str) -> Option<EntityMap> {
        self.entities.get(&hash_text(text)).map(|r| r.value().clone())
    }

    pub fn set_logits(&self, text: &str, logits: [f32; 2]) {
        if self.max_entries == 0 {
            return;
        }
        evict_if_full(&self.logits, self.max_entries);
        self.logits.insert(hash_text(text), logits);
    }

    pub fn get_logits(&self, text: &str) -> Option<[f32; 2]> {
        self.logits.get(&hash_text(text)).map(|r| *r.value())
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entities_cached: self.entities.len(),
            relevance_cached: self.logits.len(),
        }
    }

    pub fn clear(&self) {
        self.entities.clear();
        self.logits.clear();
    }
}

/// Simple eviction: clear 25% when full
fn evict_if_full<K, V>(map: &DashMap<K, V>, max_entries: usize)
where
    K: Eq + Hash + Clone,
{
    if map.len() < max_entries {
        return;
    }
    let to_remove: Vec<K> = map
        .iter()
        .take((max_entries / 4).max(1))
        .map(|r| r.key().clone())
        .collect();
    for key in to_remove {
        map.remove(&key);
    }
}

fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, serde::Serialize)]
pub struct CacheStats {
    pub entities_cached: usize,
    pub relevance_cached: usize,
}

/// Entity extractor that consults the cache first. Failures are not cached.
pub struct CachedExtractor {
    inner: Arc<dyn EntityExtractor>,
    cache: Arc<Cache>,
}

impl CachedExtractor {
    pub fn new(inner: Arc<dyn EntityExtractor>, cache: Arc<Cache>) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl EntityExtractor for CachedExtractor {
    async fn extract(&self, text: &str) -> Result<EntityMap, ExtractionError> {
        if let Some(hit) = self.cache.get_entities(text) {
            return Ok(hit);
        }
        let entities = self.inner.extract(text).await?;
        self.cache.set_entities(text, entities.clone());
        Ok(entities)
    }
}

/// Sequence classifier that consults the cache first. Failures are not cached.
pub struct CachedClassifier {
    inner: Arc<dyn SequenceClassifier>,
    cache: Arc<Cache>,
}

impl CachedClassifier {
    pub fn new(inner: Arc<dyn SequenceClassifier>, cache: Arc<Cache>) -> Self {
        Self { inner, cache }
    }
}

impl SequenceClassifier for CachedClassifier {
    fn logits(&self, text: &str) -> Result<[f32; 2], ClassifierError> {
        if let Some(hit) = self.cache.get_logits(text) {
            return Ok(hit);
        }
        let logits = self.inner.logits(text)?;
        self.cache.set_logits(text, logits);
        Ok(logits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    impl SequenceClassifier for Counting {
        fn logits(&self, _text: &str) -> Result<[f32; 2], ClassifierError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(ClassifierError::Inference("boom".to_string()))
            } else {
                Ok([0.0, 1.0])
            }
        }
    }

    #[test]
    fn test_classifier_hits_cache() {
        let inner = Arc::new(Counting { calls: AtomicUsize::new(0), fail: false });
        let cached = CachedClassifier::new(inner.clone(), Arc::new(Cache::new(10)));

        assert_eq!(cached.logits("halo").unwrap(), [0.0, 1.0]);
        assert_eq!(cached.logits("halo").unwrap(), [0.0, 1.0]);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failures_are_not_cached() {
        let inner = Arc::new(Counting { calls: AtomicUsize::new(0), fail: true });
        let cache = Arc::new(Cache::new(10));
        let cached = CachedClassifier::new(inner.clone(), cache.clone());

        assert!(cached.logits("halo").is_err());
        assert!(cached.logits("halo").is_err());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.stats().relevance_cached, 0);
    }

    #[test]
    fn test_eviction_keeps_size_bounded() {
        let cache = Cache::new(8);
        for i in 0..50 {
            cache.set_logits(&i.to_string(), [0.0, 0.0]);
        }
        assert!(cache.stats().relevance_cached <= 8);
    }

    #[tokio::test]
    async fn test_extractor_hits_cache() {
        let cache = Arc::new(Cache::new(10));
        let extractor = Arc::new(extract::PatternEntityExtractor::new());
        let cached = CachedExtractor::new(extractor, cache.clone());

        let first = cached.extract("Siapa CEO Satnusa?").await.unwrap();
        assert_eq!(cache.stats().entities_cached, 1);
        let second = cached.extract("Siapa CEO Satnusa?").await.unwrap();
        assert_eq!(first, second);

        cache.clear();
        assert_eq!(cache.stats().entities_cached, 0);
    }
}
