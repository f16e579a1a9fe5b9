use anyhow::{Context, Result};
use extract::EntityMap;
use std::path::Path;
use tokio::fs;

pub const DEFAULT_NOT_FOUND: &str = "Maaf, informasi yang Anda cari tidak ditemukan.";

/// A static, human-authored domain text. Read-only once loaded.
///
/// Lookup is plain case-insensitive substring containment and always answers
/// with the whole corpus on a hit. There is no ranking and no snippeting.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    corpus: String,
    corpus_lower: String,
    not_found: String,
}

impl KnowledgeBase {
    pub fn new(corpus: impl Into<String>, not_found: impl Into<String>) -> Self {
        let corpus = corpus.into();
        let corpus_lower = corpus.to_lowercase();
        Self {
            corpus,
            corpus_lower,
            not_found: not_found.into(),
        }
    }

    /// Load a `.md` or `.txt` corpus file. An empty corpus is rejected.
    pub async fn load(path: &Path, not_found: impl Into<String>) -> Result<Self> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let content = match extension {
            "txt" | "md" => fs::read_to_string(path)
                .await
                .context(format!("Failed to read knowledge corpus: {:?}", path))?,
            _ => anyhow::bail!("Unsupported corpus format: {:?}", path),
        };

        let corpus = content.trim();
        if corpus.is_empty() {
            anyhow::bail!("Knowledge corpus is empty: {:?}", path);
        }

        Ok(Self::new(corpus, not_found))
    }

    pub fn corpus(&self) -> &str {
        &self.corpus
    }

    pub fn not_found(&self) -> &str {
        &self.not_found
    }

    pub fn len(&self) -> usize {
        self.corpus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.corpus.is_empty()
    }

    /// Literal case-insensitive containment. The needle is not trimmed, and
    /// an empty needle is contained in any corpus.
    fn contains(&self, needle: &str) -> bool {
        self.corpus_lower.contains(&needle.to_lowercase())
    }

    /// Entity hit first, then the whole query, else the not-found text.
    pub fn search(&self, query: &str, entities: &EntityMap) -> String {
        let entity_hit = entities.keys().any(|entity| self.contains(entity));

        if entity_hit || self.contains(query) {
            self.corpus.clone()
        } else {
            self.not_found.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = "Nama Perusahaan: Satnusa\nCEO: Bapak Alex Sirait\nDivisi Terbesar: DOT";

    fn kb() -> KnowledgeBase {
        KnowledgeBase::new(CORPUS, DEFAULT_NOT_FOUND)
    }

    fn entities(pairs: &[(&str, &str)]) -> EntityMap {
        pairs
            .iter()
            .map(|(t, l)| (t.to_string(), l.to_string()))
            .collect()
    }

    #[test]
    fn test_entity_hit_returns_whole_corpus() {
        let result = kb().search("Siapa CEO perusahaan ini?", &entities(&[("SATNUSA", "ORG")]));
        assert_eq!(result, CORPUS);
    }

    #[test]
    fn test_any_entity_hit_is_enough() {
        let result = kb().search(
            "unrelated",
            &entities(&[("Jakarta", "LOC"), ("alex sirait", "PERSON")]),
        );
        assert_eq!(result, CORPUS);
    }

    #[test]
    fn test_query_containment_without_entities() {
        assert_eq!(kb().search("divisi terbesar", &EntityMap::new()), CORPUS);
    }

    #[test]
    fn test_partial_words_do_not_match() {
        // Containment is on the whole query string, not its tokens.
        let result = kb().search("Siapa CEO Satnusa?", &EntityMap::new());
        assert_eq!(result, DEFAULT_NOT_FOUND);
    }

    #[test]
    fn test_empty_needle_is_contained() {
        assert_eq!(kb().search("", &EntityMap::new()), CORPUS);
        assert_eq!(kb().search("unrelated", &entities(&[("", "MISC")])), CORPUS);
    }

    #[test]
    fn test_needles_are_not_trimmed() {
        // "Satnusa" is followed by a newline in the corpus, not a space.
        assert_eq!(kb().search("Satnusa ", &EntityMap::new()), DEFAULT_NOT_FOUND);
        assert_eq!(kb().search(" Satnusa", &EntityMap::new()), CORPUS);
    }

    #[tokio::test]
    async fn test_load_rejects_unsupported_and_empty() {
        let dir = std::env::temp_dir();
        let pdf = dir.join(format!("corpus-{}.pdf", std::process::id()));
        assert!(KnowledgeBase::load(&pdf, DEFAULT_NOT_FOUND).await.is_err());

        let empty = dir.join(format!("corpus-empty-{}.md", std::process::id()));
        tokio::fs::write(&empty, "   \n").await.unwrap();
        let result = KnowledgeBase::load(&empty, DEFAULT_NOT_FOUND).await;
        tokio::fs::remove_file(&empty).await.ok();
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_load_trims() {
        let path = std::env::temp_dir().join(format!("corpus-{}.txt", std::process::id()));
        tokio::fs::write(&path, format!("\n\n{}\n", CORPUS)).await.unwrap();
        let kb = KnowledgeBase::load(&path, "none").await.unwrap();
        tokio::fs::remove_file(&path).await.ok();

        assert_eq!(kb.corpus(), CORPUS);
        assert_eq!(kb.not_found(), "none");
    }
}
