use async_trait::async_trait;
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::normalizer::EntityNormalizer;
use crate::schema::{EntityMap, EntityMatch, ExtractionError};
use crate::EntityExtractor;

static PROPER_PHRASE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b\p{Lu}[\p{L}\p{N}&-]*(?:\s+\p{Lu}[\p{L}\p{N}&-]*)*")
        .expect("proper phrase regex")
});

static EMAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\w.+-]+@[\w-]+(?:\.[\w-]+)+").expect("email regex")
});

static MONEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:rp\.?|idr|usd|\$)\s?\d+(?:[.,]\d+)*(?:\s?(?:triliun|miliar|juta|ribu|billion|million|thousand))?")
        .expect("money regex")
});

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d+(?:[.,]\d+)?\s?%").expect("percent regex"));

static DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b\d{1,2}\s+(?:januari|februari|maret|april|mei|juni|juli|agustus|september|oktober|november|desember|january|february|march|may|june|july|august|october|december)\s+\d{4}\b|\b(?:19|20)\d{2}\b",
    )
    .expect("date regex")
});

/// Capitalised words that open questions or sentences and are not names.
const SENTENCE_WORDS: &[&str] = &[
    "siapa", "apa", "apakah", "berapa", "bagaimana", "kapan", "dimana", "di", "mengapa",
    "kenapa", "tolong", "jelaskan", "sebutkan", "ceritakan", "saya", "aku", "kamu", "bisakah",
    "what", "who", "how", "when", "where", "why", "which", "the", "a", "an", "is", "are", "do",
    "does", "can", "could", "please", "tell", "i", "you",
];

/// Regex-based extractor. No model, no network: useful when no LLM is
/// configured for extraction and as a deterministic baseline in tests.
pub struct PatternEntityExtractor {
    normalizer: EntityNormalizer,
    sentence_words: HashSet<&'static str>,
}

impl PatternEntityExtractor {
    pub fn new() -> Self {
        Self {
            normalizer: EntityNormalizer::new(),
            sentence_words: SENTENCE_WORDS.iter().copied().collect(),
        }
    }

    /// Synchronous core of [`EntityExtractor::extract`].
    pub fn extract_sync(&self, text: &str) -> EntityMap {
        let mut matches = Vec::new();

        // Generic proper-noun runs go first so the specific labels below
        // overwrite them when both match the same text.
        for phrase in PROPER_PHRASE.find_iter(text) {
            for run in self.split_sentence_words(phrase.as_str()) {
                matches.push(EntityMatch {
                    text: run,
                    label: "PROPER".to_string(),
                });
            }
        }

        for (pattern, label) in [
            (&*DATE, "DATE"),
            (&*MONEY, "MONEY"),
            (&*PERCENT, "PERCENT"),
            (&*EMAIL, "EMAIL"),
        ] {
            matches.extend(pattern.find_iter(text).map(|m| EntityMatch {
                text: m.as_str().to_string(),
                label: label.to_string(),
            }));
        }

        self.normalizer.collect(matches)
    }

    /// Break a capitalised run on words like "Siapa" so that
    /// "Siapa CEO Satnusa" yields "CEO Satnusa".
    fn split_sentence_words(&self, phrase: &str) -> Vec<String> {
        let mut runs = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for word in phrase.split_whitespace() {
            if self.sentence_words.contains(word.to_lowercase().as_str()) {
                if !current.is_empty() {
                    runs.push(current.join(" "));
                    current.clear();
                }
            } else {
                current.push(word);
            }
        }
        if !current.is_empty() {
            runs.push(current.join(" "));
        }

        runs
    }
}

impl Default for PatternEntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityExtractor for PatternEntityExtractor {
    async fn extract(&self, text: &str) -> Result<EntityMap, ExtractionError> {
        Ok(self.extract_sync(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_words_are_not_entities() {
        let extractor = PatternEntityExtractor::new();
        let entities = extractor.extract_sync("Siapa CEO Satnusa?");

        assert_eq!(entities.len(), 1);
        assert_eq!(entities["CEO Satnusa"], "PROPER");
    }

    #[test]
    fn test_specific_labels() {
        let extractor = PatternEntityExtractor::new();
        let entities = extractor.extract_sync(
            "Satnusa berdiri 10 Januari 2002, pendapatan Rp 2 Triliun, tumbuh 12%. Kontak dina.pratama@satnusa.com",
        );

        assert_eq!(entities["10 Januari 2002"], "DATE");
        assert_eq!(entities["Rp 2 Triliun"], "MONEY");
        assert_eq!(entities["12%"], "PERCENT");
        assert_eq!(entities["dina.pratama@satnusa.com"], "EMAIL");
        assert_eq!(entities["Satnusa"], "PROPER");
    }

    #[test]
    fn test_lowercase_text_has_no_entities() {
        let extractor = PatternEntityExtractor::new();
        assert!(extractor.extract_sync("berapa jumlah karyawan").is_empty());
        assert!(extractor.extract_sync("").is_empty());
    }

    #[tokio::test]
    async fn test_trait_never_fails() {
        let extractor = PatternEntityExtractor::new();
        let entities = extractor.extract("Who is Ali Sadikin?").await.unwrap();
        assert_eq!(entities["Ali Sadikin"], "PROPER");
    }
}
