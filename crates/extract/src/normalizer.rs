use regex::Regex;
use std::sync::LazyLock;

use crate::schema::{EntityMap, EntityMatch};

static EDGE_PUNCTUATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[\s.,!?;:'"()\[\]*]+|[\s.,!?;:'"()\[\]*]+$"#).expect("edge punctuation regex")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

const DEFAULT_LABEL: &str = "MISC";

/// Cleans entity surface forms so that the same mention coming from
/// different extractors ends up under the same key.
///
/// Case is preserved: knowledge lookups are case-insensitive anyway and the
/// original casing is what callers want to see.
#[derive(Debug, Default, Clone, Copy)]
pub struct EntityNormalizer;

impl EntityNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Trim surrounding punctuation and collapse inner whitespace.
    /// Returns `None` when nothing is left.
    pub fn normalize(&self, text: &str) -> Option<String> {
        let trimmed = EDGE_PUNCTUATION.replace_all(text, "");
        let collapsed = WHITESPACE.replace_all(&trimmed, " ");

        if collapsed.is_empty() {
            None
        } else {
            Some(collapsed.into_owned())
        }
    }

    pub fn normalize_label(&self, label: &str) -> String {
        let label = label.trim().to_uppercase();
        if label.is_empty() {
            DEFAULT_LABEL.to_string()
        } else {
            label
        }
    }

    /// Fold raw matches into an [`EntityMap`], dropping empty mentions.
    pub fn collect<I>(&self, matches: I) -> EntityMap
    where
        I: IntoIterator<Item = EntityMatch>,
    {
        let mut entities = EntityMap::new();
        for m in matches {
            if let Some(text) = self.normalize(&m.text) {
                entities.insert(text, self.normalize_label(&m.label));
            }
        }
        entities
    }
}
