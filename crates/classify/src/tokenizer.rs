use std::collections::HashMap;
use unicode_segmentation::UnicodeSegmentation;

pub const PAD_TOKEN: &str = "[PAD]";
pub const UNK_TOKEN: &str = "[UNK]";
pub const CLS_TOKEN: &str = "[CLS]";
pub const SEP_TOKEN: &str = "[SEP]";

pub const PAD_ID: u32 = 0;
pub const UNK_ID: u32 = 1;
pub const CLS_ID: u32 = 2;
pub const SEP_ID: u32 = 3;

/// Special tokens, in id order. Every vocabulary starts with these.
pub const SPECIAL_TOKENS: [&str; 4] = [PAD_TOKEN, UNK_TOKEN, CLS_TOKEN, SEP_TOKEN];

/// Smallest usable sequence: `[CLS]`, one word, `[SEP]`.
pub const MIN_MAX_LENGTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Encoding {
    pub ids: Vec<u32>,
    /// 1 for real tokens (including `[CLS]`/`[SEP]`), 0 for padding.
    pub attention_mask: Vec<u8>,
    /// Whether words were dropped to fit `max_length`.
    pub truncated: bool,
}

impl Encoding {
    /// Ids of the word tokens, without specials or padding.
    pub fn word_ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.ids
            .iter()
            .zip(&self.attention_mask)
            .filter(|(id, mask)| **mask == 1 && **id != CLS_ID && **id != SEP_ID)
            .map(|(id, _)| *id)
    }
}

/// Word-level tokenizer: lowercased Unicode words looked up in a fixed
/// vocabulary, wrapped in `[CLS]`/`[SEP]`, truncated and padded to
/// `max_length`.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    vocab: HashMap<String, u32>,
    max_length: usize,
}

impl Tokenizer {
    /// `tokens` is the full vocabulary in id order, specials included.
    pub fn new(tokens: &[String], max_length: usize) -> Self {
        let vocab = tokens
            .iter()
            .enumerate()
            .map(|(id, token)| (token.clone(), id as u32))
            .collect();

        Self {
            vocab,
            max_length: max_length.max(MIN_MAX_LENGTH),
        }
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }

    /// Split text into lowercased words.
    pub fn words(text: &str) -> Vec<String> {
        text.unicode_words().map(|w| w.to_lowercase()).collect()
    }

    pub fn encode(&self, text: &str) -> Encoding {
        let words = Self::words(text);
        let budget = self.max_length - 2;
        let truncated = words.len() > budget;

        let mut ids = Vec::with_capacity(self.max_length);
        ids.push(CLS_ID);
        ids.extend(
            words
                .iter()
                .take(budget)
                .map(|w| self.vocab.get(w).copied().unwrap_or(UNK_ID)),
        );
        ids.push(SEP_ID);

        let mut attention_mask = vec![1u8; ids.len()];
        ids.resize(self.max_length, PAD_ID);
        attention_mask.resize(self.max_length, 0);

        Encoding {
            ids,
            attention_mask,
            truncated,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(max_length: usize) -> Tokenizer {
        let mut tokens: Vec<String> = SPECIAL_TOKENS.iter().map(|t| t.to_string()).collect();
        tokens.extend(["satnusa", "ceo"].iter().map(|t| t.to_string()));
        Tokenizer::new(&tokens, max_length)
    }

    #[test]
    fn test_encode_pads_to_max_length() {
        let encoding = tokenizer(8).encode("Siapa CEO Satnusa?");

        assert_eq!(encoding.ids, vec![CLS_ID, UNK_ID, 5, 4, SEP_ID, PAD_ID, PAD_ID, PAD_ID]);
        assert_eq!(encoding.attention_mask, vec![1, 1, 1, 1, 1, 0, 0, 0]);
        assert!(!encoding.truncated);
        assert_eq!(encoding.word_ids().collect::<Vec<_>>(), vec![UNK_ID, 5, 4]);
    }

    #[test]
    fn test_encode_truncates_long_input() {
        let encoding = tokenizer(4).encode("satnusa ceo satnusa ceo");

        assert_eq!(encoding.ids, vec![CLS_ID, 4, 5, SEP_ID]);
        assert!(encoding.truncated);
    }

    #[test]
    fn test_empty_text() {
        let encoding = tokenizer(4).encode("");
        assert_eq!(encoding.ids, vec![CLS_ID, SEP_ID, PAD_ID, PAD_ID]);
        assert_eq!(encoding.word_ids().count(), 0);
    }

    #[test]
    fn test_max_length_has_a_floor() {
        assert_eq!(tokenizer(0).max_length(), MIN_MAX_LENGTH);
    }
}
