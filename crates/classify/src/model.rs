use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::classifier::{ClassifierError, SequenceClassifier, softmax};
use crate::tokenizer::{Encoding, SPECIAL_TOKENS, Tokenizer};

/// One training sentence with its label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabeledExample {
    pub text: String,
    pub relevant: bool,
}

#[derive(Debug, Clone)]
pub struct FitOptions {
    pub epochs: usize,
    pub learning_rate: f32,
    pub l2: f32,
    pub max_length: usize,
    pub seed: u64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            epochs: 60,
            learning_rate: 0.5,
            l2: 1e-4,
            max_length: 512,
            seed: 42,
        }
    }
}

/// Serialized form of the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelWeights {
    pub max_length: usize,
    pub vocab: Vec<String>,
    /// One `[irrelevant, relevant]` pair per vocabulary entry.
    pub weights: Vec<[f32; 2]>,
    pub bias: [f32; 2],
}

/// Two-class linear model over mean-pooled word weights.
#[derive(Debug, Clone)]
pub struct LinearSequenceModel {
    tokenizer: Tokenizer,
    weights: ModelWeights,
}

impl LinearSequenceModel {
    pub fn from_weights(weights: ModelWeights) -> Result<Self, ClassifierError> {
        if weights.vocab.len() != weights.weights.len() {
            return Err(ClassifierError::InvalidModel(format!(
                "vocabulary has {} entries but there are {} weight rows",
                weights.vocab.len(),
                weights.weights.len()
            )));
        }
        let specials_ok = SPECIAL_TOKENS
            .iter()
            .zip(&weights.vocab)
            .all(|(expected, actual)| expected == actual);
        if weights.vocab.len() < SPECIAL_TOKENS.len() || !specials_ok {
            return Err(ClassifierError::InvalidModel(
                "vocabulary must start with [PAD], [UNK], [CLS], [SEP]".to_string(),
            ));
        }

        let tokenizer = Tokenizer::new(&weights.vocab, weights.max_length);
        Ok(Self { tokenizer, weights })
    }

    /// Fit by softmax regression with SGD. Shuffling is seeded so the same
    /// examples always give the same model.
    pub fn fit(examples: &[LabeledExample], options: &FitOptions) -> Result<Self, ClassifierError> {
        if examples.is_empty() {
            return Err(ClassifierError::InvalidModel("no training examples".to_string()));
        }
        if !examples.iter().any(|e| e.relevant) || examples.iter().all(|e| e.relevant) {
            return Err(ClassifierError::InvalidModel(
                "training examples must contain both classes".to_string(),
            ));
        }

        let words: BTreeSet<String> = examples
            .iter()
            .flat_map(|e| Tokenizer::words(&e.text))
            .collect();
        let vocab: Vec<String> = SPECIAL_TOKENS
            .iter()
            .map(|t| t.to_string())
            .chain(words)
            .collect();

        let mut model = Self::from_weights(ModelWeights {
            max_length: options.max_length,
            weights: vec![[0.0; 2]; vocab.len()],
            vocab,
            bias: [0.0; 2],
        })?;

        let encoded: Vec<(Vec<(u32, f32)>, usize)> = examples
            .iter()
            .map(|e| {
                let encoding = model.tokenizer.encode(&e.text);
                (pooled_counts(&encoding), usize::from(e.relevant))
            })
            .collect();

        let mut order: Vec<usize> = (0..encoded.len()).collect();
        let mut rng = StdRng::seed_from_u64(options.seed);

        for _ in 0..options.epochs {
            order.shuffle(&mut rng);
            for &i in &order {
                let (features, label) = &encoded[i];
                model.sgd_step(features, *label, options);
            }
        }

        Ok(model)
    }

    fn sgd_step(&mut self, features: &[(u32, f32)], label: usize, options: &FitOptions) {
        let probs = softmax(self.logits_from_features(features));
        let lr = options.learning_rate;

        for class in 0..2 {
            let target = if class == label { 1.0 } else { 0.0 };
            let grad = probs[class] - target;

            self.weights.bias[class] -= lr * grad;
            for &(id, weight) in features {
                let w = &mut self.weights.weights[id as usize][class];
                *w -= lr * (grad * weight + options.l2 * *w);
            }
        }
    }

    fn logits_from_features(&self, features: &[(u32, f32)]) -> [f32; 2] {
        let mut logits = self.weights.bias;
        for &(id, weight) in features {
            let row = self.weights.weights[id as usize];
            logits[0] += row[0] * weight;
            logits[1] += row[1] * weight;
        }
        logits
    }

    pub fn encode(&self, text: &str) -> Encoding {
        self.tokenizer.encode(text)
    }

    pub fn weights(&self) -> &ModelWeights {
        &self.weights
    }

    /// Share of examples the model labels correctly at `threshold`.
    pub fn accuracy(&self, examples: &[LabeledExample], threshold: f32) -> f32 {
        if examples.is_empty() {
            return 0.0;
        }
        let correct = examples
            .iter()
            .filter(|e| {
                let score = softmax(self.logits_for(&e.text))[1];
                (score >= threshold) == e.relevant
            })
            .count();
        correct as f32 / examples.len() as f32
    }

    fn logits_for(&self, text: &str) -> [f32; 2] {
        self.logits_from_features(&pooled_counts(&self.tokenizer.encode(text)))
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let json = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read classifier weights: {:?}", path))?;
        let weights: ModelWeights =
            serde_json::from_str(&json).context("Failed to parse classifier weights")?;
        Ok(Self::from_weights(weights)?)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.weights)?;
        tokio::fs::write(path, json)
            .await
            .with_context(|| format!("Failed to write classifier weights: {:?}", path))?;
        Ok(())
    }
}

impl SequenceClassifier for LinearSequenceModel {
    fn logits(&self, text: &str) -> Result<[f32; 2], ClassifierError> {
        let logits = self.logits_for(text);
        if logits.iter().all(|l| l.is_finite()) {
            Ok(logits)
        } else {
            Err(ClassifierError::NonFinite)
        }
    }
}

/// Mean pooling: each distinct word id weighted by its share of the words.
fn pooled_counts(encoding: &Encoding) -> Vec<(u32, f32)> {
    let mut counts: HashMap<u32, usize> = HashMap::new();
    let mut total = 0usize;
    for id in encoding.word_ids() {
        *counts.entry(id).or_default() += 1;
        total += 1;
    }

    let mut pooled: Vec<(u32, f32)> = counts
        .into_iter()
        .map(|(id, count)| (id, count as f32 / total as f32))
        .collect();
    pooled.sort_by_key(|(id, _)| *id);
    pooled
}

/// Read labeled examples from a JSON array file.
pub async fn load_examples(path: &Path) -> Result<Vec<LabeledExample>> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read training examples: {:?}", path))?;
    serde_json::from_str(&json).context("Failed to parse training examples")
}
