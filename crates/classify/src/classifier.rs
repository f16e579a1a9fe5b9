use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;

/// Default cut-off on the relevant-class probability.
pub const DEFAULT_THRESHOLD: f32 = 0.7;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("invalid classifier model: {0}")]
    InvalidModel(String),
    #[error("classifier produced non-finite logits")]
    NonFinite,
    #[error("inference failed: {0}")]
    Inference(String),
}

/// A binary sequence classifier. Index 0 is "irrelevant", index 1 "relevant".
///
/// Inference is CPU-bound and runs inline on the caller's task.
pub trait SequenceClassifier: Send + Sync {
    fn logits(&self, text: &str) -> Result<[f32; 2], ClassifierError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelevanceResult {
    pub score: f32,
    pub is_relevant: bool,
}

impl RelevanceResult {
    /// `is_relevant` is exactly `score >= threshold`.
    pub fn from_score(score: f32, threshold: f32) -> Self {
        Self {
            score,
            is_relevant: score >= threshold,
        }
    }

    /// What a failed inference reports.
    pub fn not_relevant() -> Self {
        Self {
            score: 0.0,
            is_relevant: false,
        }
    }
}

/// Numerically stable two-class softmax.
pub fn softmax(logits: [f32; 2]) -> [f32; 2] {
    let max = logits[0].max(logits[1]);
    let e0 = (logits[0] - max).exp();
    let e1 = (logits[1] - max).exp();
    let sum = e0 + e1;
    [e0 / sum, e1 / sum]
}

/// Scores whether text belongs to the target domain.
#[derive(Clone)]
pub struct RelevanceClassifier {
    model: Arc<dyn SequenceClassifier>,
    threshold: f32,
}

impl RelevanceClassifier {
    pub fn new(model: Arc<dyn SequenceClassifier>, threshold: f32) -> Self {
        Self { model, threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Never fails: any inference error is reported as score 0.0, not relevant.
    pub fn classify(&self, text: &str) -> RelevanceResult {
        match self.try_classify(text) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "relevance inference failed, treating query as not relevant");
                RelevanceResult::not_relevant()
            }
        }
    }

    fn try_classify(&self, text: &str) -> Result<RelevanceResult, ClassifierError> {
        let logits = self.model.logits(text)?;
        let score = softmax(logits)[1];

        if !score.is_finite() {
            return Err(ClassifierError::NonFinite);
        }

        Ok(RelevanceResult::from_score(score.clamp(0.0, 1.0), self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedLogits([f32; 2]);

    impl SequenceClassifier for FixedLogits {
        fn logits(&self, _text: &str) -> Result<[f32; 2], ClassifierError> {
            Ok(self.0)
        }
    }

    struct Broken;

    impl SequenceClassifier for Broken {
        fn logits(&self, _text: &str) -> Result<[f32; 2], ClassifierError> {
            Err(ClassifierError::Inference("model not loaded".to_string()))
        }
    }

    #[test]
    fn test_threshold_boundary_is_relevant() {
        assert!(RelevanceResult::from_score(0.7, 0.7).is_relevant);
        assert!(!RelevanceResult::from_score(0.699_999, 0.7).is_relevant);
        assert!(RelevanceResult::from_score(1.0, 0.7).is_relevant);
    }

    #[test]
    fn test_softmax() {
        let p = softmax([0.0, 0.0]);
        assert_eq!(p, [0.5, 0.5]);

        let p = softmax([1000.0, 0.0]);
        assert!(p[0] > 0.999 && p[1].is_finite());
    }

    #[test]
    fn test_classify_scores_relevant_class() {
        let classifier = RelevanceClassifier::new(Arc::new(FixedLogits([0.0, 9f32.ln()])), 0.7);
        let result = classifier.classify("Siapa CEO Satnusa?");

        assert!((result.score - 0.9).abs() < 1e-5);
        assert!(result.is_relevant);
    }

    #[test]
    fn test_inference_error_is_fail_safe() {
        let classifier = RelevanceClassifier::new(Arc::new(Broken), 0.0);
        let result = classifier.classify("anything");

        // Even with a zero threshold, failures never claim relevance.
        assert_eq!(result, RelevanceResult::not_relevant());
    }

    #[test]
    fn test_nan_logits_are_fail_safe() {
        let classifier = RelevanceClassifier::new(Arc::new(FixedLogits([f32::NAN, 0.0])), 0.5);
        assert_eq!(classifier.classify("x"), RelevanceResult::not_relevant());
    }
}
