pub mod classifier;
pub mod model;
pub mod tokenizer;

pub use classifier::{
    ClassifierError, DEFAULT_THRESHOLD, RelevanceClassifier, RelevanceResult, SequenceClassifier,
    softmax,
};
pub use model::{FitOptions, LabeledExample, LinearSequenceModel, ModelWeights, load_examples};
pub use tokenizer::{Encoding, Tokenizer};
