use anyhow::{Context, Result};
use classify::{DEFAULT_THRESHOLD, FitOptions, LinearSequenceModel, load_examples};
use std::path::PathBuf;

/// Usage: train_classifier [EXAMPLES_JSON] [OUTPUT_JSON]
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let examples_path = PathBuf::from(
        args.next()
            .unwrap_or_else(|| "data/relevance_examples.json".to_string()),
    );
    let output_path = PathBuf::from(
        args.next()
            .unwrap_or_else(|| "data/relevance_model.json".to_string()),
    );

    let examples = load_examples(&examples_path).await?;
    let relevant = examples.iter().filter(|e| e.relevant).count();
    tracing::info!(
        examples = examples.len(),
        relevant,
        general = examples.len() - relevant,
        "training relevance classifier"
    );

    let model = LinearSequenceModel::fit(&examples, &FitOptions::default())
        .context("Failed to fit relevance classifier")?;

    let accuracy = model.accuracy(&examples, DEFAULT_THRESHOLD);
    tracing::info!(
        accuracy,
        threshold = DEFAULT_THRESHOLD,
        vocab = model.weights().vocab.len(),
        "training finished"
    );

    model.save(&output_path).await?;
    tracing::info!(path = ?output_path, "weights written");

    Ok(())
}
