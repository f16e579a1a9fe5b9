use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub ollama: OllamaConfig,
    pub relevance: RelevanceConfig,
    pub knowledge: KnowledgeConfig,
    pub concurrency: ConcurrencyConfig,
    pub cache: CacheConfig,
    pub log_level: String,
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub base_url: String,
    pub generation_model: String,
    pub extraction_model: String,
    /// Only ever supplied through the environment.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub entity_extractor: ExtractorKind,
    pub intent_language: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum ExtractorKind {
    Llm,     // Ask the extraction model for entities
    Pattern, // Regex heuristics, no model call
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    pub threshold: f32,
    pub max_length: usize,
    pub model_path: Option<PathBuf>,
    pub examples_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub corpus_path: PathBuf,
    pub not_found: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Unset means no process-wide cap on generation calls.
    pub max_concurrent_llm_calls: Option<usize>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_entries: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            ollama: OllamaConfig::default(),
            relevance: RelevanceConfig::default(),
            knowledge: KnowledgeConfig::default(),
            concurrency: ConcurrencyConfig::default(),
            cache: CacheConfig::default(),
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
        }
    }
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            generation_model: "llama3".to_string(),
            extraction_model: "llama3".to_string(),
            api_key: None,
            entity_extractor: ExtractorKind::Llm,
            intent_language: "id".to_string(),
        }
    }
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        Self {
            threshold: classify::DEFAULT_THRESHOLD,
            max_length: 512,
            model_path: None,
            examples_path: PathBuf::from("data/relevance_examples.json"),
        }
    }
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            corpus_path: PathBuf::from("data/satnusa.md"),
            not_found: query::DEFAULT_NOT_FOUND.to_string(),
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            max_concurrent_llm_calls: None,
            request_timeout_secs: 60,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_entries: 10000,
        }
    }
}

impl AppConfig {
    /// Defaults, then the JSON file named by `ROUTER_CONFIG`, then
    /// environment overrides.
    pub fn load() -> Result<Self> {
        let mut config = match std::env::var("ROUTER_CONFIG") {
            Ok(path) => {
                let json = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config file: {}", path))?;
                serde_json::from_str(&json)
                    .with_context(|| format!("Failed to parse config file: {}", path))?
            }
            Err(_) => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("ROUTER_BIND_ADDR") {
            self.server.bind_addr = v;
        }
        if let Some(v) = lookup("OLLAMA_BASE_URL") {
            self.ollama.base_url = v;
        }
        if let Some(v) = lookup("OLLAMA_MODEL") {
            self.ollama.generation_model = v;
        }
        if let Some(v) = lookup("OLLAMA_EXTRACTION_MODEL") {
            self.ollama.extraction_model = v;
        }
        if let Some(v) = lookup("OLLAMA_API_KEY") {
            self.ollama.api_key = Some(v);
        }
        if let Some(v) = lookup("ENTITY_EXTRACTOR") {
            self.ollama.entity_extractor = match v.to_lowercase().as_str() {
                "llm" => ExtractorKind::Llm,
                "pattern" => ExtractorKind::Pattern,
                other => anyhow::bail!("ENTITY_EXTRACTOR must be llm or pattern, got {}", other),
            };
        }
        if let Some(v) = lookup("RELEVANCE_THRESHOLD") {
            self.relevance.threshold = parse_var("RELEVANCE_THRESHOLD", &v)?;
        }
        if let Some(v) = lookup("RELEVANCE_MODEL_PATH") {
            self.relevance.model_path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("RELEVANCE_EXAMPLES_PATH") {
            self.relevance.examples_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("KNOWLEDGE_CORPUS_PATH") {
            self.knowledge.corpus_path = PathBuf::from(v);
        }
        if let Some(v) = lookup("MAX_CONCURRENT_LLM_CALLS") {
            self.concurrency.max_concurrent_llm_calls =
                Some(parse_var("MAX_CONCURRENT_LLM_CALLS", &v)?);
        }
        if let Some(v) = lookup("LLM_TIMEOUT_SECS") {
            self.concurrency.request_timeout_secs = parse_var("LLM_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = lookup("LOG_LEVEL") {
            self.log_level = v;
        }
        if let Some(v) = lookup("LOG_FORMAT") {
            self.log_format = match v.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                "pretty" | "text" => LogFormat::Pretty,
                other => anyhow::bail!("LOG_FORMAT must be json or pretty, got {}", other),
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.relevance.threshold) {
            anyhow::bail!(
                "relevance threshold must be within [0, 1], got {}",
                self.relevance.threshold
            );
        }
        if self.relevance.max_length < 3 {
            anyhow::bail!("relevance max_length must be at least 3");
        }
        if self.concurrency.max_concurrent_llm_calls == Some(0) {
            anyhow::bail!("max_concurrent_llm_calls must be at least 1");
        }
        Ok(())
    }
}

fn parse_var<T>(name: &str, value: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    value
        .trim()
        .parse()
        .with_context(|| format!("Invalid value for {}: {:?}", name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.relevance.threshold, 0.7);
        assert_eq!(config.relevance.max_length, 512);
        assert!(config.ollama.api_key.is_none());
        assert_eq!(config.concurrency.max_concurrent_llm_calls, None);
    }

    #[test]
    fn test_generation_cap_is_opt_in() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup(&[("MAX_CONCURRENT_LLM_CALLS", "4")]))
            .unwrap();
        assert_eq!(config.concurrency.max_concurrent_llm_calls, Some(4));

        config.concurrency.max_concurrent_llm_calls = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config
            .apply_overrides(lookup(&[
                ("OLLAMA_MODEL", "mistral"),
                ("OLLAMA_API_KEY", "secret"),
                ("RELEVANCE_THRESHOLD", "0.55"),
                ("ENTITY_EXTRACTOR", "Pattern"),
                ("LOG_FORMAT", "json"),
            ]))
            .unwrap();

        assert_eq!(config.ollama.generation_model, "mistral");
        assert_eq!(config.ollama.api_key.as_deref(), Some("secret"));
        assert_eq!(config.relevance.threshold, 0.55);
        assert_eq!(config.ollama.entity_extractor, ExtractorKind::Pattern);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_bad_numeric_override_is_an_error() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(lookup(&[("RELEVANCE_THRESHOLD", "high")]))
            .unwrap_err();
        assert!(err.to_string().contains("RELEVANCE_THRESHOLD"));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = AppConfig::default();
        config.relevance.threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let json = r#"{"relevance": {"threshold": 0.8}, "log_format": "json"}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.relevance.threshold, 0.8);
        assert_eq!(config.relevance.max_length, 512);
        assert_eq!(config.server.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_api_key_is_never_serialized() {
        let mut config = AppConfig::default();
        config.ollama.api_key = Some("secret".to_string());
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("secret"));
    }
}
