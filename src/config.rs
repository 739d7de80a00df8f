use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound for `llm.max_retries` and `embeddings.max_retries`
const MAX_RETRIES: usize = 10;

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub graphrag: GraphragConfig,
    #[serde(default)]
    pub medical: MedicalConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub web: WebConfig,
}

/// Process-wide settings
#[derive(Debug, Clone, Deserialize)]
pub struct GraphragConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GraphragConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

/// DBpedia medical knowledge graph settings
#[derive(Debug, Clone, Deserialize)]
pub struct MedicalConfig {
    #[serde(default = "default_sparql_endpoint")]
    pub sparql_endpoint: String,
    /// LIMIT clause of the entity query
    #[serde(default = "default_result_limit")]
    pub result_limit: usize,
    #[serde(default = "default_sparql_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_search_terms")]
    pub search_terms: Vec<String>,
    #[serde(default = "default_medical_query")]
    pub demo_query: String,
}

impl Default for MedicalConfig {
    fn default() -> Self {
        Self {
            sparql_endpoint: default_sparql_endpoint(),
            result_limit: default_result_limit(),
            timeout_secs: default_sparql_timeout(),
            search_terms: default_search_terms(),
            demo_query: default_medical_query(),
        }
    }
}

/// Chat-completion provider settings
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_llm_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_llm_retries")]
    pub max_retries: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            model: default_llm_model(),
            api_key_env: default_llm_api_key_env(),
            timeout_secs: default_llm_timeout(),
            max_retries: default_llm_retries(),
        }
    }
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embeddings_base_url")]
    pub base_url: String,
    #[serde(default = "default_embeddings_model")]
    pub model: String,
    #[serde(default = "default_embeddings_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    #[serde(default = "default_embeddings_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_embeddings_retries")]
    pub max_retries: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            base_url: default_embeddings_base_url(),
            model: default_embeddings_model(),
            api_key_env: default_embeddings_api_key_env(),
            batch_size: default_batch_size(),
            dimensions: default_dimensions(),
            cache_capacity: default_cache_capacity(),
            timeout_secs: default_embeddings_timeout(),
            max_retries: default_embeddings_retries(),
        }
    }
}

/// Web graph retriever settings
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    #[serde(default = "default_urls")]
    pub urls: Vec<String>,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_preview_chars")]
    pub preview_chars: usize,
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_web_query")]
    pub demo_query: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            urls: default_urls(),
            fetch_timeout_secs: default_fetch_timeout(),
            preview_chars: default_preview_chars(),
            default_top_k: default_top_k(),
            demo_query: default_web_query(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sparql_endpoint() -> String {
    "https://dbpedia.org/sparql".to_string()
}

fn default_result_limit() -> usize {
    10
}

fn default_sparql_timeout() -> u64 {
    60
}

fn default_search_terms() -> Vec<String> {
    vec![
        "type 2 diabetes".to_string(),
        "insulin".to_string(),
        "pancreas".to_string(),
    ]
}

fn default_medical_query() -> String {
    "What is the relationship between insulin and diabetes, and how does it affect the pancreas?"
        .to_string()
}

fn default_llm_base_url() -> String {
    "https://api.groq.com/openai/v1".to_string()
}

fn default_llm_model() -> String {
    "mixtral-8x7b-32768".to_string()
}

fn default_llm_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_llm_retries() -> usize {
    2
}

fn default_embeddings_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embeddings_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embeddings_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_dimensions() -> usize {
    1536
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_embeddings_timeout() -> u64 {
    30
}

fn default_embeddings_retries() -> usize {
    3
}

fn default_urls() -> Vec<String> {
    vec![
        "https://www.example.com".to_string(),
        "https://www.python.org".to_string(),
        "https://www.github.com".to_string(),
    ]
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_preview_chars() -> usize {
    500
}

fn default_top_k() -> usize {
    3
}

fn default_web_query() -> String {
    "What is Python programming?".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in GRAPHRAG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("GRAPHRAG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml(&config_str)
            .with_context(|| format!("Invalid config file: {}", config_path.display()))?;

        Ok(config)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(config_str: &str) -> Result<Self> {
        let config: Config = toml::from_str(config_str).context("Failed to parse config.toml")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        for (name, endpoint) in [
            ("medical.sparql_endpoint", &self.medical.sparql_endpoint),
            ("llm.base_url", &self.llm.base_url),
            ("embeddings.base_url", &self.embeddings.base_url),
        ] {
            url::Url::parse(endpoint)
                .with_context(|| format!("{} is not a valid URL: {}", name, endpoint))?;
        }

        if self.medical.result_limit == 0 {
            anyhow::bail!("medical.result_limit must be greater than 0");
        }

        if self.web.default_top_k == 0 {
            anyhow::bail!("web.default_top_k must be greater than 0");
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.embeddings.batch_size == 0 {
            anyhow::bail!("embeddings.batch_size must be greater than 0");
        }

        if self.medical.timeout_secs == 0
            || self.llm.timeout_secs == 0
            || self.embeddings.timeout_secs == 0
            || self.web.fetch_timeout_secs == 0
        {
            anyhow::bail!("timeouts must be greater than 0 seconds");
        }

        if self.llm.max_retries > MAX_RETRIES || self.embeddings.max_retries > MAX_RETRIES {
            anyhow::bail!("max_retries must be at most {}", MAX_RETRIES);
        }

        Ok(())
    }
}

impl MedicalConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        read_api_key(&self.api_key_env)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EmbeddingsConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String> {
        read_api_key(&self.api_key_env)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl WebConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

fn read_api_key(var: &str) -> Result<String> {
    std::env::var(var).with_context(|| {
        format!(
            "Environment variable {} not set. Set it in your .env file or as an environment variable.",
            var
        )
    })
}
