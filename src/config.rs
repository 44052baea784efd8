use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            fetcher: FetcherConfig::default(),
            filter: FilterConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            server: ServerConfig::default(),
            sources: SourcesConfig::default(),
        }
    }
}

/// Where the paired on-disk index artifacts live.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct StoreConfig {
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
        }
    }
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("./data/knowledge")
}

/// Outbound crawl settings. Batch size and delay are a politeness
/// trade-off against third-party hosts, not a correctness requirement.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FetcherConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            timeout_secs: default_fetch_timeout_secs(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_batch_size() -> usize {
    3
}
fn default_batch_delay_ms() -> u64 {
    1000
}
fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_max_redirects() -> usize {
    5
}
fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

/// Relevance filter thresholds. The keyword threshold is a fixed constant
/// in the original tuning; kept configurable rather than re-derived.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct FilterConfig {
    #[serde(default = "default_min_content_length")]
    pub min_content_length: usize,
    #[serde(default = "default_min_keyword_matches")]
    pub min_keyword_matches: usize,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_content_length: default_min_content_length(),
            min_keyword_matches: default_min_keyword_matches(),
        }
    }
}

fn default_min_content_length() -> usize {
    500
}
fn default_min_keyword_matches() -> usize {
    2
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_embedding_dims")]
    pub dims: usize,
    #[serde(default = "default_embed_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_embed_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_embedding_dims(),
            batch_size: default_embed_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_embed_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_embedding_dims() -> usize {
    1536
}
fn default_embed_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_embed_timeout_secs() -> u64 {
    30
}

/// Chat-completion settings. Low temperature favors deterministic answers;
/// the small output ceiling favors brevity.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    #[serde(default = "default_llm_retries")]
    pub max_retries: u32,
    /// Deadline for one answer's model call; the highest-latency step in
    /// the query path.
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_retries: default_llm_retries(),
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.1
}
fn default_max_output_tokens() -> u32 {
    300
}
fn default_llm_retries() -> u32 {
    3
}
fn default_llm_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_k")]
    pub default_k: usize,
    #[serde(default = "default_workout_k")]
    pub workout_k: usize,
    #[serde(default = "default_k")]
    pub form_k: usize,
    #[serde(default = "default_k")]
    pub nutrition_k: usize,
    /// Per-record truncation of context blocks; a token-budget control.
    #[serde(default = "default_context_snippet_chars")]
    pub context_snippet_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_k: default_k(),
            workout_k: default_workout_k(),
            form_k: default_k(),
            nutrition_k: default_k(),
            context_snippet_chars: default_context_snippet_chars(),
        }
    }
}

fn default_k() -> usize {
    4
}
fn default_workout_k() -> usize {
    6
}
fn default_context_snippet_chars() -> usize {
    400
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:7341".to_string()
}

/// The curated crawl list. The defaults are a small, high-precision set of
/// fitness publishers; `[sources] urls` in the config file replaces it.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourcesConfig {
    #[serde(default = "default_source_urls")]
    pub urls: Vec<String>,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            urls: default_source_urls(),
        }
    }
}

fn default_source_urls() -> Vec<String> {
    [
        "https://www.mayoclinic.org/healthy-lifestyle/fitness/in-depth/exercise/art-20048389",
        "https://www.acefitness.org/resources/everyone/exercise-library/",
        "https://www.bodybuilding.com/content/beginner-workout-routine.html",
        "https://www.menshealth.com/fitness/a19516867/beginner-workout-plan/",
        "https://www.womenshealthmag.com/fitness/a19965867/beginner-workout-plan/",
        "https://www.yogajournal.com/practice/beginners/",
        "https://www.crossfit.com/essentials/",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Load and validate a config file.
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load a config file if it exists, otherwise fall back to the defaults.
///
/// The defaults are complete enough to run every command; a missing file is
/// logged, not an error.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        tracing::info!(path = %path.display(), "config file not found, using defaults");
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.fetcher.batch_size == 0 {
        anyhow::bail!("fetcher.batch_size must be > 0");
    }
    if config.filter.min_keyword_matches == 0 {
        anyhow::bail!("filter.min_keyword_matches must be > 0");
    }
    if config.embedding.dims == 0 {
        anyhow::bail!("embedding.dims must be > 0");
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
    }
    if config.retrieval.context_snippet_chars == 0 {
        anyhow::bail!("retrieval.context_snippet_chars must be > 0");
    }
    if config.sources.urls.is_empty() {
        anyhow::bail!("sources.urls must not be empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
        assert_eq!(config.fetcher.batch_size, 3);
        assert_eq!(config.filter.min_content_length, 500);
        assert_eq!(config.retrieval.workout_k, 6);
        assert_eq!(config.sources.urls.len(), 7);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [filter]
            min_content_length = 300

            [store]
            dir = "/tmp/kb"
            "#,
        )
        .unwrap();
        assert_eq!(config.filter.min_content_length, 300);
        assert_eq!(config.filter.min_keyword_matches, 2);
        assert_eq!(config.store.dir, PathBuf::from("/tmp/kb"));
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.fetcher.batch_size = 0;
        assert!(validate(&config).is_err());
    }
}
