use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default generation model (routed through OpenRouter)
const DEFAULT_MODEL: &str = "anthropic/claude-3.5-sonnet";
/// Default index file name, relative to the site directory
const DEFAULT_INDEX_PATH: &str = "search_index.json";
/// Default cache directory
const DEFAULT_CACHE_DIR: &str = ".ai-cache";
/// 24 hours
const DEFAULT_CACHE_TTL_SECS: u64 = 86_400;
/// 100MB
const DEFAULT_CACHE_MAX_SIZE: u64 = 100 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("config is malformed: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("invalid config value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Backend selector for the AI provider factory.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenRouter,
    Ollama,
    Anthropic,
    Gemini,
}

impl ProviderKind {
    /// Environment variable consulted when `api_key` is not set in the file.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Self::OpenRouter => Some("OPENROUTER_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::Ollama => None,
        }
    }

    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Self::Ollama)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub name: ProviderKind,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Backend default is used when absent
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    /// Backend default is used when absent
    #[serde(default)]
    pub embedding_model: Option<String>,

    #[serde(default = "default_provider_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderKind::default(),
            api_key: None,
            base_url: None,
            model: default_model(),
            embedding_model: None,
            temperature: default_provider_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
        }
    }
}

impl ProviderConfig {
    /// API key from the file, falling back to the backend's environment variable.
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| {
                self.name
                    .api_key_env()
                    .and_then(|var| std::env::var(var).ok())
                    .filter(|key| !key.trim().is_empty())
            })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_cache_dir")]
    pub dir: String,

    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Upper bound on the cache directory size in bytes
    #[serde(default = "default_cache_max_size")]
    pub max_size: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: default_cache_dir(),
            ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_size: DEFAULT_CACHE_MAX_SIZE,
        }
    }
}

/// Configuration for semantic search functionality
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Maximum characters per chunk
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared between consecutive chunks
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Chunks (and pages) shorter than this are skipped
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,

    /// Blend weight of the semantic score [0.0, 1.0]
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f32,

    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            index_path: default_index_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            min_chunk_size: default_min_chunk_size(),
            semantic_weight: default_semantic_weight(),
            max_results: default_max_results(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementFeature {
    Grammar,
    Clarity,
    Consistency,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnhancementConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_features")]
    pub features: Vec<EnhancementFeature>,

    #[serde(default = "default_enhancement_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Term variation -> preferred form
    #[serde(default)]
    pub glossary: BTreeMap<String, String>,

    /// Ask the provider for a glossary when none is configured
    #[serde(default = "default_true")]
    pub build_glossary: bool,

    /// Substrings of file paths that are never enhanced
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            features: default_features(),
            temperature: default_enhancement_temperature(),
            max_tokens: default_max_tokens(),
            glossary: BTreeMap::new(),
            build_glossary: true,
            exclude: Vec::new(),
        }
    }
}

impl EnhancementConfig {
    pub fn has_feature(&self, feature: EnhancementFeature) -> bool {
        self.features.contains(&feature)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub enhancement: EnhancementConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            debug: false,
            provider: ProviderConfig::default(),
            cache: CacheConfig::default(),
            search: SearchConfig::default(),
            enhancement: EnhancementConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_provider_temperature() -> f32 {
    0.7
}

fn default_enhancement_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    3
}

fn default_cache_dir() -> String {
    DEFAULT_CACHE_DIR.to_string()
}

fn default_cache_ttl_secs() -> u64 {
    DEFAULT_CACHE_TTL_SECS
}

fn default_cache_max_size() -> u64 {
    DEFAULT_CACHE_MAX_SIZE
}

fn default_index_path() -> String {
    DEFAULT_INDEX_PATH.to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_min_chunk_size() -> usize {
    100
}

fn default_semantic_weight() -> f32 {
    0.7
}

fn default_max_results() -> usize {
    10
}

fn default_features() -> Vec<EnhancementFeature> {
    vec![
        EnhancementFeature::Grammar,
        EnhancementFeature::Clarity,
        EnhancementFeature::Consistency,
    ]
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let provider = &self.provider;
        if provider.model.trim().is_empty() {
            return Err(ConfigError::invalid("provider.model", "must not be empty"));
        }
        if !(0.0..=2.0).contains(&provider.temperature) {
            return Err(ConfigError::invalid(
                "provider.temperature",
                format!("must be between 0.0 and 2.0, got {}", provider.temperature),
            ));
        }
        if provider.timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "provider.timeout_secs",
                "must be greater than 0",
            ));
        }

        let search = &self.search;
        if !(0.0..=1.0).contains(&search.semantic_weight) {
            return Err(ConfigError::invalid(
                "search.semantic_weight",
                format!("must be between 0.0 and 1.0, got {}", search.semantic_weight),
            ));
        }
        if search.chunk_size == 0 {
            return Err(ConfigError::invalid("search.chunk_size", "must be greater than 0"));
        }
        if search.chunk_overlap >= search.chunk_size {
            return Err(ConfigError::invalid(
                "search.chunk_overlap",
                format!(
                    "must be smaller than chunk_size ({}), got {}",
                    search.chunk_size, search.chunk_overlap
                ),
            ));
        }
        if search.min_chunk_size > search.chunk_size {
            return Err(ConfigError::invalid(
                "search.min_chunk_size",
                format!(
                    "must not exceed chunk_size ({}), got {}",
                    search.chunk_size, search.min_chunk_size
                ),
            ));
        }
        if search.max_results == 0 {
            return Err(ConfigError::invalid("search.max_results", "must be greater than 0"));
        }

        let enhancement = &self.enhancement;
        if !(0.0..=2.0).contains(&enhancement.temperature) {
            return Err(ConfigError::invalid(
                "enhancement.temperature",
                format!("must be between 0.0 and 2.0, got {}", enhancement.temperature),
            ));
        }

        Ok(())
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            log::debug!("config {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        let config_str = std::fs::read_to_string(path)?;
        Self::from_yaml(&config_str)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let config_str = serde_yml::to_string(self)?;
        std::fs::write(path, config_str)?;
        Ok(())
    }
}
