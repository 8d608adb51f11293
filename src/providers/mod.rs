//! AI provider abstraction.
//!
//! Every backend implements [`AiProvider`]. Calls are blocking and go through
//! `reqwest::blocking`. [`create_provider`] selects a backend by
//! [`ProviderKind`] and validates the settings it needs.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openrouter;

use std::error::Error;
use std::thread;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::{ProviderConfig, ProviderKind};

pub use anthropic::AnthropicProvider;
pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openrouter::OpenRouterProvider;

/// Upstream generation/embedding failure.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("request failed: {0}")]
    Request(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<ProviderError>,
    },
}

impl ProviderError {
    /// Transport failures, rate limits and server errors are worth retrying.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        if let Some(status) = error.status() {
            return Self::Http {
                status: status.as_u16(),
                body: error.to_string(),
            };
        }
        if error.is_decode() {
            return Self::InvalidResponse(error.to_string());
        }
        // innermost cause carries the useful message (dns, tls, refused)
        let mut message = error.to_string();
        let mut source = error.source();
        while let Some(inner) = source {
            message = inner.to_string();
            source = inner.source();
        }
        Self::Request(message)
    }
}

/// A single generation request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Standardized response from every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    pub content: String,
    pub model: String,
    pub tokens_used: Option<u32>,
    pub finish_reason: Option<String>,
}

/// What a backend can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub embeddings: bool,
    pub streaming: bool,
}

/// Uniform interface over generation/embedding backends.
pub trait AiProvider: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &'static str;

    /// Generation model; part of every cache key.
    fn model(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, ProviderError>;

    /// Backends without embedding support return [`ProviderError::NotSupported`].
    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// Retry schedule for [`generate_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before the first retry; doubled on every further attempt
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// `max_retries` counts attempts; zero still makes one call.
    pub fn from_config(config: &ProviderConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            ..Self::default()
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Generate with exponential backoff on retryable errors.
pub fn generate_with_retry(
    provider: &dyn AiProvider,
    request: &GenerateRequest,
    policy: &RetryPolicy,
) -> Result<ProviderResponse, ProviderError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        match provider.generate(request) {
            Ok(response) => return Ok(response),
            Err(e) if e.is_retryable() && attempt + 1 < max_attempts => {
                let delay = policy.base_delay * 2u32.saturating_pow(attempt);
                log::warn!(
                    "provider={} attempt={} err={e}; retrying in {:?}",
                    provider.name(),
                    attempt + 1,
                    delay
                );
                thread::sleep(delay);
                attempt += 1;
            }
            Err(e) if attempt > 0 => {
                return Err(ProviderError::RetriesExhausted {
                    attempts: attempt + 1,
                    last: Box::new(e),
                })
            }
            Err(e) => return Err(e),
        }
    }
}

/// Build the backend named by `config.name`.
pub fn create_provider(config: &ProviderConfig) -> Result<Box<dyn AiProvider>, ProviderError> {
    if config.model.trim().is_empty() {
        return Err(ProviderError::Config("model name is required".to_string()));
    }

    let api_key = config.resolved_api_key();
    if config.name.requires_api_key() && api_key.is_none() {
        let hint = config
            .name
            .api_key_env()
            .map(|var| format!(" (set provider.api_key or {var})"))
            .unwrap_or_default();
        return Err(ProviderError::Config(format!(
            "API key required for {:?}{hint}",
            config.name
        )));
    }
    let api_key = api_key.unwrap_or_default();

    let provider: Box<dyn AiProvider> = match config.name {
        ProviderKind::OpenRouter => Box::new(OpenRouterProvider::new(config, api_key)?),
        ProviderKind::Ollama => Box::new(OllamaProvider::new(config)?),
        ProviderKind::Anthropic => Box::new(AnthropicProvider::new(config, api_key)?),
        ProviderKind::Gemini => Box::new(GeminiProvider::new(config, api_key)?),
    };

    log::debug!(
        "provider={} model={} initialized",
        provider.name(),
        provider.model()
    );
    Ok(provider)
}

pub(crate) fn build_client(timeout: Duration, headers: HeaderMap) -> Result<Client, ProviderError> {
    Client::builder()
        .timeout(timeout)
        .default_headers(headers)
        .build()
        .map_err(|e| ProviderError::Config(format!("failed to build HTTP client: {e}")))
}

/// POST a JSON body and decode the JSON reply; non-2xx becomes [`ProviderError::Http`].
pub(crate) fn post_json<B, R>(
    client: &Client,
    url: &str,
    query: &[(&str, &str)],
    body: &B,
) -> Result<R, ProviderError>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = client.post(url).query(query).json(body).send()?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().unwrap_or_default();
        return Err(ProviderError::Http {
            status: status.as_u16(),
            body,
        });
    }

    let text = response.text()?;
    serde_json::from_str(&text).map_err(|e| ProviderError::InvalidResponse(e.to_string()))
}

pub(crate) fn base_url(config: &ProviderConfig, default: &str) -> String {
    config
        .base_url
        .as_deref()
        .unwrap_or(default)
        .trim_end_matches('/')
        .to_string()
}
