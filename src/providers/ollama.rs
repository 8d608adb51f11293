//! Ollama backend for local models. No API key.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{
    base_url, build_client, post_json, AiProvider, Capabilities, GenerateRequest, ProviderError,
    ProviderResponse,
};
use crate::config::ProviderConfig;

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: String,
    model: Option<String>,
    eval_count: Option<u32>,
    done_reason: Option<String>,
    error: Option<String>,
}

#[derive(Serialize)]
struct OllamaEmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaEmbeddingResponse {
    embedding: Vec<f32>,
}

impl OllamaProvider {
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: build_client(config.timeout(), headers)?,
            base_url: base_url(config, DEFAULT_BASE_URL),
            model: config.model.clone(),
            embedding_model: config
                .embedding_model
                .clone()
                .unwrap_or_else(|| DEFAULT_EMBEDDING_MODEL.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl AiProvider for OllamaProvider {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            embeddings: true,
            streaming: true,
        }
    }

    fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, ProviderError> {
        let body = OllamaGenerateRequest {
            model: &self.model,
            prompt: &request.prompt,
            stream: false,
            system: request.system_prompt.as_deref(),
            options: GenerateOptions {
                temperature: request.temperature.unwrap_or(self.temperature),
                num_predict: request.max_tokens.unwrap_or(self.max_tokens),
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response: OllamaGenerateResponse = post_json(&self.client, &url, &[], &body)
            .map_err(|e| match e {
                ProviderError::Request(msg) => {
                    ProviderError::Request(format!("{msg} (is Ollama running at {}?)", self.base_url))
                }
                other => other,
            })?;

        if let Some(error) = response.error {
            return Err(ProviderError::InvalidResponse(format!("Ollama error: {error}")));
        }

        Ok(ProviderResponse {
            content: response.response,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: response.eval_count,
            finish_reason: response.done_reason,
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = OllamaEmbeddingRequest {
            model: &self.embedding_model,
            prompt: text,
        };

        let url = format!("{}/api/embeddings", self.base_url);
        let response: OllamaEmbeddingResponse = post_json(&self.client, &url, &[], &body)?;
        Ok(response.embedding)
    }
}
