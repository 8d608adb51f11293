//! Google Gemini backend.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{
    base_url, build_client, post_json, AiProvider, Capabilities, GenerateRequest, ProviderError,
    ProviderResponse,
};
use crate::config::ProviderConfig;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_EMBEDDING_MODEL: &str = "embedding-001";

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Content,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    total_token_count: Option<u32>,
}

#[derive(Serialize)]
struct EmbedContentRequest {
    content: Content,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

impl GeminiProvider {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: build_client(config.timeout(), headers)?,
            base_url: base_url(config, DEFAULT_BASE_URL),
            api_key,
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

impl AiProvider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
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
        // Gemini takes the system prompt inline
        let prompt = match request.system_prompt.as_deref() {
            Some(system) => format!("{system}\n\n{}", request.prompt),
            None => request.prompt.clone(),
        };

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: request.temperature.unwrap_or(self.temperature),
                max_output_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let response: GenerateContentResponse =
            post_json(&self.client, &url, &[("key", self.api_key.as_str())], &body)?;

        let tokens_used = response.usage_metadata.and_then(|u| u.total_token_count);
        let candidate = response
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::InvalidResponse("no candidates returned".to_string()))?;
        let content = candidate
            .content
            .parts
            .into_iter()
            .next()
            .map(|part| part.text)
            .ok_or_else(|| ProviderError::InvalidResponse("candidate has no parts".to_string()))?;

        Ok(ProviderResponse {
            content,
            model: self.model.clone(),
            tokens_used,
            finish_reason: candidate.finish_reason,
        })
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let body = EmbedContentRequest {
            content: Content {
                parts: vec![Part {
                    text: text.to_string(),
                }],
            },
        };

        let url = format!(
            "{}/models/{}:embedContent",
            self.base_url, self.embedding_model
        );
        let response: EmbedContentResponse =
            post_json(&self.client, &url, &[("key", self.api_key.as_str())], &body)?;
        Ok(response.embedding.values)
    }
}
