//! Anthropic Messages API backend. Generation only.

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::{
    base_url, build_client, post_json, AiProvider, Capabilities, GenerateRequest, ProviderError,
    ProviderResponse,
};
use crate::config::ProviderConfig;

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
}

#[derive(Deserialize)]
struct MessagesResponse {
    model: Option<String>,
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl AnthropicProvider {
    pub fn new(config: &ProviderConfig, api_key: String) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(api_key.trim())
                .map_err(|_| ProviderError::Config("invalid Anthropic API key".to_string()))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        Ok(Self {
            client: build_client(config.timeout(), headers)?,
            base_url: base_url(config, DEFAULT_BASE_URL),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

impl AiProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            embeddings: false,
            streaming: true,
        }
    }

    fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, ProviderError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.unwrap_or(self.temperature),
            messages: vec![Message {
                role: "user",
                content: &request.prompt,
            }],
            system: request.system_prompt.as_deref(),
        };

        let url = format!("{}/messages", self.base_url);
        let response: MessagesResponse = post_json(&self.client, &url, &[], &body)?;

        let content = response
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| ProviderError::InvalidResponse("empty content".to_string()))?;

        Ok(ProviderResponse {
            content,
            model: response.model.unwrap_or_else(|| self.model.clone()),
            tokens_used: response.usage.map(|u| u.input_tokens + u.output_tokens),
            finish_reason: response.stop_reason,
        })
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
        Err(ProviderError::NotSupported(
            "Anthropic does not provide embedding models; use OpenRouter, Ollama or Gemini"
                .to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embed_is_not_supported() {
        let config = ProviderConfig {
            model: "claude-3-5-sonnet".to_string(),
            ..Default::default()
        };
        let provider = AnthropicProvider::new(&config, "key".to_string()).unwrap();

        assert!(!provider.capabilities().embeddings);
        assert!(matches!(
            provider.embed("hello"),
            Err(ProviderError::NotSupported(_))
        ));
    }
}
