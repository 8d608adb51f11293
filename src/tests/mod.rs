//! Crate-level scenario tests.
//!
//! Network backends are replaced by [`StubProvider`], which replays
//! scripted generations and returns fixed embeddings keyed by text.

mod enhancement;

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::providers::{
    AiProvider, Capabilities, GenerateRequest, ProviderError, ProviderResponse,
};

#[derive(Default)]
pub struct StubProvider {
    responses: Mutex<VecDeque<Result<String, ProviderError>>>,
    embeddings: HashMap<String, Vec<f32>>,
    no_embeddings: bool,
    requests: Mutex<Vec<GenerateRequest>>,
    generate_calls: AtomicUsize,
    embed_calls: AtomicUsize,
}

impl StubProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_embedding(mut self, text: &str, embedding: Vec<f32>) -> Self {
        self.embeddings.insert(text.to_string(), embedding);
        self
    }

    /// Advertise no embedding support.
    pub fn without_embeddings(mut self) -> Self {
        self.no_embeddings = true;
        self
    }

    /// Queue the content of the next generation.
    pub fn with_response(self, content: &str) -> Self {
        self.push(Ok(content.to_string()));
        self
    }

    /// Queue a failure for the next generation.
    pub fn with_error(self, error: ProviderError) -> Self {
        self.push(Err(error));
        self
    }

    fn push(&self, response: Result<String, ProviderError>) {
        if let Ok(mut responses) = self.responses.lock() {
            responses.push_back(response);
        }
    }

    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    pub fn embed_calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl AiProvider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            embeddings: !self.no_embeddings,
            streaming: false,
        }
    }

    fn generate(&self, request: &GenerateRequest) -> Result<ProviderResponse, ProviderError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(ProviderResponse {
                content,
                model: "stub-model".to_string(),
                tokens_used: None,
                finish_reason: Some("stop".to_string()),
            }),
            Some(Err(e)) => Err(e),
            None => Err(ProviderError::InvalidResponse(
                "no scripted response left".to_string(),
            )),
        }
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        self.embed_calls.fetch_add(1, Ordering::SeqCst);
        self.embeddings
            .get(text)
            .cloned()
            .ok_or_else(|| ProviderError::NotSupported(format!("no embedding for {text:?}")))
    }
}
