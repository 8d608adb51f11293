//! AI-assisted prose enhancement for markdown documents.
//!
//! # Architecture
//!
//! - `preserver`: swaps code, HTML, math and tables for placeholder tokens
//! - `grammar`, `clarity`, `consistency`: the rewrite passes
//! - `diff`: change detection between pass input and output
//! - `processor`: extract, run passes, restore, diff
//!
//! Passes are fault-isolated: a provider failure leaves the text unchanged
//! and reports no changes.

pub mod clarity;
pub mod consistency;
pub mod diff;
pub mod grammar;
mod models;
pub mod preserver;
mod processor;

use std::sync::Arc;

use crate::cache::{generate_key, Cache};
use crate::providers::{generate_with_retry, AiProvider, GenerateRequest, RetryPolicy};

pub use clarity::ClarityPass;
pub use consistency::ConsistencyPass;
pub use grammar::GrammarPass;
pub use models::{
    Change, ChangeType, EnhancementOptions, EnhancementResult, PreservationStats,
};
pub use preserver::{ContentPreserver, Placeholder, PlaceholderKind};
pub use processor::{EnhancementError, EnhancementProcessor};

use models::CachedPass;

/// One rewrite step over placeholder-protected prose.
pub trait EnhancementPass {
    fn name(&self) -> &'static str;

    /// Never fails: on any error the input comes back with no changes.
    fn apply(&self, text: &str, options: &EnhancementOptions) -> (String, Vec<Change>);
}

/// Provider, cache and retry policy shared by the passes.
#[derive(Clone)]
pub struct PassContext {
    pub provider: Arc<dyn AiProvider>,
    pub cache: Option<Arc<dyn Cache>>,
    pub retry: RetryPolicy,
}

impl PassContext {
    pub fn new(provider: Arc<dyn AiProvider>, cache: Option<Arc<dyn Cache>>) -> Self {
        Self {
            provider,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Have the provider rewrite `text` and diff the result with `detect`.
    ///
    /// Results are cached per request. The rewrite keeps the input's
    /// leading and trailing whitespace so placeholders at the edges of a
    /// document stay where they were.
    pub(crate) fn rewrite(
        &self,
        pass: &str,
        request: GenerateRequest,
        text: &str,
        detect: fn(&str, &str) -> Vec<Change>,
    ) -> (String, Vec<Change>) {
        if text.trim().is_empty() {
            return (text.to_string(), Vec::new());
        }

        let key = format!(
            "{pass}:{}",
            generate_key(self.provider.model(), &request)
        );

        if let Some(cache) = &self.cache {
            if let Some(value) = cache.get(&key) {
                match serde_json::from_value::<CachedPass>(value) {
                    Ok(cached) => {
                        log::debug!("pass={pass} cache hit");
                        return (cached.enhanced, cached.changes);
                    }
                    Err(e) => log::warn!("pass={pass} ignoring cached result: {e}"),
                }
            }
        }

        let response = match generate_with_retry(self.provider.as_ref(), &request, &self.retry) {
            Ok(response) => response,
            Err(e) => {
                log::warn!(
                    "pass={pass} provider={} failed, text left unchanged: {e}",
                    self.provider.name()
                );
                return (text.to_string(), Vec::new());
            }
        };

        let enhanced = keep_edges(text, response.content.trim());
        let changes = detect(text, &enhanced);
        log::info!("pass={pass} changes={}", changes.len());

        if let Some(cache) = &self.cache {
            let cached = CachedPass {
                enhanced: enhanced.clone(),
                changes: changes.clone(),
            };
            match serde_json::to_value(&cached) {
                Ok(value) => {
                    if let Err(e) = cache.set(&key, value, None) {
                        log::warn!("pass={pass} failed to cache result: {e}");
                    }
                }
                Err(e) => log::warn!("pass={pass} failed to serialize result: {e}"),
            }
        }

        (enhanced, changes)
    }
}

/// Wrap `body` in the leading and trailing whitespace of `original`.
fn keep_edges(original: &str, body: &str) -> String {
    let lead = &original[..original.len() - original.trim_start().len()];
    let trail = &original[original.trim_end().len()..];
    format!("{lead}{body}{trail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_edges() {
        assert_eq!(keep_edges("\n  text \n\n", "new"), "\n  new \n\n");
        assert_eq!(keep_edges("text", "new"), "new");
    }
}
