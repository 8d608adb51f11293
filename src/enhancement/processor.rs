use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cache::Cache;
use crate::config::EnhancementConfig;
use crate::enhancement::clarity::ClarityPass;
use crate::enhancement::consistency::ConsistencyPass;
use crate::enhancement::diff::unified_diff;
use crate::enhancement::grammar::GrammarPass;
use crate::enhancement::models::{EnhancementOptions, EnhancementResult};
use crate::enhancement::preserver::ContentPreserver;
use crate::enhancement::{EnhancementPass, PassContext};
use crate::providers::{AiProvider, RetryPolicy};

#[derive(Debug, thiserror::Error)]
pub enum EnhancementError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Runs the enhancement pipeline over markdown documents.
pub struct EnhancementProcessor {
    context: PassContext,
    config: EnhancementConfig,
}

impl EnhancementProcessor {
    pub fn new(
        provider: Arc<dyn AiProvider>,
        cache: Option<Arc<dyn Cache>>,
        config: EnhancementConfig,
    ) -> Self {
        Self {
            context: PassContext::new(provider, cache),
            config,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.context = self.context.with_retry(retry);
        self
    }

    /// Options derived from the configuration.
    pub fn options(&self) -> EnhancementOptions {
        EnhancementOptions::from_config(&self.config)
    }

    /// Enhance one document.
    ///
    /// Protected content is swapped out before the enabled passes run in
    /// order (grammar, clarity, consistency) and swapped back afterwards.
    /// Each document gets its own preserver.
    pub fn enhance(&self, markdown: &str, options: &EnhancementOptions) -> EnhancementResult {
        let mut preserver = ContentPreserver::new();
        let prose = preserver.extract(markdown);

        let mut passes: Vec<Box<dyn EnhancementPass>> = Vec::new();
        if options.grammar {
            passes.push(Box::new(GrammarPass::new(self.context.clone())));
        }
        if options.clarity {
            passes.push(Box::new(ClarityPass::new(self.context.clone())));
        }
        if options.consistency {
            passes.push(Box::new(ConsistencyPass::new(self.context.clone())));
        }

        let mut text = prose;
        let mut changes = Vec::new();
        for pass in &passes {
            let (enhanced, pass_changes) = pass.apply(&text, options);
            log::debug!("pass={} changes={}", pass.name(), pass_changes.len());
            text = enhanced;
            changes.extend(pass_changes);
        }

        let missing = preserver.missing_placeholders(&text);
        if !missing.is_empty() {
            log::warn!(
                "protected content dropped by rewrite count={} tokens={missing:?}",
                missing.len()
            );
        }

        let enhanced = preserver.restore(&text);
        let diff = unified_diff(markdown, &enhanced);

        EnhancementResult {
            original: markdown.to_string(),
            enhanced,
            diff,
            changes,
            preserved: preserver.stats(),
        }
    }

    pub fn enhance_file(
        &self,
        path: &Path,
        options: &EnhancementOptions,
    ) -> Result<EnhancementResult, EnhancementError> {
        let markdown = std::fs::read_to_string(path).map_err(|source| EnhancementError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let result = self.enhance(&markdown, options);
        log::info!(
            "enhanced path={} changes={}",
            path.display(),
            result.change_count()
        );
        Ok(result)
    }

    /// Enhance every path that [`Self::should_enhance`] accepts.
    ///
    /// Stops at the first unreadable file.
    pub fn enhance_files<'a>(
        &self,
        paths: impl IntoIterator<Item = &'a Path>,
        options: &EnhancementOptions,
    ) -> Result<BTreeMap<PathBuf, EnhancementResult>, EnhancementError> {
        let mut results = BTreeMap::new();
        for path in paths {
            if !self.should_enhance(path) {
                log::debug!("skipping path={}", path.display());
                continue;
            }
            let result = self.enhance_file(path, options)?;
            results.insert(path.to_path_buf(), result);
        }
        Ok(results)
    }

    /// Write the enhanced text over `path`.
    pub fn apply(&self, path: &Path, result: &EnhancementResult) -> Result<(), EnhancementError> {
        let write_error = |source| EnhancementError::Write {
            path: path.to_path_buf(),
            source,
        };

        let mut temp_name = OsString::from(path.as_os_str());
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        if let Err(e) = std::fs::write(&temp_path, &result.enhanced) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(write_error(e));
        }
        std::fs::rename(&temp_path, path).map_err(write_error)?;

        log::info!("applied path={} changes={}", path.display(), result.change_count());
        Ok(())
    }

    /// Markdown files outside every `exclude` pattern, when enabled.
    pub fn should_enhance(&self, path: &Path) -> bool {
        if !self.config.enabled {
            return false;
        }
        let is_markdown = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("md") || ext.eq_ignore_ascii_case("markdown"));
        if !is_markdown {
            return false;
        }

        let path_str = path.to_string_lossy();
        !self
            .config
            .exclude
            .iter()
            .any(|pattern| !pattern.is_empty() && path_str.contains(pattern.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Capabilities, GenerateRequest, ProviderError, ProviderResponse};

    struct Unreachable;

    impl AiProvider for Unreachable {
        fn name(&self) -> &'static str {
            "unreachable"
        }

        fn model(&self) -> &str {
            "none"
        }

        fn capabilities(&self) -> Capabilities {
            Capabilities {
                embeddings: false,
                streaming: false,
            }
        }

        fn generate(&self, _request: &GenerateRequest) -> Result<ProviderResponse, ProviderError> {
            Err(ProviderError::NotSupported("generate".to_string()))
        }

        fn embed(&self, _text: &str) -> Result<Vec<f32>, ProviderError> {
            Err(ProviderError::NotSupported("embeddings".to_string()))
        }
    }

    fn processor(config: EnhancementConfig) -> EnhancementProcessor {
        EnhancementProcessor::new(Arc::new(Unreachable), None, config)
            .with_retry(RetryPolicy::none())
    }

    #[test]
    fn test_failing_provider_leaves_document_unchanged() {
        let markdown = "# Title\n\nSome prose with `code`.\n\n```\nfn main() {}\n```\n";
        let result = processor(EnhancementConfig::default())
            .enhance(markdown, &EnhancementOptions::default());

        assert_eq!(result.enhanced, markdown);
        assert!(result.diff.is_empty());
        assert!(!result.has_changes());
        assert_eq!(result.preserved.get("code_block"), Some(&1));
        assert_eq!(result.preserved.get("inline_code"), Some(&1));
    }

    #[test]
    fn test_should_enhance() {
        let config = EnhancementConfig {
            exclude: vec!["drafts/".to_string()],
            ..Default::default()
        };
        let processor = processor(config);

        assert!(processor.should_enhance(Path::new("docs/guide.md")));
        assert!(processor.should_enhance(Path::new("docs/GUIDE.MD")));
        assert!(!processor.should_enhance(Path::new("docs/drafts/wip.md")));
        assert!(!processor.should_enhance(Path::new("docs/image.png")));

        let disabled = super::EnhancementProcessor::new(
            Arc::new(Unreachable),
            None,
            EnhancementConfig {
                enabled: false,
                ..Default::default()
            },
        );
        assert!(!disabled.should_enhance(Path::new("docs/guide.md")));
    }

    #[test]
    fn test_enhance_file_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.md");
        std::fs::write(&path, "Plain text.\n").unwrap();

        let processor = processor(EnhancementConfig::default());
        let mut result = processor
            .enhance_file(&path, &EnhancementOptions::default())
            .unwrap();
        result.enhanced = "Better text.\n".to_string();
        processor.apply(&path, &result).unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "Better text.\n");
        assert!(!dir.path().join("page.md.tmp").exists());
    }

    #[test]
    fn test_enhance_missing_file() {
        let err = processor(EnhancementConfig::default())
            .enhance_file(Path::new("/nonexistent/page.md"), &EnhancementOptions::default())
            .unwrap_err();
        assert!(matches!(err, EnhancementError::Read { .. }));
    }

    #[test]
    fn test_enhance_files_skips_excluded() {
        let dir = tempfile::tempdir().unwrap();
        let kept = dir.path().join("kept.md");
        let skipped = dir.path().join("skip-me.md");
        std::fs::write(&kept, "Kept.\n").unwrap();
        std::fs::write(&skipped, "Skipped.\n").unwrap();

        let processor = processor(EnhancementConfig {
            exclude: vec!["skip-me".to_string()],
            ..Default::default()
        });
        let results = processor
            .enhance_files([kept.as_path(), skipped.as_path()], &EnhancementOptions::default())
            .unwrap();

        assert_eq!(results.len(), 1);
        assert!(results.contains_key(&kept));
    }
}
