use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{Cache, MemoryCache};
use crate::config::EnhancementConfig;
use crate::enhancement::{
    ChangeType, ContentPreserver, EnhancementOptions, EnhancementProcessor,
};
use crate::providers::{ProviderError, RetryPolicy};
use crate::tests::StubProvider;

const GUIDE: &str = "# Guide\n\nThis is teh intro with `code`.\n\n```bash\nrm -rf build\n```\n";

fn processor(provider: &Arc<StubProvider>, cache: Option<Arc<dyn Cache>>) -> EnhancementProcessor {
    EnhancementProcessor::new(provider.clone(), cache, EnhancementConfig::default())
        .with_retry(RetryPolicy::none())
}

fn only(grammar: bool, clarity: bool, consistency: bool) -> EnhancementOptions {
    EnhancementOptions {
        grammar,
        clarity,
        consistency,
        ..Default::default()
    }
}

fn glossary(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// The prose a pass sees for `markdown`.
fn prose_of(markdown: &str) -> String {
    ContentPreserver::new().extract(markdown)
}

#[test]
fn test_grammar_fix_keeps_protected_content() {
    let corrected = prose_of(GUIDE).replace("teh", "the");
    let provider = Arc::new(StubProvider::new().with_response(&corrected));

    let result = processor(&provider, None).enhance(GUIDE, &only(true, false, false));

    assert_eq!(result.enhanced, GUIDE.replace("teh", "the"));
    assert!(result.enhanced.contains("```bash\nrm -rf build\n```"));
    assert!(result.enhanced.contains("`code`"));

    assert_eq!(result.change_count(), 1);
    let change = &result.changes[0];
    assert_eq!(change.change_type, ChangeType::Spelling);
    assert_eq!(change.line_number, Some(3));
    assert_eq!((change.original.as_str(), change.enhanced.as_str()), ("teh", "the"));

    assert!(result.diff.contains("-This is teh intro with `code`."));
    assert!(result.diff.contains("+This is the intro with `code`."));
    assert_eq!(result.preserved.get("code_block"), Some(&1));
    assert_eq!(result.preserved.get("inline_code"), Some(&1));
}

#[test]
fn test_prompt_never_contains_protected_content() {
    let provider = Arc::new(StubProvider::new().with_response(&prose_of(GUIDE)));
    processor(&provider, None).enhance(GUIDE, &only(true, false, false));

    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].prompt.contains("rm -rf"));
    assert!(requests[0].prompt.contains("__PLACEHOLDER_CODE_BLOCK_0000__"));
    assert!(requests[0].system_prompt.is_some());
}

#[test]
fn test_failed_pass_is_a_no_op() {
    let provider = Arc::new(StubProvider::new().with_error(ProviderError::Http {
        status: 500,
        body: "upstream down".to_string(),
    }));

    let result = processor(&provider, None).enhance(GUIDE, &only(true, false, false));

    assert_eq!(provider.generate_calls(), 1);
    assert_eq!(result.enhanced, GUIDE);
    assert!(!result.has_changes());
    assert!(result.diff.is_empty());
    assert_eq!(result.summary(), "No changes made.");
}

#[test]
fn test_pass_results_are_cached() {
    let corrected = prose_of(GUIDE).replace("teh", "the");
    let provider = Arc::new(StubProvider::new().with_response(&corrected));
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let processor = processor(&provider, Some(cache));

    let first = processor.enhance(GUIDE, &only(true, false, false));
    let second = processor.enhance(GUIDE, &only(true, false, false));

    assert_eq!(provider.generate_calls(), 1);
    assert_eq!(first, second);
}

#[test]
fn test_cache_key_depends_on_temperature() {
    let provider = Arc::new(
        StubProvider::new()
            .with_response(&prose_of(GUIDE))
            .with_response(&prose_of(GUIDE)),
    );
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let processor = processor(&provider, Some(cache));

    processor.enhance(GUIDE, &only(true, false, false));
    let warmer = EnhancementOptions {
        temperature: 0.9,
        ..only(true, false, false)
    };
    processor.enhance(GUIDE, &warmer);

    assert_eq!(provider.generate_calls(), 2);
}

#[test]
fn test_consistency_with_configured_glossary() {
    let provider = Arc::new(StubProvider::new());
    let options = EnhancementOptions {
        glossary: glossary(&[("k8s", "Kubernetes")]),
        ..only(false, false, true)
    };

    let result =
        processor(&provider, None).enhance("Running K8S on a cluster.\n", &options);

    assert_eq!(result.enhanced, "Running KUBERNETES on a cluster.\n");
    assert_eq!(provider.generate_calls(), 0);
    assert_eq!(result.changes_by_type(ChangeType::Consistency).len(), 1);
    assert_eq!(result.changes[0].confidence, 1.0);
}

#[test]
fn test_consistency_skips_inline_code() {
    let provider = Arc::new(StubProvider::new());
    let options = EnhancementOptions {
        glossary: glossary(&[("k8s", "Kubernetes")]),
        ..only(false, false, true)
    };

    let result = processor(&provider, None).enhance("Run `k8s apply` on k8s.", &options);

    assert_eq!(result.enhanced, "Run `k8s apply` on Kubernetes.");
    assert_eq!(result.change_count(), 1);
}

#[test]
fn test_built_glossary_is_cached() {
    let provider = Arc::new(
        StubProvider::new().with_response("Sure:\n{\"docker\": \"Docker\"}\nHope that helps."),
    );
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let processor = processor(&provider, Some(cache));
    let markdown = "Install docker first. Then start docker.";

    let first = processor.enhance(markdown, &only(false, false, true));
    let second = processor.enhance(markdown, &only(false, false, true));

    assert_eq!(first.enhanced, "Install Docker first. Then start Docker.");
    assert_eq!(first.change_count(), 2);
    assert_eq!(second.enhanced, first.enhanced);
    assert_eq!(provider.generate_calls(), 1);
    assert_eq!(provider.requests()[0].temperature, Some(0.1));
}

#[test]
fn test_no_glossary_building_when_disabled() {
    let provider = Arc::new(StubProvider::new());
    let options = EnhancementOptions {
        build_glossary: false,
        ..only(false, false, true)
    };

    let result = processor(&provider, None).enhance("Install docker first.", &options);

    assert_eq!(provider.generate_calls(), 0);
    assert!(!result.has_changes());
}

#[test]
fn test_passes_run_in_order() {
    let original = "Teh cluster runs k8s. It is a thing which is used by many teams, and it works.\n";
    let grammar = "The cluster runs k8s. It is a thing which is used by many teams, and it works.";
    let clarity = "The cluster runs k8s. Many teams use it, and it works.";

    let provider = Arc::new(
        StubProvider::new()
            .with_response(grammar)
            .with_response(clarity),
    );
    let options = EnhancementOptions {
        glossary: glossary(&[("k8s", "Kubernetes")]),
        ..Default::default()
    };

    let result = processor(&provider, None).enhance(original, &options);

    assert_eq!(
        result.enhanced,
        "The cluster runs Kubernetes. Many teams use it, and it works.\n"
    );
    let types: Vec<ChangeType> = result.changes.iter().map(|c| c.change_type).collect();
    assert_eq!(
        types,
        vec![ChangeType::Spelling, ChangeType::Clarity, ChangeType::Consistency]
    );
    assert_eq!(result.changes[1].reason, "Simplified complex sentence");
    assert_eq!(
        result.summary(),
        "Total changes: 3\n  Spelling: 1\n  Clarity: 1\n  Consistency: 1"
    );
}

#[test]
fn test_dropped_placeholder_loses_only_that_span() {
    let provider = Arc::new(
        StubProvider::new().with_response("# Guide\n\nThis is the intro.\n\n__PLACEHOLDER_CODE_BLOCK_0000__"),
    );

    let result = processor(&provider, None).enhance(GUIDE, &only(true, false, false));

    assert!(!result.enhanced.contains("`code`"));
    assert!(result.enhanced.contains("rm -rf build"));
    assert!(!result.enhanced.contains("__PLACEHOLDER"));
}

#[test]
fn test_ai_directive_comments_survive() {
    let markdown = "<!-- AI-GENERATE: describe the install steps -->\nSome text here.\n";
    let prose = prose_of(markdown);
    let provider = Arc::new(
        StubProvider::new().with_response(&prose.replace("Some text here.", "Some better text here.")),
    );

    let result = processor(&provider, None).enhance(markdown, &only(true, false, false));

    assert_eq!(
        result.enhanced,
        "<!-- AI-GENERATE: describe the install steps -->\nSome better text here.\n"
    );
}
