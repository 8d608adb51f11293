//! Terminology consistency pass.
//!
//! Glossary driven: every `variation -> preferred` entry is applied as a
//! whole-word, case-insensitive substitution. The casing of each match is
//! carried over:
//!
//! - all caps (`K8S`) gives an all-caps replacement (`KUBERNETES`)
//! - a leading capital (`Docker`) capitalizes the first letter of the
//!   preferred form and keeps the rest as written
//! - anything else uses the preferred form as given
//!
//! Without a glossary the provider can be asked to propose one from the
//! document itself.

use std::collections::BTreeMap;

use regex::{Captures, Regex};

use crate::enhancement::models::{Change, ChangeType, EnhancementOptions};
use crate::enhancement::{EnhancementPass, PassContext};
use crate::providers::{generate_with_retry, GenerateRequest};
use crate::search::content_hash;

const GLOSSARY_TEMPERATURE: f32 = 0.1;

const GLOSSARY_PROMPT: &str = "List the technical terms in the documentation below \
that are written in more than one way, and pick one standard form for each.

Answer with a single JSON object that maps every variation to its standard form, \
for example {\"k8s\": \"Kubernetes\", \"docker\": \"Docker\", \"rest api\": \"REST API\"}. \
Include product names, capitalization differences and alternative spellings. \
Do not add any explanation.

Documentation:

";

pub struct ConsistencyPass {
    context: PassContext,
}

impl ConsistencyPass {
    pub fn new(context: PassContext) -> Self {
        Self { context }
    }

    /// Ask the provider for a glossary, cached by document hash.
    ///
    /// Any failure yields an empty glossary.
    pub fn build_glossary(&self, text: &str) -> BTreeMap<String, String> {
        let key = format!("glossary:{}", content_hash(text));

        if let Some(cache) = &self.context.cache {
            if let Some(value) = cache.get(&key) {
                match serde_json::from_value::<BTreeMap<String, String>>(value) {
                    Ok(glossary) => return glossary,
                    Err(e) => log::warn!("ignoring cached glossary key={key}: {e}"),
                }
            }
        }

        let request = GenerateRequest::new(format!("{GLOSSARY_PROMPT}{text}"))
            .with_temperature(GLOSSARY_TEMPERATURE);
        let response = match generate_with_retry(
            self.context.provider.as_ref(),
            &request,
            &self.context.retry,
        ) {
            Ok(response) => response,
            Err(e) => {
                log::warn!("glossary request failed: {e}");
                return BTreeMap::new();
            }
        };

        let Some(glossary) = parse_glossary(&response.content) else {
            log::warn!("glossary response is not a JSON object of strings");
            return BTreeMap::new();
        };
        log::info!("built glossary terms={}", glossary.len());

        if let Some(cache) = &self.context.cache {
            match serde_json::to_value(&glossary) {
                Ok(value) => {
                    if let Err(e) = cache.set(&key, value, None) {
                        log::warn!("failed to cache glossary key={key}: {e}");
                    }
                }
                Err(e) => log::warn!("failed to serialize glossary: {e}"),
            }
        }
        glossary
    }
}

impl EnhancementPass for ConsistencyPass {
    fn name(&self) -> &'static str {
        "consistency"
    }

    fn apply(&self, text: &str, options: &EnhancementOptions) -> (String, Vec<Change>) {
        if text.trim().is_empty() {
            return (text.to_string(), Vec::new());
        }

        let built;
        let glossary = if options.glossary.is_empty() && options.build_glossary {
            built = self.build_glossary(text);
            &built
        } else {
            &options.glossary
        };

        let (enhanced, changes) = apply_glossary(text, glossary);
        log::info!("pass=consistency changes={}", changes.len());
        (enhanced, changes)
    }
}

/// Apply every glossary entry, longest variation first.
pub fn apply_glossary(text: &str, glossary: &BTreeMap<String, String>) -> (String, Vec<Change>) {
    let mut entries: Vec<(&String, &String)> = glossary
        .iter()
        .filter(|(variation, preferred)| !variation.trim().is_empty() && variation != preferred)
        .collect();
    // BTreeMap order breaks ties alphabetically
    entries.sort_by(|a, b| b.0.chars().count().cmp(&a.0.chars().count()));

    let mut enhanced = text.to_string();
    let mut changes = Vec::new();

    for (variation, preferred) in entries {
        let Some(pattern) = term_pattern(variation) else {
            log::warn!("skipping glossary term={variation:?}");
            continue;
        };

        let current = enhanced.clone();
        let replaced = pattern.replace_all(&current, |caps: &Captures| {
            let Some(found) = caps.get(0) else {
                return String::new();
            };
            let replacement = match_case(found.as_str(), preferred);
            if replacement != found.as_str() {
                changes.push(Change {
                    change_type: ChangeType::Consistency,
                    line_number: Some(line_of(&current, found.start())),
                    original: found.as_str().to_string(),
                    enhanced: replacement.clone(),
                    reason: format!("Standardize to '{preferred}'"),
                    confidence: 1.0,
                });
            }
            replacement
        });
        enhanced = replaced.into_owned();
    }

    (enhanced, changes)
}

/// Whole-word, case-insensitive pattern for `term`.
///
/// Word boundaries only go on sides that start or end with a word
/// character, so terms such as `c++` still match.
fn term_pattern(term: &str) -> Option<Regex> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_';
    let first = term.chars().next()?;
    let last = term.chars().last()?;

    let lead = if is_word(first) { r"\b" } else { "" };
    let tail = if is_word(last) { r"\b" } else { "" };
    Regex::new(&format!("(?i){lead}{}{tail}", regex::escape(term))).ok()
}

/// Carry the casing pattern of `found` over to `preferred`.
pub fn match_case(found: &str, preferred: &str) -> String {
    let has_cased = found.chars().any(|c| c.is_alphabetic());
    if has_cased && !found.chars().any(char::is_lowercase) {
        return preferred.to_uppercase();
    }

    if found.chars().next().is_some_and(char::is_uppercase) {
        let mut chars = preferred.chars();
        return match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
    }

    preferred.to_string()
}

/// Parse the JSON object between the first `{` and the last `}`.
fn parse_glossary(content: &str) -> Option<BTreeMap<String, String>> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&content[start..=end]).ok()
}

fn line_of(text: &str, offset: usize) -> usize {
    text[..offset].matches('\n').count() + 1
}
