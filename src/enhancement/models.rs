use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{EnhancementConfig, EnhancementFeature};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Grammar,
    Spelling,
    Clarity,
    Consistency,
    Seo,
    Link,
}

impl ChangeType {
    pub const ALL: [ChangeType; 6] = [
        ChangeType::Grammar,
        ChangeType::Spelling,
        ChangeType::Clarity,
        ChangeType::Consistency,
        ChangeType::Seo,
        ChangeType::Link,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Grammar => "Grammar",
            Self::Spelling => "Spelling",
            Self::Clarity => "Clarity",
            Self::Consistency => "Consistency",
            Self::Seo => "Seo",
            Self::Link => "Link",
        }
    }
}

/// One detected edit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    #[serde(rename = "type")]
    pub change_type: ChangeType,
    /// 1-based line in the prose the pass saw
    pub line_number: Option<usize>,
    pub original: String,
    pub enhanced: String,
    pub reason: String,
    /// Advisory only, never used for filtering
    pub confidence: f32,
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(line) = self.line_number {
            write!(f, "Line {line}: ")?;
        }
        write!(
            f,
            "{:?} -> {:?} ({})",
            self.original, self.enhanced, self.reason
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnhancementOptions {
    pub grammar: bool,
    pub clarity: bool,
    pub consistency: bool,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Variation -> preferred form
    pub glossary: BTreeMap<String, String>,
    /// Ask the provider for a glossary when `glossary` is empty
    pub build_glossary: bool,
}

impl Default for EnhancementOptions {
    fn default() -> Self {
        Self {
            grammar: true,
            clarity: true,
            consistency: true,
            temperature: 0.3,
            max_tokens: 4000,
            glossary: BTreeMap::new(),
            build_glossary: true,
        }
    }
}

impl EnhancementOptions {
    pub fn from_config(config: &EnhancementConfig) -> Self {
        Self {
            grammar: config.has_feature(EnhancementFeature::Grammar),
            clarity: config.has_feature(EnhancementFeature::Clarity),
            consistency: config.has_feature(EnhancementFeature::Consistency),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            glossary: config.glossary.clone(),
            build_glossary: config.build_glossary,
        }
    }
}

/// Placeholder counts by kind
pub type PreservationStats = BTreeMap<String, usize>;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnhancementResult {
    pub original: String,
    pub enhanced: String,
    /// Unified diff, empty when nothing changed
    pub diff: String,
    pub changes: Vec<Change>,
    pub preserved: PreservationStats,
}

impl EnhancementResult {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn change_count(&self) -> usize {
        self.changes.len()
    }

    pub fn changes_by_type(&self, change_type: ChangeType) -> Vec<&Change> {
        self.changes
            .iter()
            .filter(|c| c.change_type == change_type)
            .collect()
    }

    pub fn summary(&self) -> String {
        if !self.has_changes() {
            return "No changes made.".to_string();
        }

        let mut lines = vec![format!("Total changes: {}", self.change_count())];
        for change_type in ChangeType::ALL {
            let count = self.changes_by_type(change_type).len();
            if count > 0 {
                lines.push(format!("  {}: {count}", change_type.label()));
            }
        }
        lines.join("\n")
    }
}

/// Pass output as stored in the cache.
#[derive(Serialize, Deserialize)]
pub(crate) struct CachedPass {
    pub enhanced: String,
    pub changes: Vec<Change>,
}
