//! Grammar and spelling pass.

use crate::enhancement::diff::line_changes;
use crate::enhancement::models::{Change, EnhancementOptions};
use crate::enhancement::{EnhancementPass, PassContext};
use crate::providers::GenerateRequest;

const SYSTEM_PROMPT: &str = "You proofread technical documentation. \
Fix spelling, grammar and punctuation mistakes only. \
Keep the author's wording, tone, markdown structure and line breaks. \
Tokens that look like __PLACEHOLDER_KIND_0000__ stand for protected content: \
copy them through exactly as they appear. \
Reply with the corrected text and nothing else.";

pub struct GrammarPass {
    context: PassContext,
}

impl GrammarPass {
    pub fn new(context: PassContext) -> Self {
        Self { context }
    }

    fn prompt(text: &str) -> String {
        format!("Correct the grammar and spelling in the following text:\n\n{text}")
    }
}

impl EnhancementPass for GrammarPass {
    fn name(&self) -> &'static str {
        "grammar"
    }

    fn apply(&self, text: &str, options: &EnhancementOptions) -> (String, Vec<Change>) {
        let request = GenerateRequest::new(Self::prompt(text))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(options.temperature)
            .with_max_tokens(options.max_tokens);
        self.context
            .rewrite(self.name(), request, text, line_changes)
    }
}
