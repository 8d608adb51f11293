//! Clarity and readability pass.

use crate::enhancement::diff::sentence_changes;
use crate::enhancement::models::{Change, EnhancementOptions};
use crate::enhancement::{EnhancementPass, PassContext};
use crate::providers::GenerateRequest;

const SYSTEM_PROMPT: &str = "You edit technical documentation for readability. \
Break up long sentences, prefer active voice and remove filler words. \
Never drop facts, commands, names or numbers. \
Keep headings, lists and other markdown structure. \
Tokens that look like __PLACEHOLDER_KIND_0000__ stand for protected content: \
copy them through exactly as they appear. \
Reply with the rewritten text and nothing else.";

pub struct ClarityPass {
    context: PassContext,
}

impl ClarityPass {
    pub fn new(context: PassContext) -> Self {
        Self { context }
    }

    fn prompt(text: &str) -> String {
        format!(
            "Make the following documentation clearer and easier to read \
             while keeping all of its information:\n\n{text}"
        )
    }
}

impl EnhancementPass for ClarityPass {
    fn name(&self) -> &'static str {
        "clarity"
    }

    fn apply(&self, text: &str, options: &EnhancementOptions) -> (String, Vec<Change>) {
        let request = GenerateRequest::new(Self::prompt(text))
            .with_system_prompt(SYSTEM_PROMPT)
            .with_temperature(options.temperature)
            .with_max_tokens(options.max_tokens);
        self.context
            .rewrite(self.name(), request, text, sentence_changes)
    }
}
