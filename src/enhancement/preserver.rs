//! Placeholder-based protection of non-prose markdown.
//!
//! [`ContentPreserver::extract`] swaps code, frontmatter, HTML, math and
//! tables for opaque tokens so a rewriter only ever sees prose;
//! [`ContentPreserver::restore`] puts them back. For untouched prose the
//! round trip is byte-exact. One preserver serves one document.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::enhancement::models::PreservationStats;

const DEFAULT_PREFIX: &str = "__PLACEHOLDER";

static YAML_FRONTMATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A---\n.*?\n---(?:\n|\z)").unwrap());
static TOML_FRONTMATTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\A\+\+\+\n.*?\n\+\+\+(?:\n|\z)").unwrap());
static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```.*?```|~~~.*?~~~").unwrap());
static INDENTED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|\n)(?P<body>(?:(?:    |\t)[^\n]*\n)+)").unwrap());
static HTML_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static HTML_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\n)(?P<body><[a-zA-Z][^>]*>(?s:.*?)</[a-zA-Z][^>]*>)(?:\n|$)").unwrap()
});
static MATH_BLOCK: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$.*?\$\$").unwrap());
static INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$[^$\n]+\$").unwrap());
static TABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|\n)(?P<body>\|[^\n]+\|(?:\n\|[^\n]+\|)+)(?:\n|$)").unwrap()
});
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());
static INLINE_HTML: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<[a-zA-Z][^>]*>.*?</[a-zA-Z][^>]*>").unwrap());
static LONE_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^<>\n]*>").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceholderKind {
    Frontmatter,
    CodeBlock,
    HtmlComment,
    HtmlBlock,
    MathBlock,
    InlineMath,
    Table,
    InlineCode,
    HtmlTag,
}

impl PlaceholderKind {
    fn tag(&self) -> &'static str {
        match self {
            Self::Frontmatter => "FRONTMATTER",
            Self::CodeBlock => "CODE_BLOCK",
            Self::HtmlComment => "HTML_COMMENT",
            Self::HtmlBlock => "HTML_BLOCK",
            Self::MathBlock => "MATH_BLOCK",
            Self::InlineMath => "INLINE_MATH",
            Self::Table => "TABLE",
            Self::InlineCode => "INLINE_CODE",
            Self::HtmlTag => "HTML_TAG",
        }
    }

    pub fn name(&self) -> String {
        self.tag().to_lowercase()
    }
}

/// A protected span and the token standing in for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub token: String,
    pub content: String,
    pub kind: PlaceholderKind,
}

#[derive(Debug)]
pub struct ContentPreserver {
    prefix: String,
    placeholders: Vec<Placeholder>,
    counter: usize,
}

impl Default for ContentPreserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentPreserver {
    pub fn new() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            placeholders: Vec::new(),
            counter: 0,
        }
    }

    /// Replace protected spans with placeholder tokens.
    ///
    /// Passes run most specific first so broad patterns (inline tags) never
    /// see text an earlier pass (fenced code) already took.
    pub fn extract(&mut self, markdown: &str) -> String {
        self.choose_prefix(markdown);

        let mut text = self.protect(markdown, &YAML_FRONTMATTER, PlaceholderKind::Frontmatter);
        text = self.protect(&text, &TOML_FRONTMATTER, PlaceholderKind::Frontmatter);
        text = self.protect(&text, &FENCED_CODE, PlaceholderKind::CodeBlock);
        text = self.protect(&text, &INDENTED_CODE, PlaceholderKind::CodeBlock);
        text = self.protect(&text, &HTML_COMMENT, PlaceholderKind::HtmlComment);
        text = self.protect(&text, &HTML_BLOCK, PlaceholderKind::HtmlBlock);
        text = self.protect(&text, &MATH_BLOCK, PlaceholderKind::MathBlock);
        text = self.protect(&text, &INLINE_MATH, PlaceholderKind::InlineMath);
        text = self.protect(&text, &TABLE, PlaceholderKind::Table);
        text = self.protect(&text, &INLINE_CODE, PlaceholderKind::InlineCode);
        text = self.protect(&text, &INLINE_HTML, PlaceholderKind::HtmlTag);
        text = self.protect(&text, &LONE_TAG, PlaceholderKind::HtmlTag);

        log::debug!("preserved placeholders={}", self.placeholders.len());
        text
    }

    /// Put every protected span back.
    ///
    /// Later placeholders may contain earlier tokens (fenced code inside an
    /// indented block), so restoration walks creation order backwards.
    /// Unknown tokens are left in place and logged.
    pub fn restore(&self, text: &str) -> String {
        let mut result = text.to_string();
        for placeholder in self.placeholders.iter().rev() {
            result = result.replace(&placeholder.token, &placeholder.content);
        }

        for token in self.unresolved_tokens(&result) {
            log::warn!("unresolved placeholder token={token} left in output");
        }
        result
    }

    /// Forget all placeholders and restart the counter.
    pub fn clear(&mut self) {
        self.placeholders.clear();
        self.counter = 0;
        self.prefix = DEFAULT_PREFIX.to_string();
    }

    pub fn placeholders(&self) -> &[Placeholder] {
        &self.placeholders
    }

    pub fn stats(&self) -> PreservationStats {
        let mut stats = PreservationStats::new();
        for placeholder in &self.placeholders {
            *stats.entry(placeholder.kind.name()).or_insert(0) += 1;
        }
        stats
    }

    /// Tokens that vanished from `text`, e.g. dropped by a rewriter.
    ///
    /// A token nested inside another placeholder's content is not missing.
    pub fn missing_placeholders(&self, text: &str) -> Vec<&str> {
        self.placeholders
            .iter()
            .filter(|p| !text.contains(&p.token))
            .filter(|p| {
                !self
                    .placeholders
                    .iter()
                    .any(|other| other.token != p.token && other.content.contains(&p.token))
            })
            .map(|p| p.token.as_str())
            .collect()
    }

    /// Placeholder-shaped tokens in `text` with no matching entry.
    pub fn unresolved_tokens(&self, text: &str) -> Vec<String> {
        let pattern = format!(r"{}_[A-Z_]+?_\d{{4,}}__", regex::escape(&self.prefix));
        let Ok(re) = Regex::new(&pattern) else {
            return Vec::new();
        };
        re.find_iter(text)
            .map(|m| m.as_str().to_string())
            .filter(|token| !self.placeholders.iter().any(|p| &p.token == token))
            .collect()
    }

    /// Salt the prefix until it cannot collide with the document's text.
    fn choose_prefix(&mut self, markdown: &str) {
        if !self.placeholders.is_empty() {
            return;
        }
        let mut salt = 0;
        let mut prefix = DEFAULT_PREFIX.to_string();
        while markdown.contains(&format!("{prefix}_")) {
            salt += 1;
            prefix = format!("{DEFAULT_PREFIX}{salt}");
        }
        self.prefix = prefix;
    }

    fn create(&mut self, content: &str, kind: PlaceholderKind) -> String {
        let token = format!("{}_{}_{:04}__", self.prefix, kind.tag(), self.counter);
        self.counter += 1;
        self.placeholders.push(Placeholder {
            token: token.clone(),
            content: content.to_string(),
            kind,
        });
        token
    }

    /// Run one pass. With a `body` group only that group is replaced; the
    /// rest of the match (line breaks around blocks) is kept verbatim.
    fn protect(&mut self, text: &str, pattern: &Regex, kind: PlaceholderKind) -> String {
        pattern
            .replace_all(text, |caps: &Captures| {
                let whole = &caps[0];
                match (caps.get(0), caps.name("body")) {
                    (Some(outer), Some(body)) => {
                        let lead = &whole[..body.start() - outer.start()];
                        let tail = &whole[body.end() - outer.start()..];
                        let token = self.create(body.as_str(), kind);
                        format!("{lead}{token}{tail}")
                    }
                    _ => self.create(whole, kind),
                }
            })
            .into_owned()
    }
}
