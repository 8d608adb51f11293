//! Markup to plain prose before chunking.
//!
//! Markdown code fences and inline code spans are removed first, whatever
//! the input looks like, since markdown pages often carry raw HTML blocks.
//! HTML is then walked element by element: `script`, `style`, `code` and
//! `pre` subtrees are dropped so code never reaches the embedding model,
//! headings become `#` lines so chunks keep a section label, and block
//! elements become paragraph breaks. Plain markdown only has inline tags
//! removed.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Node};

use crate::cache::sha256_hex;

static HTML_DETECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)<(?:!doctype|html|head|body|div|p|h[1-6]|article|section|main|ul|ol|li|table|nav|pre)[\s>/]")
        .unwrap()
});
static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)(?:```.*?```|~~~.*?~~~)").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`[^`\n]+`").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());
static INLINE_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]+").unwrap());
static EXTRA_NEWLINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "code", "pre", "noscript", "template"];

const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "header", "hr", "li", "main", "nav", "ol", "p", "section",
    "table", "td", "th", "tr", "ul",
];

/// Plain prose from an HTML page or a markdown document.
pub fn extract_prose(content: &str) -> String {
    let content = strip_markdown_code(content);
    let text = if HTML_DETECT.is_match(&content) {
        html_to_prose(&content)
    } else {
        HTML_TAG.replace_all(&content, "").into_owned()
    };
    normalize_whitespace(&text)
}

fn html_to_prose(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut out = String::new();
    walk(document.root_element(), &mut out);
    out
}

fn walk(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            let name = child_element.value().name();
            if SKIPPED_ELEMENTS.contains(&name) {
                continue;
            }

            if let Some(level) = heading_level(name) {
                let heading: String = child_element.text().collect::<Vec<_>>().join(" ");
                let heading = INLINE_SPACE.replace_all(heading.trim(), " ");
                if !heading.is_empty() {
                    out.push_str("\n\n");
                    out.push_str(&"#".repeat(level));
                    out.push(' ');
                    out.push_str(&heading);
                    out.push_str("\n\n");
                }
                continue;
            }

            let block = BLOCK_ELEMENTS.contains(&name);
            if block {
                out.push_str("\n\n");
            }
            walk(child_element, out);
            if block {
                out.push_str("\n\n");
            }
        } else if let Node::Text(text) = child.value() {
            out.push_str(text);
        }
    }
}

fn heading_level(name: &str) -> Option<usize> {
    match name {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn strip_markdown_code(content: &str) -> String {
    let text = FENCED_CODE.replace_all(content, "");
    INLINE_CODE.replace_all(&text, "").into_owned()
}

fn normalize_whitespace(text: &str) -> String {
    let lines: Vec<String> = text
        .lines()
        .map(|line| INLINE_SPACE.replace_all(line.trim(), " ").into_owned())
        .collect();
    let joined = lines.join("\n");
    EXTRA_NEWLINES.replace_all(&joined, "\n\n").trim().to_string()
}

/// SHA-256 hex digest of `text`.
pub fn content_hash(text: &str) -> String {
    sha256_hex(text.as_bytes())
}

/// Cache key for the embedding of `text`.
pub fn embedding_cache_key(text: &str) -> String {
    let hash = content_hash(text);
    format!("embedding:{}", &hash[..16])
}
