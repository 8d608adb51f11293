//! Change detection between a pass's input and output.
//!
//! Built on `similar`'s Myers diff. Line and word alignment drive the
//! grammar/spelling report, sentence alignment drives the clarity report.

use once_cell::sync::Lazy;
use regex::Regex;
use similar::{capture_diff_slices, Algorithm, DiffOp, TextDiff};

use crate::enhancement::models::{Change, ChangeType};

const WORD_CONFIDENCE: f32 = 0.9;
const SENTENCE_CONFIDENCE: f32 = 0.8;

static SENTENCE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]\s+").unwrap());

/// Word-level changes for every pair of replaced lines.
///
/// Only lines that were replaced one-for-one are compared. Pure insertions
/// and deletions of whole lines carry no word pairing and are not reported.
pub fn line_changes(original: &str, enhanced: &str) -> Vec<Change> {
    let old_lines: Vec<&str> = original.lines().collect();
    let new_lines: Vec<&str> = enhanced.lines().collect();

    let mut changes = Vec::new();
    for op in capture_diff_slices(Algorithm::Myers, &old_lines, &new_lines) {
        if let DiffOp::Replace {
            old_index,
            old_len,
            new_index,
            new_len,
        } = op
        {
            for k in 0..old_len.min(new_len) {
                let line_number = old_index + k + 1;
                changes.extend(word_changes(
                    old_lines[old_index + k],
                    new_lines[new_index + k],
                    line_number,
                ));
            }
        }
    }
    changes
}

/// Replaced word runs within one line.
pub fn word_changes(old_line: &str, new_line: &str, line_number: usize) -> Vec<Change> {
    let old_words: Vec<&str> = old_line.split_whitespace().collect();
    let new_words: Vec<&str> = new_line.split_whitespace().collect();

    capture_diff_slices(Algorithm::Myers, &old_words, &new_words)
        .into_iter()
        .filter_map(|op| match op {
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                let original = old_words[old_index..old_index + old_len].join(" ");
                let enhanced = new_words[new_index..new_index + new_len].join(" ");
                let change_type = classify_word_change(&original, &enhanced);
                let reason = match change_type {
                    ChangeType::Spelling => "Spelling correction",
                    _ => "Grammar improvement",
                };
                Some(Change {
                    change_type,
                    line_number: Some(line_number),
                    original,
                    enhanced,
                    reason: reason.to_string(),
                    confidence: WORD_CONFIDENCE,
                })
            }
            _ => None,
        })
        .collect()
}

/// Same length but different letters reads as a typo fix.
pub fn classify_word_change(original: &str, enhanced: &str) -> ChangeType {
    if original.chars().count() == enhanced.chars().count()
        && original.to_lowercase() != enhanced.to_lowercase()
    {
        ChangeType::Spelling
    } else {
        ChangeType::Grammar
    }
}

/// Split on sentence-ending punctuation followed by whitespace.
///
/// The punctuation stays with its sentence; blank pieces are dropped.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    for m in SENTENCE_END.find_iter(text) {
        // end of the punctuation mark, before the whitespace
        let end = m.start() + 1;
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = m.end();
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        sentences.push(rest);
    }
    sentences
}

/// Sentence rewrites, one change per replaced run of sentences.
pub fn sentence_changes(original: &str, enhanced: &str) -> Vec<Change> {
    if original == enhanced {
        return Vec::new();
    }
    let old_sentences = split_sentences(original);
    let new_sentences = split_sentences(enhanced);

    capture_diff_slices(Algorithm::Myers, &old_sentences, &new_sentences)
        .into_iter()
        .filter_map(|op| match op {
            DiffOp::Replace {
                old_index,
                old_len,
                new_index,
                new_len,
            } => {
                let before = old_sentences[old_index..old_index + old_len].join(" ");
                let after = new_sentences[new_index..new_index + new_len].join(" ");
                (before != after).then(|| Change {
                    change_type: ChangeType::Clarity,
                    line_number: None,
                    reason: clarity_reason(&before, &after).to_string(),
                    original: before,
                    enhanced: after,
                    confidence: SENTENCE_CONFIDENCE,
                })
            }
            _ => None,
        })
        .collect()
}

/// Describe a sentence rewrite by how its shape changed.
pub fn clarity_reason(original: &str, enhanced: &str) -> &'static str {
    let original_lower = original.to_lowercase();
    let enhanced_lower = enhanced.to_lowercase();

    if enhanced.split_whitespace().count() < original.split_whitespace().count() {
        "Simplified complex sentence"
    } else if original_lower.contains("which") && !enhanced_lower.contains("which") {
        "Improved sentence structure"
    } else if enhanced.matches(',').count() < original.matches(',').count() {
        "Reduced complexity"
    } else {
        "Improved clarity"
    }
}

/// Unified diff with `original`/`enhanced` headers, empty when identical.
pub fn unified_diff(original: &str, enhanced: &str) -> String {
    if original == enhanced {
        return String::new();
    }
    TextDiff::from_lines(original, enhanced)
        .unified_diff()
        .header("original", "enhanced")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spelling_and_grammar_on_lines() {
        let original = "# Title\nThe quikc fox.\nThey was here.\nUnchanged line.";
        let enhanced = "# Title\nThe quick fox.\nThey were here.\nUnchanged line.";

        let changes = line_changes(original, enhanced);
        assert_eq!(changes.len(), 2);

        assert_eq!(changes[0].change_type, ChangeType::Spelling);
        assert_eq!(changes[0].line_number, Some(2));
        assert_eq!(changes[0].original, "quikc");
        assert_eq!(changes[0].enhanced, "quick");
        assert_eq!(changes[0].reason, "Spelling correction");

        assert_eq!(changes[1].change_type, ChangeType::Grammar);
        assert_eq!(changes[1].line_number, Some(3));
        assert_eq!(changes[1].original, "was");
        assert_eq!(changes[1].enhanced, "were");
    }

    #[test]
    fn test_inserted_lines_not_reported() {
        let changes = line_changes("one\ntwo", "one\nextra\ntwo");
        assert!(changes.is_empty());
    }

    #[test]
    fn test_classify() {
        assert_eq!(classify_word_change("teh", "the"), ChangeType::Spelling);
        assert_eq!(classify_word_change("is", "are"), ChangeType::Grammar);
        // case-only fixes are grammar
        assert_eq!(classify_word_change("python", "Python"), ChangeType::Grammar);
    }

    #[test]
    fn test_split_sentences() {
        assert_eq!(
            split_sentences("First one. Second one!  Third?\nFourth"),
            vec!["First one.", "Second one!", "Third?", "Fourth"]
        );
        assert!(split_sentences("   ").is_empty());
        assert_eq!(split_sentences("v1.2 is out."), vec!["v1.2 is out."]);
    }

    #[test]
    fn test_sentence_changes() {
        let original = "Intro stays. In order to run the tool, you will need to first install it. Done.";
        let enhanced = "Intro stays. Install the tool before running it. Done.";

        let changes = sentence_changes(original, enhanced);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Clarity);
        assert_eq!(changes[0].line_number, None);
        assert_eq!(changes[0].reason, "Simplified complex sentence");
        assert_eq!(
            changes[0].original,
            "In order to run the tool, you will need to first install it."
        );
        assert!(sentence_changes(original, original).is_empty());
    }

    #[test]
    fn test_sentence_run_is_joined() {
        let changes = sentence_changes("Keep. Old one. Old two. End.", "Keep. New one. New two. End.");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].original, "Old one. Old two.");
        assert_eq!(changes[0].enhanced, "New one. New two.");
    }

    #[test]
    fn test_clarity_reasons() {
        assert_eq!(
            clarity_reason("one two three four", "one two three"),
            "Simplified complex sentence"
        );
        assert_eq!(
            clarity_reason("The tool, which is fast, works", "The fast tool really, truly works"),
            "Improved sentence structure"
        );
        assert_eq!(
            clarity_reason("a, b, c d e", "a b, c d e"),
            "Reduced complexity"
        );
        assert_eq!(clarity_reason("short one", "a short one"), "Improved clarity");
    }

    #[test]
    fn test_unified_diff() {
        assert_eq!(unified_diff("same\n", "same\n"), "");

        let diff = unified_diff("line one\nteh line\n", "line one\nthe line\n");
        assert!(diff.contains("--- original"));
        assert!(diff.contains("+++ enhanced"));
        assert!(diff.contains("-teh line"));
        assert!(diff.contains("+the line"));
    }
}
