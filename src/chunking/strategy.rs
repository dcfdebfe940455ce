//! Strategy selection heuristics.
//!
//! Selection is a pure function of the text's surface structure: no
//! configuration, no side effects, deterministic for identical input. The
//! decision order is first-match-wins, so a markdown heading beats every
//! other signal.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;

/// Texts shorter than this may use the sentence strategy.
const SENTENCE_MAX_LEN: usize = 5000;
/// Texts longer than this fall back to fixed-size windows.
const SLIDING_WINDOW_MIN_LEN: usize = 10_000;
/// More paragraphs than this selects the paragraph strategy.
const PARAGRAPH_THRESHOLD: usize = 3;
/// More sentences than this (on short texts) selects the sentence strategy.
const SENTENCE_THRESHOLD: usize = 10;

/// The closed set of chunking algorithms.
///
/// Adding a strategy is an explicit enum extension, not a runtime-registered
/// mapping; every variant has exactly one implementation in
/// [`crate::chunking::engine::ChunkingEngine`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChunkStrategy {
    Recursive,
    Semantic,
    Markdown,
    Paragraph,
    Sentence,
    SlidingWindow,
}

impl ChunkStrategy {
    /// Canonical snake_case name, as recorded in chunk metadata.
    pub fn name(self) -> &'static str {
        match self {
            ChunkStrategy::Recursive => "recursive",
            ChunkStrategy::Semantic => "semantic",
            ChunkStrategy::Markdown => "markdown",
            ChunkStrategy::Paragraph => "paragraph",
            ChunkStrategy::Sentence => "sentence",
            ChunkStrategy::SlidingWindow => "sliding_window",
        }
    }

    /// Parses a strategy name, falling back to [`ChunkStrategy::Recursive`]
    /// for anything unrecognized. Unknown names are a caller mistake worth a
    /// warning, not a failure.
    pub fn parse(name: &str) -> Self {
        match name {
            "recursive" => ChunkStrategy::Recursive,
            "semantic" => ChunkStrategy::Semantic,
            "markdown" => ChunkStrategy::Markdown,
            "paragraph" => ChunkStrategy::Paragraph,
            "sentence" => ChunkStrategy::Sentence,
            "sliding_window" => ChunkStrategy::SlidingWindow,
            other => {
                tracing::warn!(strategy = other, "unknown chunking strategy, using recursive");
                ChunkStrategy::Recursive
            }
        }
    }

    /// Picks a strategy from the text's surface structure.
    ///
    /// Decision order (first match wins): markdown headings, code-heavy text,
    /// paragraph structure, many short sentences, very long documents, and
    /// finally the semantic default.
    pub fn auto_select(text: &str) -> Self {
        if markdown_heading_re().is_match(text) {
            return ChunkStrategy::Markdown;
        }

        if text.contains("```") || text.matches("\n    ").count() > 5 {
            return ChunkStrategy::Recursive;
        }

        if split_paragraphs(text).count() > PARAGRAPH_THRESHOLD {
            return ChunkStrategy::Paragraph;
        }

        let char_len = text.chars().count();
        if sentence_count(text) > SENTENCE_THRESHOLD && char_len < SENTENCE_MAX_LEN {
            return ChunkStrategy::Sentence;
        }

        if char_len > SLIDING_WINDOW_MIN_LEN {
            return ChunkStrategy::SlidingWindow;
        }

        ChunkStrategy::Semantic
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn markdown_heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#{1,6}\s").expect("valid regex"))
}

fn paragraph_boundary_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").expect("valid regex"))
}

/// Splits on blank-line boundaries, keeping empty fragments out.
pub(crate) fn split_paragraphs(text: &str) -> impl Iterator<Item = &str> {
    paragraph_boundary_re()
        .split(text)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
}

/// Splits after sentence-terminating punctuation followed by whitespace,
/// keeping the terminator attached to its sentence. The regex crate has no
/// lookbehind, so this walks the text manually.
pub(crate) fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?') {
            // Swallow any run of terminators before checking for whitespace.
            while let Some(&(_, next)) = chars.peek() {
                if matches!(next, '.' | '!' | '?') {
                    chars.next();
                } else {
                    break;
                }
            }
            if let Some(&(next_idx, next)) = chars.peek() {
                if next.is_whitespace() {
                    let sentence = text[start..next_idx].trim();
                    if !sentence.is_empty() {
                        sentences.push(sentence);
                    }
                    start = next_idx;
                }
            }
        }
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }
    sentences
}

fn sentence_count(text: &str) -> usize {
    split_sentences(text).len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_heading_wins() {
        assert_eq!(
            ChunkStrategy::auto_select("# Title\n\nBody"),
            ChunkStrategy::Markdown
        );
    }

    #[test]
    fn code_fences_pick_recursive() {
        assert_eq!(
            ChunkStrategy::auto_select("intro\n```rust\nfn main() {}\n```"),
            ChunkStrategy::Recursive
        );
    }

    #[test]
    fn many_paragraphs_pick_paragraph() {
        let text = "one\n\ntwo\n\nthree\n\nfour\n\nfive";
        assert_eq!(ChunkStrategy::auto_select(text), ChunkStrategy::Paragraph);
    }

    #[test]
    fn many_short_sentences_pick_sentence() {
        let text = "This is a sentence. ".repeat(15);
        assert!(text.chars().count() < SENTENCE_MAX_LEN);
        assert_eq!(ChunkStrategy::auto_select(&text), ChunkStrategy::Sentence);
    }

    #[test]
    fn very_long_text_picks_sliding_window() {
        let text = "word ".repeat(2500);
        assert!(text.chars().count() > SLIDING_WINDOW_MIN_LEN);
        assert_eq!(
            ChunkStrategy::auto_select(&text),
            ChunkStrategy::SlidingWindow
        );
    }

    #[test]
    fn plain_prose_defaults_to_semantic() {
        assert_eq!(
            ChunkStrategy::auto_select("Just a short note without structure"),
            ChunkStrategy::Semantic
        );
    }

    #[test]
    fn unknown_name_falls_back_to_recursive() {
        assert_eq!(ChunkStrategy::parse("quantum"), ChunkStrategy::Recursive);
        assert_eq!(ChunkStrategy::parse("markdown"), ChunkStrategy::Markdown);
    }

    #[test]
    fn sentence_splitting_keeps_terminators() {
        let sentences = split_sentences("First one. Second two! Third three? Tail");
        assert_eq!(
            sentences,
            vec!["First one.", "Second two!", "Third three?", "Tail"]
        );
    }

    #[test]
    fn selection_is_deterministic() {
        let text = "Some text. With a couple of sentences.";
        assert_eq!(
            ChunkStrategy::auto_select(text),
            ChunkStrategy::auto_select(text)
        );
    }
}
