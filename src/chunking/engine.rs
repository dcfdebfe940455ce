//! The six interchangeable splitting algorithms.
//!
//! All algorithms share one [`ChunkingConfig`] and one contract: `chunk`
//! never returns an empty sequence. Sizes are measured in characters, not
//! bytes, so multi-byte text never splits mid-codepoint.

use tracing::{debug, warn};

use crate::config::ChunkingConfig;

use super::strategy::{ChunkStrategy, split_paragraphs, split_sentences};

/// Ordered spans produced by one chunking run, plus the label of the
/// strategy that actually produced them (`"<name>_fallback"` when the
/// recursive recovery path was taken).
#[derive(Clone, Debug)]
pub struct ChunkOutput {
    pub spans: Vec<String>,
    pub strategy_label: String,
}

/// Splits raw text into ordered spans using a selected strategy.
#[derive(Clone, Debug)]
pub struct ChunkingEngine {
    config: ChunkingConfig,
}

impl ChunkingEngine {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ChunkingConfig {
        &self.config
    }

    /// Chunks `text` with the given strategy.
    ///
    /// Guarantees: empty input yields a single empty chunk; input no longer
    /// than the target size yields exactly one chunk; an algorithm that
    /// produces nothing usable is recovered locally via the recursive
    /// splitter and never surfaces a failure.
    pub fn chunk(&self, text: &str, strategy: ChunkStrategy) -> ChunkOutput {
        if text.is_empty() {
            return ChunkOutput {
                spans: vec![String::new()],
                strategy_label: strategy.name().to_string(),
            };
        }
        if char_len(text) <= self.config.chunk_size {
            return ChunkOutput {
                spans: vec![text.to_string()],
                strategy_label: strategy.name().to_string(),
            };
        }

        let spans = match strategy {
            ChunkStrategy::Recursive => self.recursive_chunk(text),
            ChunkStrategy::Semantic => self.semantic_chunk(text),
            ChunkStrategy::Markdown => self.markdown_chunk(text),
            ChunkStrategy::Paragraph => self.paragraph_chunk(text),
            ChunkStrategy::Sentence => self.sentence_chunk(text),
            ChunkStrategy::SlidingWindow => self.sliding_window_chunk(text),
        };

        if spans.is_empty() {
            warn!(
                strategy = strategy.name(),
                "strategy produced no chunks, recovering with recursive splitter"
            );
            let mut spans = self.recursive_chunk(text);
            if spans.is_empty() {
                spans = vec![text.to_string()];
            }
            return ChunkOutput {
                spans,
                strategy_label: format!("{}_fallback", strategy.name()),
            };
        }

        debug!(
            strategy = strategy.name(),
            chunks = spans.len(),
            "chunking complete"
        );
        ChunkOutput {
            spans,
            strategy_label: strategy.name().to_string(),
        }
    }

    /// Auto-selects a strategy first, then chunks.
    pub fn chunk_auto(&self, text: &str) -> ChunkOutput {
        self.chunk(text, ChunkStrategy::auto_select(text))
    }

    /// Applies separators in priority order, recursively splitting any span
    /// still over the target size with the next separator, then greedily
    /// re-merges fragments into chunks that carry the configured overlap.
    fn recursive_chunk(&self, text: &str) -> Vec<String> {
        let mut fragments = Vec::new();
        self.split_by_separators(text, &self.config.separators, &mut fragments);
        let mut chunks = self.merge_fragments(fragments);

        // Fold a trailing runt into its neighbour when the result still fits
        // under the hard ceiling.
        if chunks.len() > 1 {
            let last_len = char_len(chunks.last().map(String::as_str).unwrap_or_default());
            if last_len < self.config.min_chunk_size {
                let prev_len = char_len(&chunks[chunks.len() - 2]);
                if prev_len + last_len <= self.config.max_chunk_size {
                    let tail = chunks.pop().unwrap_or_default();
                    if let Some(prev) = chunks.last_mut() {
                        prev.push_str(&tail);
                    }
                }
            }
        }
        chunks
    }

    fn split_by_separators(&self, text: &str, separators: &[String], out: &mut Vec<String>) {
        if char_len(text) <= self.config.chunk_size {
            out.push(text.to_string());
            return;
        }
        let Some((separator, rest)) = separators.split_first() else {
            out.push(text.to_string());
            return;
        };

        let pieces = if separator.is_empty() {
            split_fixed(text, self.config.chunk_size)
        } else {
            split_on(text, separator, self.config.keep_separator)
        };

        if pieces.len() <= 1 {
            // Separator absent from this span; try the next one.
            self.split_by_separators(text, rest, out);
            return;
        }

        for piece in pieces {
            if char_len(&piece) <= self.config.chunk_size {
                out.push(piece);
            } else {
                self.split_by_separators(&piece, rest, out);
            }
        }
    }

    /// Greedy accumulation of fragments into chunks of at most the target
    /// size, keeping a tail of fragments within the overlap budget when a
    /// chunk is flushed.
    fn merge_fragments(&self, fragments: Vec<String>) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<String> = Vec::new();
        let mut current_len = 0usize;

        for fragment in fragments {
            let fragment_len = char_len(&fragment);
            if current_len + fragment_len > self.config.chunk_size && !current.is_empty() {
                chunks.push(current.concat());
                while !current.is_empty()
                    && (current_len > self.config.chunk_overlap
                        || current_len + fragment_len > self.config.chunk_size)
                {
                    let removed = current.remove(0);
                    current_len -= char_len(&removed);
                }
            }
            current_len += fragment_len;
            current.push(fragment);
        }

        if !current.is_empty() {
            let joined = current.concat();
            if !joined.is_empty() {
                chunks.push(joined);
            }
        }
        chunks
    }

    /// Greedily accumulates paragraphs; a single paragraph over the target
    /// size is itself split recursively.
    fn semantic_chunk(&self, text: &str) -> Vec<String> {
        self.accumulate_paragraphs(text, true)
    }

    /// Identical accumulation to `semantic`, but oversized paragraphs are
    /// kept whole.
    fn paragraph_chunk(&self, text: &str) -> Vec<String> {
        self.accumulate_paragraphs(text, false)
    }

    fn accumulate_paragraphs(&self, text: &str, split_oversized: bool) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for paragraph in split_paragraphs(text) {
            let paragraph_len = char_len(paragraph);

            if split_oversized && paragraph_len > self.config.chunk_size {
                if !current.is_empty() {
                    chunks.push(current.join("\n\n"));
                    current.clear();
                    current_len = 0;
                }
                chunks.extend(self.recursive_chunk(paragraph));
            } else if current_len + paragraph_len > self.config.chunk_size && !current.is_empty() {
                chunks.push(current.join("\n\n"));
                current = vec![paragraph];
                current_len = paragraph_len;
            } else {
                current.push(paragraph);
                // +2 accounts for the joining blank line.
                current_len += paragraph_len + 2;
            }
        }

        if !current.is_empty() {
            chunks.push(current.join("\n\n"));
        }
        chunks
    }

    /// Splits on sentence boundaries and greedily accumulates sentences up
    /// to the target size.
    fn sentence_chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut current: Vec<&str> = Vec::new();
        let mut current_len = 0usize;

        for sentence in split_sentences(text) {
            let sentence_len = char_len(sentence);
            if current_len + sentence_len > self.config.chunk_size && !current.is_empty() {
                chunks.push(current.join(" "));
                current = vec![sentence];
                current_len = sentence_len;
            } else {
                current.push(sentence);
                current_len += sentence_len + 1;
            }
        }

        if !current.is_empty() {
            chunks.push(current.join(" "));
        }
        chunks
    }

    /// Splits on heading boundaries, keeping each heading attached to its
    /// section; oversized sections fall through to the recursive splitter.
    fn markdown_chunk(&self, text: &str) -> Vec<String> {
        let mut chunks = Vec::new();
        for section in split_markdown_sections(text) {
            if char_len(&section) > self.config.chunk_size {
                chunks.extend(self.recursive_chunk(&section));
            } else {
                chunks.push(section);
            }
        }
        chunks
    }

    /// Fixed-size windows with whitespace back-off in the trailing 10% and a
    /// `target - overlap` advance. A non-progress guard terminates the loop
    /// when the overlap would push the next start at or before the current
    /// one.
    fn sliding_window_chunk(&self, text: &str) -> Vec<String> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let size = self.config.chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut start = 0usize;

        while start < total {
            let mut end = start + size;
            if end < total {
                let search_start = end.saturating_sub(size / 10).max(start + 1);
                if let Some(break_point) = (search_start..end).rev().find(|&i| chars[i] == ' ') {
                    if break_point > start {
                        end = break_point;
                    }
                }
            }

            let slice_end = end.min(total);
            let window: String = chars[start..slice_end].iter().collect();
            let trimmed = window.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }

            let next = end.saturating_sub(self.config.chunk_overlap);
            if next <= start {
                break;
            }
            start = next;
        }
        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Splits into fixed-size character windows (the empty-string separator).
fn split_fixed(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size.max(1))
        .map(|window| window.iter().collect())
        .collect()
}

/// Splits on a separator, optionally retaining it at the end of the
/// preceding fragment so that concatenation reconstructs the input.
fn split_on(text: &str, separator: &str, keep_separator: bool) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut start = 0usize;

    while let Some(found) = text[start..].find(separator) {
        let separator_start = start + found;
        let end = if keep_separator {
            separator_start + separator.len()
        } else {
            separator_start
        };
        if end > start {
            pieces.push(text[start..end].to_string());
        }
        start = separator_start + separator.len();
    }

    if start < text.len() {
        pieces.push(text[start..].to_string());
    }
    pieces
}

/// Cuts the text into sections at `#`/`##`/`###` heading lines, each heading
/// staying attached to the content below it. Content before the first
/// heading forms its own section.
fn split_markdown_sections(text: &str) -> Vec<String> {
    let mut sections = Vec::new();
    let mut current = String::new();

    for line in text.lines() {
        if is_markdown_heading(line) && !current.trim().is_empty() {
            sections.push(current.trim().to_string());
            current.clear();
        }
        current.push_str(line);
        current.push('\n');
    }

    let tail = current.trim();
    if !tail.is_empty() {
        sections.push(tail.to_string());
    }
    sections
}

fn is_markdown_heading(line: &str) -> bool {
    let hashes = line.chars().take_while(|&c| c == '#').count();
    (1..=3).contains(&hashes)
        && line
            .chars()
            .nth(hashes)
            .is_some_and(|c| c.is_whitespace())
}
