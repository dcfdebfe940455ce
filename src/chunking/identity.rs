//! Content-addressed chunk identity and metadata enrichment.
//!
//! Ids are a pure function of (owning document id, chunk content), so
//! re-ingesting identical input upserts instead of duplicating, and any
//! content change produces a fresh id.

use sha2::{Digest, Sha256};

use crate::types::{Chunk, ChunkMetadata, Document};

/// Stable chunk id: first 16 hex characters of
/// SHA-256(`"<document_id>:<content>"`).
pub fn chunk_id(document_id: &str, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document_id.as_bytes());
    hasher.update(b":");
    hasher.update(content.as_bytes());
    hex_prefix(&hasher.finalize(), 16)
}

/// Deterministic document id derived from the source label and a content
/// prefix. Deliberately not timestamped: a random or timestamped component
/// would change every chunk id on re-ingestion and defeat upsert semantics.
pub fn document_id(source: &str, content: &str) -> String {
    let prefix: String = content.chars().take(1000).collect();
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    hasher.update(b":");
    hasher.update(prefix.as_bytes());
    format!("doc-{}", hex_prefix(&hasher.finalize(), 12))
}

fn hex_prefix(digest: &[u8], hex_chars: usize) -> String {
    let mut out = String::with_capacity(hex_chars);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
        if out.len() >= hex_chars {
            break;
        }
    }
    out.truncate(hex_chars);
    out
}

/// Approximate token count. Uses the cl100k_base encoder when the
/// `tokenizer-tiktoken` feature is enabled and the encoder loads; otherwise
/// falls back to whitespace word counting.
pub fn token_count(text: &str) -> usize {
    #[cfg(feature = "tokenizer-tiktoken")]
    {
        use std::sync::OnceLock;
        static ENCODER: OnceLock<Option<tiktoken_rs::CoreBPE>> = OnceLock::new();
        if let Some(encoder) = ENCODER.get_or_init(|| tiktoken_rs::cl100k_base().ok()) {
            return encoder.encode_ordinary(text).len();
        }
    }
    text.split_whitespace().count()
}

/// Turns ordered text spans into immutable [`Chunk`] values carrying ordinal
/// position, sibling count, size measures, and the producing strategy label.
pub fn build_chunks(document: &Document, spans: Vec<String>, strategy_label: &str) -> Vec<Chunk> {
    let total_chunks = spans.len();
    spans
        .into_iter()
        .enumerate()
        .map(|(chunk_index, content)| {
            let metadata = ChunkMetadata {
                source: document.source.clone(),
                chunk_index,
                total_chunks,
                token_count: token_count(&content),
                char_count: content.chars().count(),
                strategy: strategy_label.to_string(),
                document: document.metadata.clone(),
            };
            Chunk {
                id: chunk_id(&document.id, &content),
                document_id: document.id.clone(),
                content,
                metadata,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_document() -> Document {
        Document {
            id: "doc-abc123".to_string(),
            content: "alpha beta gamma".to_string(),
            source: "notes.txt".to_string(),
            metadata: serde_json::json!({"file_type": "txt"}),
        }
    }

    #[test]
    fn chunk_id_is_deterministic() {
        let a = chunk_id("doc-1", "some chunk content");
        let b = chunk_id("doc-1", "some chunk content");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn chunk_id_changes_with_either_input() {
        let base = chunk_id("doc-1", "content");
        assert_ne!(base, chunk_id("doc-2", "content"));
        assert_ne!(base, chunk_id("doc-1", "content!"));
    }

    #[test]
    fn document_id_is_stable_across_runs() {
        let a = document_id("notes.txt", "same content");
        let b = document_id("notes.txt", "same content");
        assert_eq!(a, b);
        assert!(a.starts_with("doc-"));
    }

    #[test]
    fn build_chunks_numbers_siblings() {
        let document = test_document();
        let chunks = build_chunks(
            &document,
            vec!["alpha".to_string(), "beta".to_string()],
            "semantic",
        );
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].metadata.chunk_index, 0);
        assert_eq!(chunks[1].metadata.chunk_index, 1);
        assert!(chunks.iter().all(|c| c.metadata.total_chunks == 2));
        assert!(chunks.iter().all(|c| c.metadata.strategy == "semantic"));
        assert_eq!(chunks[0].metadata.char_count, 5);
        assert_eq!(chunks[0].metadata.document["file_type"], "txt");
        assert_ne!(chunks[0].id, chunks[1].id);
    }

    #[test]
    fn token_count_is_positive_for_words() {
        assert!(token_count("three plain words") >= 3);
        assert_eq!(token_count(""), 0);
    }
}
