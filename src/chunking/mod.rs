//! Adaptive chunking: strategy selection, splitting algorithms, and
//! content-addressed chunk identity.
//!
//! * [`strategy`] — classifies raw text to pick a splitting algorithm.
//! * [`engine`] — the six interchangeable splitting algorithms.
//! * [`identity`] — stable chunk ids and per-chunk metadata.

pub mod engine;
pub mod identity;
pub mod strategy;

pub use engine::{ChunkOutput, ChunkingEngine};
pub use identity::{build_chunks, chunk_id, document_id, token_count};
pub use strategy::ChunkStrategy;
