//! # semantic-detect
//!
//! Similarity-based detection layer of the promptgate prompt firewall.
//!
//! Known-sensitive reference texts are embedded into fixed-dimensional
//! vectors and stored in a [`VectorIndex`](index::VectorIndex); at request
//! time the prompt is embedded and its nearest neighbours above the policy's
//! similarity threshold become findings.
//!
//! Both the [`Embedder`](embedder::Embedder) and the index are traits so
//! model-backed embedders and external ANN stores drop in without touching
//! the detector. The crate ships deterministic in-process implementations of
//! each.

pub mod detector;
pub mod embedder;
pub mod index;

pub use detector::{SemanticDetector, SemanticOutcome};
pub use embedder::{EmbedError, Embedder, HashEmbedder};
pub use index::{IndexError, MemoryVectorIndex, ReferenceEntry, ScoredReference, VectorIndex};
