//! The semantic detector: embed the prompt, query the index, keep neighbours
//! above the policy threshold.

use std::sync::Arc;

use tracing::{debug, warn};

use firewall_types::{Finding, FindingType};

use crate::embedder::Embedder;
use crate::index::VectorIndex;

/// What a semantic detection pass produced.
#[derive(Debug, Default)]
pub struct SemanticOutcome {
    pub findings: Vec<Finding>,
    /// Set when the embedder or index failed; the pass contributed nothing
    /// but the request as a whole is still valid.
    pub degraded: bool,
}

/// Composes an [`Embedder`] and a [`VectorIndex`] into a detector.
pub struct SemanticDetector {
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    max_embed_chars: usize,
    top_k: usize,
}

impl SemanticDetector {
    pub const DEFAULT_MAX_EMBED_CHARS: usize = 2048;
    pub const DEFAULT_TOP_K: usize = 5;

    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<dyn VectorIndex>) -> Self {
        Self {
            embedder,
            index,
            max_embed_chars: Self::DEFAULT_MAX_EMBED_CHARS,
            top_k: Self::DEFAULT_TOP_K,
        }
    }

    pub fn with_max_embed_chars(mut self, max_embed_chars: usize) -> Self {
        self.max_embed_chars = max_embed_chars;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Run semantic detection over `text` with the policy's similarity
    /// `threshold`.
    ///
    /// Never returns an error: backend failures degrade to an empty finding
    /// list with the `degraded` flag set, leaving the decision to the other
    /// detectors.
    pub async fn detect(&self, text: &str, threshold: f64) -> SemanticOutcome {
        let truncated = truncate_chars(text, self.max_embed_chars);

        let vector = match self.embedder.embed(truncated).await {
            Ok(v) => v,
            Err(err) => {
                warn!(%err, "embedding failed; semantic detector degraded");
                return SemanticOutcome {
                    findings: Vec::new(),
                    degraded: true,
                };
            }
        };

        let neighbours = match self.index.search(&vector, self.top_k).await {
            Ok(n) => n,
            Err(err) => {
                warn!(%err, "vector index query failed; semantic detector degraded");
                return SemanticOutcome {
                    findings: Vec::new(),
                    degraded: true,
                };
            }
        };

        let findings = neighbours
            .into_iter()
            .filter(|n| f64::from(n.similarity) >= threshold)
            .map(|n| {
                debug!(
                    reference = %n.entry.id,
                    similarity = f64::from(n.similarity),
                    "semantic match above threshold"
                );
                Finding::new(
                    FindingType::Semantic,
                    n.entry.label.clone(),
                    n.entry.category.clone(),
                    n.entry.severity,
                    f64::from(n.similarity),
                    vec![(0, text.len())],
                )
                .with_metadata("similarity", format!("{:.4}", n.similarity))
                .with_metadata("reference_id", n.entry.id)
            })
            .collect();

        SemanticOutcome {
            findings,
            degraded: false,
        }
    }
}

/// Truncate to at most `max_chars` characters, never splitting a character.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
