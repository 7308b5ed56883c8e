//! Nearest-neighbour storage for known-sensitive reference embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use firewall_types::Severity;

/// Errors raised by a vector index backend.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("vector index unavailable: {0}")]
    Unavailable(String),

    #[error("query vector has dimension {got}, index expects {expected}")]
    DimensionMismatch { got: usize, expected: usize },

    #[error("vector index query failed: {0}")]
    Backend(String),
}

/// A stored reference: a labelled embedding of known-sensitive content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEntry {
    /// Stable identifier, unique within the index.
    pub id: String,
    /// Human-readable label reported as the finding's pattern name.
    pub label: String,
    pub category: String,
    pub severity: Severity,
    pub vector: Vec<f32>,
}

/// One search result: a reference and its cosine similarity to the query.
#[derive(Debug, Clone)]
pub struct ScoredReference {
    pub entry: ReferenceEntry,
    pub similarity: f32,
}

/// Approximate nearest-neighbour search over reference embeddings.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// The `top_k` references nearest to `vector` by cosine similarity,
    /// ordered most-similar first.
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredReference>, IndexError>;
}

// ---------------------------------------------------------------------------
// MemoryVectorIndex
// ---------------------------------------------------------------------------

/// Exact-scan in-process index.
///
/// Fine for reference sets in the thousands; larger deployments put an ANN
/// store behind the same trait.
#[derive(Debug, Default)]
pub struct MemoryVectorIndex {
    entries: Vec<ReferenceEntry>,
}

impl MemoryVectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a reference, replacing any existing entry with the same id.
    pub fn insert(&mut self, entry: ReferenceEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.id == entry.id) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    /// Remove a reference by id; returns whether anything was removed.
    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        self.entries.len() != before
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Cosine similarity of two equal-length vectors; 0.0 when either is all
/// zeros.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<ScoredReference>, IndexError> {
        if let Some(entry) = self.entries.first() {
            if entry.vector.len() != vector.len() {
                return Err(IndexError::DimensionMismatch {
                    got: vector.len(),
                    expected: entry.vector.len(),
                });
            }
        }

        let mut scored: Vec<ScoredReference> = self
            .entries
            .iter()
            .map(|entry| ScoredReference {
                similarity: cosine_similarity(vector, &entry.vector),
                entry: entry.clone(),
            })
            .collect();

        // Descending similarity; ties broken by id so results are stable.
        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.entry.id.cmp(&b.entry.id))
        });
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: &str, vector: Vec<f32>) -> ReferenceEntry {
        ReferenceEntry {
            id: id.to_string(),
            label: format!("label_{id}"),
            category: "infrastructure".to_string(),
            severity: Severity::High,
            vector,
        }
    }

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.5, 0.5, 0.0, 0.7071];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn search_returns_most_similar_first() {
        let mut index = MemoryVectorIndex::new();
        index.insert(entry("exact", vec![1.0, 0.0]));
        index.insert(entry("close", vec![0.9, 0.1]));
        index.insert(entry("far", vec![0.0, 1.0]));

        let results = index.search(&[1.0, 0.0], 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].entry.id, "exact");
        assert_eq!(results[1].entry.id, "close");
        assert!(results[0].similarity > results[1].similarity);
    }

    #[tokio::test]
    async fn insert_with_same_id_replaces() {
        let mut index = MemoryVectorIndex::new();
        index.insert(entry("a", vec![1.0, 0.0]));
        index.insert(entry("a", vec![0.0, 1.0]));
        assert_eq!(index.len(), 1);

        let results = index.search(&[0.0, 1.0], 1).await.unwrap();
        assert!((results[0].similarity - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn remove_deletes_entry() {
        let mut index = MemoryVectorIndex::new();
        index.insert(entry("a", vec![1.0, 0.0]));
        assert!(index.remove("a"));
        assert!(!index.remove("a"));
        assert!(index.is_empty());
    }

    #[tokio::test]
    async fn dimension_mismatch_is_an_error() {
        let mut index = MemoryVectorIndex::new();
        index.insert(entry("a", vec![1.0, 0.0, 0.0]));
        let err = index.search(&[1.0, 0.0], 1).await.unwrap_err();
        assert!(matches!(err, IndexError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn empty_index_returns_no_results() {
        let index = MemoryVectorIndex::new();
        let results = index.search(&[1.0, 0.0], 5).await.unwrap();
        assert!(results.is_empty());
    }
}
