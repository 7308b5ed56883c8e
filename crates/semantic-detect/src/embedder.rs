//! Text embedding interface and the built-in hashing embedder.

use async_trait::async_trait;

/// Errors raised by an embedding backend.
#[derive(Debug, thiserror::Error)]
pub enum EmbedError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("embedding failed: {0}")]
    Backend(String),
}

/// Produces a fixed-dimensional vector for a piece of text.
///
/// Implementations may be slow (remote models); callers wrap invocations in
/// their own deadline.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed `text` into a vector of exactly [`dimension`](Self::dimension)
    /// components.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;

    /// Number of components every returned vector has.
    fn dimension(&self) -> usize;
}

// ---------------------------------------------------------------------------
// HashEmbedder
// ---------------------------------------------------------------------------

/// Deterministic model-free embedder: lowercased word shingles hashed into a
/// fixed number of buckets, L2-normalized.
///
/// Close paraphrases share most of their shingles and land near each other;
/// that is enough for exact-duplicate and near-duplicate reference matching,
/// for tests, and for air-gapped deployments. Model-backed embedders
/// implement the same trait.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub const DEFAULT_DIMENSION: usize = 256;

    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    /// Lowercase and strip everything except alphanumerics, collapsing runs
    /// of other characters to single spaces.
    fn normalize(text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut last_space = true;
        for ch in text.chars() {
            if ch.is_alphanumeric() {
                out.extend(ch.to_lowercase());
                last_space = false;
            } else if !last_space {
                out.push(' ');
                last_space = true;
            }
        }
        out.trim_end().to_string()
    }

    /// FNV-1a over the shingle bytes; stable across platforms and runs.
    fn bucket(&self, shingle: &str) -> usize {
        const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
        const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

        let mut hash = FNV_OFFSET;
        for byte in shingle.as_bytes() {
            hash ^= u64::from(*byte);
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        (hash % self.dimension as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSION)
    }
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let normalized = Self::normalize(text);
        let words: Vec<&str> = normalized.split(' ').filter(|w| !w.is_empty()).collect();

        let mut vector = vec![0f32; self.dimension];

        // Unigrams plus word bigrams; bigrams preserve some ordering signal.
        for word in &words {
            vector[self.bucket(word)] += 1.0;
        }
        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            vector[self.bucket(&bigram)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
