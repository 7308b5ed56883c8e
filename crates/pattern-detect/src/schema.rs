//! Pattern file schema and the compiled pattern set.
//!
//! The YAML file maps categories to lists of pattern definitions:
//!
//! ```yaml
//! patterns:
//!   api_keys:
//!     - name: openai_api_key
//!       regex: 'sk-[A-Za-z0-9]{32,}'
//!       severity: critical
//!       description: "OpenAI API Key"
//! contextual_patterns:
//!   - trigger: "my password is"
//!     severity: high
//! ```

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use firewall_types::Severity;

// ---------------------------------------------------------------------------
// File shapes
// ---------------------------------------------------------------------------

/// Top-level pattern file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternFile {
    /// Category name -> pattern definitions in that category.
    #[serde(default)]
    pub patterns: BTreeMap<String, Vec<PatternDef>>,
    /// Plain trigger phrases emitted as lower-confidence contextual findings.
    #[serde(default)]
    pub contextual_patterns: Vec<ContextualPattern>,
}

/// A single pattern definition as it appears in the YAML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternDef {
    /// Unique within its category; used in logs and findings.
    pub name: String,
    /// Regex source; compiled once at load time.
    pub regex: String,
    pub severity: Severity,
    #[serde(default)]
    pub description: Option<String>,
    /// Content validator applied to each candidate match.
    #[serde(default)]
    pub validator: PatternValidator,
    /// If non-empty, at least one term must occur near the match.
    #[serde(default)]
    pub context_terms: Vec<String>,
}

/// Content-aware validation applied to a candidate match before it becomes a
/// finding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternValidator {
    /// No extra validation.
    #[default]
    None,
    /// The digits of the match must pass the Luhn checksum.
    Luhn,
    /// The match must carry both a `-----BEGIN ...-----` header and a
    /// `-----END ...-----` footer.
    KeyFence,
}

/// A contextual trigger phrase (matched case-insensitively as a substring).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextualPattern {
    pub trigger: String,
    pub severity: Severity,
}

// ---------------------------------------------------------------------------
// Compiled set
// ---------------------------------------------------------------------------

/// A pattern definition with its regex compiled, ready for scanning.
#[derive(Debug)]
pub struct CompiledPattern {
    pub name: String,
    pub category: String,
    pub regex: Regex,
    pub severity: Severity,
    pub description: Option<String>,
    pub validator: PatternValidator,
    /// Lowercased at compile time so the scan only lowercases the window.
    pub context_terms: Vec<String>,
}

/// The immutable, compiled form of a pattern file.
///
/// A `PatternSet` is built once by the loader and shared via `Arc`; it is
/// never mutated after construction.
#[derive(Debug, Default)]
pub struct PatternSet {
    pub patterns: Vec<CompiledPattern>,
    pub contextual: Vec<ContextualPattern>,
}

impl PatternSet {
    /// Total number of compiled regex patterns.
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty() && self.contextual.is_empty()
    }

    /// Distinct category names, sorted.
    pub fn categories(&self) -> Vec<String> {
        let mut cats: Vec<String> = self
            .patterns
            .iter()
            .map(|p| p.category.clone())
            .collect();
        cats.sort();
        cats.dedup();
        cats
    }
}
