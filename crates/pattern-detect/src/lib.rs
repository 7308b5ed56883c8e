//! # pattern-detect
//!
//! Deterministic detection layer of the promptgate prompt firewall.
//!
//! The crate is organised around four layers:
//!
//! 1. **[`schema`]** -- serde shapes for the YAML pattern file, plus the
//!    compiled [`PatternSet`](schema::PatternSet).
//! 2. **[`builtin`]** -- static catalogue of default patterns used when no
//!    pattern file is configured.
//! 3. **[`validator`]** -- content-aware match validators (Luhn checksum,
//!    private-key fencing).
//! 4. **[`detector`]** -- the [`RegexDetector`](detector::RegexDetector)
//!    which scans prompt text and produces findings.
//!
//! [`provider::PatternProvider`] publishes immutable pattern-set snapshots
//! and swaps them atomically on reload.

pub mod builtin;
pub mod detector;
pub mod loader;
pub mod provider;
pub mod schema;
pub mod validator;

pub use detector::RegexDetector;
pub use loader::{load_pattern_file, load_pattern_set, PatternLoadError};
pub use provider::PatternProvider;
pub use schema::{CompiledPattern, ContextualPattern, PatternSet, PatternValidator};
