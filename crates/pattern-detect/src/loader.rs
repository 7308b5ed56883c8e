//! Pattern file loading and compilation.
//!
//! A malformed regex anywhere in the file refuses the whole set: a firewall
//! silently missing one of its patterns is worse than one that fails to
//! start.

use std::collections::HashSet;
use std::path::Path;

use tracing::info;

use crate::schema::{CompiledPattern, PatternFile, PatternSet};

/// Errors raised while loading or compiling a pattern set.
#[derive(Debug, thiserror::Error)]
pub enum PatternLoadError {
    #[error("failed to read pattern file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse pattern file: {0}")]
    Parse(#[from] serde_yml::Error),

    #[error("pattern '{category}/{name}' has an invalid regex: {source}")]
    InvalidRegex {
        category: String,
        name: String,
        source: regex::Error,
    },

    #[error("duplicate pattern name '{name}' in category '{category}'")]
    DuplicateName { category: String, name: String },

    #[error("pattern with empty name in category '{category}'")]
    EmptyName { category: String },
}

/// Load and compile a pattern set from a YAML file on disk.
pub fn load_pattern_file(path: impl AsRef<Path>) -> Result<PatternSet, PatternLoadError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| PatternLoadError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file: PatternFile = serde_yml::from_str(&contents)?;
    load_pattern_set(file)
}

/// Compile an in-memory [`PatternFile`] into a [`PatternSet`].
///
/// This is the primary entry point used in tests and by the built-in
/// catalogue.
pub fn load_pattern_set(file: PatternFile) -> Result<PatternSet, PatternLoadError> {
    let mut patterns = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (category, defs) in &file.patterns {
        for def in defs {
            if def.name.is_empty() {
                return Err(PatternLoadError::EmptyName {
                    category: category.clone(),
                });
            }
            if !seen.insert((category.clone(), def.name.clone())) {
                return Err(PatternLoadError::DuplicateName {
                    category: category.clone(),
                    name: def.name.clone(),
                });
            }

            let regex = regex::Regex::new(&def.regex).map_err(|source| {
                PatternLoadError::InvalidRegex {
                    category: category.clone(),
                    name: def.name.clone(),
                    source,
                }
            })?;

            patterns.push(CompiledPattern {
                name: def.name.clone(),
                category: category.clone(),
                regex,
                severity: def.severity,
                description: def.description.clone(),
                validator: def.validator,
                context_terms: def
                    .context_terms
                    .iter()
                    .map(|t| t.to_lowercase())
                    .collect(),
            });
        }
    }

    info!(
        categories = file.patterns.len(),
        total_patterns = patterns.len(),
        contextual = file.contextual_patterns.len(),
        "pattern set compiled"
    );

    Ok(PatternSet {
        patterns,
        contextual: file.contextual_patterns,
    })
}
