//! Snapshot publication of compiled pattern sets.
//!
//! Readers take an `Arc<PatternSet>` at call entry and keep it for the whole
//! request; reloads swap the published reference without touching live sets.

use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::loader::{load_pattern_file, load_pattern_set, PatternLoadError};
use crate::schema::PatternSet;

/// Publishes the active [`PatternSet`] and swaps it atomically on reload.
pub struct PatternProvider {
    current: RwLock<Arc<PatternSet>>,
    /// Source file, if the set was loaded from disk.
    source: Option<PathBuf>,
}

impl PatternProvider {
    /// Provider over the built-in catalogue.
    pub fn builtin() -> Result<Self, PatternLoadError> {
        let set = load_pattern_set(crate::builtin::default_pattern_file())?;
        Ok(Self {
            current: RwLock::new(Arc::new(set)),
            source: None,
        })
    }

    /// Provider over a pattern file on disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PatternLoadError> {
        let path = path.as_ref();
        let set = load_pattern_file(path)?;
        Ok(Self {
            current: RwLock::new(Arc::new(set)),
            source: Some(path.to_path_buf()),
        })
    }

    /// Provider over an already-compiled set (used in tests).
    pub fn from_set(set: PatternSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(set)),
            source: None,
        }
    }

    /// The current snapshot. Cheap; clones an `Arc`.
    pub fn snapshot(&self) -> Arc<PatternSet> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Re-read the source file and swap the published set.
    ///
    /// On any load error the previous set stays published untouched.
    pub fn reload(&self) -> Result<(), PatternLoadError> {
        let new_set = match &self.source {
            Some(path) => load_pattern_file(path)?,
            None => load_pattern_set(crate::builtin::default_pattern_file())?,
        };
        let count = new_set.len();
        self.swap(new_set);
        info!(patterns = count, "pattern set reloaded");
        Ok(())
    }

    /// Publish `set`, replacing the previous snapshot.
    pub fn swap(&self, set: PatternSet) {
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(set);
    }
}
