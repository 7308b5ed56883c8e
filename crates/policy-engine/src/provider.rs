//! Registry of active policies with atomic snapshot swap.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::evaluator::PolicyEngine;
use crate::loader::{load_policy, PolicyLoadError};
use crate::schema::Policy;

/// Errors raised when resolving a policy.
#[derive(Debug, thiserror::Error)]
pub enum PolicyLookupError {
    #[error("policy not found: {0}")]
    NotFound(String),
}

/// Immutable registry snapshot: policy id -> compiled engine.
type Registry = HashMap<String, Arc<PolicyEngine>>;

/// Publishes compiled policies and swaps the whole registry atomically on
/// reload.
///
/// Readers resolve an `Arc<PolicyEngine>` at call entry and keep it for the
/// duration of the request; a concurrent reload never mutates an engine a
/// reader already holds.
#[derive(Debug)]
pub struct PolicyProvider {
    current: RwLock<Arc<Registry>>,
    /// Source files, if the registry was loaded from disk.
    sources: Vec<PathBuf>,
}

impl PolicyProvider {
    /// Build a provider from in-memory policies (used in tests and by
    /// embedding callers).
    pub fn from_policies(policies: Vec<Policy>) -> Result<Self, PolicyLoadError> {
        let registry = compile(policies)?;
        Ok(Self {
            current: RwLock::new(Arc::new(registry)),
            sources: Vec::new(),
        })
    }

    /// Build a provider from one policy file per path.
    pub fn from_files<P: AsRef<Path>>(paths: &[P]) -> Result<Self, PolicyLoadError> {
        let policies = paths
            .iter()
            .map(|p| load_policy(p))
            .collect::<Result<Vec<_>, _>>()?;
        let registry = compile(policies)?;
        Ok(Self {
            current: RwLock::new(Arc::new(registry)),
            sources: paths.iter().map(|p| p.as_ref().to_path_buf()).collect(),
        })
    }

    /// Resolve the engine for `policy_id`.
    pub fn get(&self, policy_id: &str) -> Result<Arc<PolicyEngine>, PolicyLookupError> {
        self.registry()
            .get(policy_id)
            .cloned()
            .ok_or_else(|| PolicyLookupError::NotFound(policy_id.to_string()))
    }

    /// The active version for `policy_id`, if the policy exists.
    pub fn active_version(&self, policy_id: &str) -> Option<u64> {
        self.registry().get(policy_id).map(|e| e.policy().version)
    }

    /// All registered policy ids, sorted.
    pub fn policy_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.registry().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Re-read the source files and swap the registry.
    ///
    /// A reload that lowers the version of an existing policy id is
    /// rejected, and any error leaves the previous registry published.
    pub fn reload(&self) -> Result<(), PolicyLoadError> {
        let policies = self
            .sources
            .iter()
            .map(load_policy)
            .collect::<Result<Vec<_>, _>>()?;

        let previous = self.registry();
        for policy in &policies {
            if let Some(existing) = previous.get(&policy.policy_id) {
                if policy.version < existing.policy().version {
                    return Err(PolicyLoadError::Invalid {
                        policy_id: policy.policy_id.clone(),
                        reason: format!(
                            "version went backwards: {} -> {}",
                            existing.policy().version,
                            policy.version
                        ),
                    });
                }
            }
        }

        let registry = compile(policies)?;
        let count = registry.len();
        let mut guard = self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = Arc::new(registry);
        info!(policies = count, "policy registry reloaded");
        Ok(())
    }

    fn registry(&self) -> Arc<Registry> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

fn compile(policies: Vec<Policy>) -> Result<Registry, PolicyLoadError> {
    let mut registry = Registry::with_capacity(policies.len());
    for policy in policies {
        let id = policy.policy_id.clone();
        if registry
            .insert(id.clone(), Arc::new(PolicyEngine::new(policy)?))
            .is_some()
        {
            return Err(PolicyLoadError::Invalid {
                policy_id: id,
                reason: "duplicate policy_id across policy files".to_string(),
            });
        }
    }
    Ok(registry)
}
