use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Fallback policy identifier when a request does not name one.
pub const DEFAULT_POLICY_ID: &str = "default";

/// A single prompt submitted for validation.
///
/// The prompt text itself is transient: it is hashed for caching and only the
/// detection sink may persist it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidateRequest {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub policy_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub context: BTreeMap<String, String>,
}

impl ValidateRequest {
    /// Build a request for `prompt` with no user, policy, or context.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            user_id: None,
            policy_id: None,
            context: BTreeMap::new(),
        }
    }

    /// Select a policy explicitly.
    pub fn with_policy(mut self, policy_id: impl Into<String>) -> Self {
        self.policy_id = Some(policy_id.into());
        self
    }

    /// The policy id to resolve, falling back to [`DEFAULT_POLICY_ID`].
    pub fn effective_policy_id(&self) -> &str {
        self.policy_id.as_deref().unwrap_or(DEFAULT_POLICY_ID)
    }
}
