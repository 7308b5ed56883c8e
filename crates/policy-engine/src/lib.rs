//! # policy-engine
//!
//! Decision logic of the promptgate prompt firewall.  This crate loads YAML
//! policy documents, pre-compiles their denylist patterns, and maps a
//! finding set onto a final verdict under a tiered action precedence
//! (`block > warn > log > allow`).
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use policy_engine::{loader, PolicyEngine};
//!
//! let policy = loader::load_policy("policy.yaml").unwrap();
//! let engine = PolicyEngine::new(policy).unwrap();
//! let verdict = engine.evaluate("prompt text", vec![]);
//! println!("{:?}", verdict.status);
//! ```

mod evaluator;
pub mod loader;
mod provider;
mod schema;

// Re-export primary public API at crate root.
pub use evaluator::PolicyEngine;
pub use loader::{load_policy, load_policy_from_str, PolicyLoadError};
pub use provider::{PolicyLookupError, PolicyProvider};
pub use schema::{Allowlist, Denylist, Policy, Rule, RuleAction, RuleMatch};
