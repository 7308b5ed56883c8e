//! # detector-pipeline
//!
//! End-to-end orchestration of a single validation call for the promptgate
//! prompt firewall: cache lookup, concurrent detector fan-out under a shared
//! deadline, finding merge, policy evaluation, best-effort cache population,
//! and non-blocking sink publication.
//!
//! Detectors plug in through the minimal [`Detector`](detect::Detector)
//! contract; the pipeline never needs to know what kind of detector it is
//! running. Failures below the pipeline degrade the affected detector or
//! tier, they never fail the request: the only error-shaped outputs are
//! `status = error` results for invalid input or an unknown policy.

pub mod detect;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod stats;

pub use detect::{DetectContext, Detector, DetectorOutcome, PatternDetectorAdapter, SemanticDetectorAdapter};
pub use error::FirewallError;
pub use pipeline::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
