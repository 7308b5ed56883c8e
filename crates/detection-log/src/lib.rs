//! Append-only structured JSON-lines decision logging for the promptgate
//! prompt firewall.
//!
//! Every validation decision, together with summaries of its findings, is
//! serialised as a single newline-terminated JSON object and appended to a
//! log file, producing a [JSON Lines](https://jsonlines.org/) stream that is
//! easy to ship, parse, and replay.
//!
//! Publication is strictly non-blocking: [`DetectionSink::publish`] hands
//! the record to a bounded channel and returns immediately; when the channel
//! is saturated the record is dropped and counted rather than stalling the
//! validation path.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use detection_log::DetectionSink;
//!
//! # async fn example(result: &firewall_types::ValidationResult) -> Result<(), Box<dyn std::error::Error>> {
//! let (sink, _handle) = DetectionSink::start("/var/log/promptgate/decisions.jsonl").await?;
//! sink.publish(detection_log::DetectionRecord::from_result(result, None));
//! # Ok(())
//! # }
//! ```

pub mod record;
pub mod sink;
pub mod writer;

// Re-export primary public types at the crate root for convenience.
pub use record::{DetectionRecord, FindingSummary};
pub use sink::DetectionSink;
pub use writer::{RecordWriteError, RecordWriter};
