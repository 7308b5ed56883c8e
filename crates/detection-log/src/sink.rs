use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::record::DetectionRecord;
use crate::writer::RecordWriter;

/// Channel buffer size used between producers and the background writer task.
const CHANNEL_BUFFER: usize = 1024;

/// Flush the writer at most every this many seconds when the channel is idle.
const FLUSH_INTERVAL_SECS: u64 = 1;

/// A cheap, cloneable handle used to submit [`DetectionRecord`] values into
/// the background decision-log writer.
///
/// `DetectionSink` is `Clone + Send + Sync` so it can be shared freely
/// across tasks and pipeline instances. [`publish`](Self::publish) never
/// waits: the validation path must not stall on log I/O, so a saturated
/// channel drops the record and bumps [`dropped`](Self::dropped).
#[derive(Clone)]
pub struct DetectionSink {
    tx: mpsc::Sender<DetectionRecord>,
    dropped: Arc<AtomicU64>,
}

impl DetectionSink {
    /// Spawn the background writer task and return a `(sink, join_handle)`
    /// pair.
    ///
    /// The writer opens (or creates) the file at `path` in append mode and
    /// begins draining records from the internal channel. The background
    /// task will:
    ///
    /// * Write each record as a JSON line via [`RecordWriter`].
    /// * Flush periodically (every ~1 second of channel inactivity).
    /// * Flush once more when the last `DetectionSink` clone is dropped and
    ///   the channel closes, then exit cleanly.
    ///
    /// # Panics
    ///
    /// The background task will **not** panic. I/O errors are logged via
    /// `tracing::error` and the record is skipped.
    pub async fn start(
        path: impl AsRef<Path>,
    ) -> Result<(Self, JoinHandle<()>), crate::writer::RecordWriteError> {
        let (tx, rx) = mpsc::channel::<DetectionRecord>(CHANNEL_BUFFER);

        let mut writer = RecordWriter::new(path).await?;

        let handle = tokio::spawn(async move {
            run_writer_loop(&mut writer, rx).await;
        });

        Ok((
            Self {
                tx,
                dropped: Arc::new(AtomicU64::new(0)),
            },
            handle,
        ))
    }

    /// Submit a record without waiting.
    ///
    /// If the channel is full or the background task has already exited the
    /// record is dropped, the drop counter incremented, and a warning
    /// logged. Returns whether the record was accepted.
    pub fn publish(&self, record: DetectionRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    request_id = %record.request_id,
                    "detection sink saturated; record dropped"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(record)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(
                    request_id = %record.request_id,
                    "detection sink channel closed; record dropped"
                );
                false
            }
        }
    }

    /// Number of records dropped due to saturation or a closed channel.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Core loop executed inside the background task.
///
/// Reads records from the channel and writes them to the decision log. When
/// the channel has no records ready for [`FLUSH_INTERVAL_SECS`] the writer
/// is flushed. On channel close a final flush is performed.
async fn run_writer_loop(writer: &mut RecordWriter, mut rx: mpsc::Receiver<DetectionRecord>) {
    let flush_interval = tokio::time::Duration::from_secs(FLUSH_INTERVAL_SECS);
    let mut dirty = false;

    loop {
        // Wait for the next record, but time out so we can periodically flush.
        let maybe_record = tokio::time::timeout(flush_interval, rx.recv()).await;

        match maybe_record {
            // Received a record before the timeout.
            Ok(Some(record)) => {
                if let Err(err) = writer.write(&record).await {
                    tracing::error!(%err, "failed to write decision record");
                } else {
                    dirty = true;
                }
            }
            // Channel closed: perform final flush and exit.
            Ok(None) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "failed to flush decision log on shutdown");
                    }
                }
                tracing::debug!("decision log background task shutting down");
                return;
            }
            // Timeout: flush if we have outstanding writes.
            Err(_) => {
                if dirty {
                    if let Err(err) = writer.flush().await {
                        tracing::error!(%err, "periodic decision log flush failed");
                    } else {
                        dirty = false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use firewall_types::{ValidationResult, Verdict};
    use std::time::Duration;

    fn record() -> DetectionRecord {
        let result = ValidationResult {
            request_id: uuid::Uuid::new_v4(),
            prompt_fingerprint: "fp".to_string(),
            verdict: Verdict::allowed("Prompt is safe", Vec::new()),
            policy_id: "default".to_string(),
            policy_version: 1,
            latency: Duration::from_millis(3),
            cached: false,
            timestamp: chrono::Utc::now(),
            degraded_detectors: Vec::new(),
            truncated: false,
        };
        DetectionRecord::from_result(&result, None)
    }

    #[tokio::test]
    async fn records_reach_the_file_as_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.jsonl");

        let (sink, handle) = DetectionSink::start(&path).await.unwrap();
        assert!(sink.publish(record()));
        assert!(sink.publish(record()));
        drop(sink);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: DetectionRecord = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.policy_id, "default");
        }
    }

    #[tokio::test]
    async fn clones_share_the_channel() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.jsonl");

        let (sink, handle) = DetectionSink::start(&path).await.unwrap();
        let publisher = sink.clone();
        drop(sink);
        // The clone keeps the channel open and publishing keeps working.
        assert!(publisher.publish(record()));
        drop(publisher);
        handle.await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }

    #[tokio::test]
    async fn saturation_drops_and_counts() {
        // A sink whose background task is never scheduled to drain: fill the
        // channel synchronously beyond its buffer.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("decisions.jsonl");
        let (sink, _handle) = DetectionSink::start(&path).await.unwrap();

        let mut accepted = 0u64;
        let mut refused = 0u64;
        for _ in 0..(CHANNEL_BUFFER as u64 + 64) {
            if sink.publish(record()) {
                accepted += 1;
            } else {
                refused += 1;
            }
        }
        // Everything beyond the buffer (minus whatever the writer drained)
        // was refused and counted, and publish never blocked.
        assert!(accepted >= CHANNEL_BUFFER as u64);
        assert_eq!(sink.dropped(), refused);
    }
}
