//! Export coordinator for orchestrating export operations
//!
//! Pulls batches from a [`RecordSource`] and hands each one to a
//! [`RecordSink`] as soon as it arrives. Nothing is rolled back on failure:
//! batches already written stay in the output file.

use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::retrieval::RecordSource;

use super::progress::ProgressTracker;
use super::writers::RecordSink;

/// Result of an export operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    /// Destination file
    pub path: String,
    /// Number of records written
    pub records_exported: u64,
    /// Number of malformed records dropped
    pub records_skipped: u64,
    /// Number of batches received from the source
    pub batches: u64,
    /// File size in bytes
    pub file_size_bytes: u64,
    /// Time taken for export
    pub elapsed_ms: u64,
    /// Whether the export was cancelled
    pub cancelled: bool,
}

/// Coordinator for export operations
pub struct ExportCoordinator {
    /// Source of normalized record batches
    source: Box<dyn RecordSource>,
    /// Progress tracker for user feedback
    tracker: ProgressTracker,
    /// Output sink
    sink: Box<dyn RecordSink>,
    /// Cancellation token for aborting export
    cancel_token: Option<CancellationToken>,
}

/// Counters shared between the pump loop and the final report.
#[derive(Debug, Default)]
struct Progress {
    exported: u64,
    batches: u64,
}

impl ExportCoordinator {
    /// Create a new export coordinator
    pub fn new(
        source: Box<dyn RecordSource>,
        tracker: ProgressTracker,
        sink: Box<dyn RecordSink>,
    ) -> Self {
        Self {
            source,
            tracker,
            sink,
            cancel_token: None,
        }
    }

    /// Set cancellation token for this export operation
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /// Execute the export operation
    ///
    /// 1. Pull batches until the source is exhausted (or the run is cancelled)
    /// 2. Write the header before the first batch (or on cancellation), then
    ///    every batch in order
    /// 3. Finalize the sink and close the source on every exit path
    ///
    /// # Returns
    /// * `Result<ExportResult>` - Export statistics or the first error
    pub async fn execute(&mut self) -> Result<ExportResult> {
        let start_time = Instant::now();
        info!(path = self.sink.path(), "Starting export operation");

        let mut progress = Progress::default();
        let outcome = self.pump(&mut progress).await;

        let cancelled = match outcome {
            Ok(cancelled) => cancelled,
            Err(e) => {
                let _ = self.sink.finalize().await;
                let _ = self.source.close().await;
                self.tracker.finish();
                if progress.exported > 0 {
                    warn!(
                        path = self.sink.path(),
                        records = progress.exported,
                        "export aborted; the file holds a partial export"
                    );
                }
                return Err(e);
            }
        };

        debug!("Finalizing output file");
        self.sink.finalize().await?;
        self.source.close().await?;
        self.tracker.finish();

        let elapsed_ms = start_time.elapsed().as_millis() as u64;
        let file_size_bytes = self.sink.file_size().await?;

        info!(
            "Export {}: {} records, {} bytes, {} ms",
            if cancelled { "cancelled" } else { "completed" },
            progress.exported,
            file_size_bytes,
            elapsed_ms
        );

        Ok(ExportResult {
            path: self.sink.path().to_string(),
            records_exported: progress.exported,
            records_skipped: self.source.skipped(),
            batches: progress.batches,
            file_size_bytes,
            elapsed_ms,
            cancelled,
        })
    }

    /// Stream batches into the sink. Returns whether the run was cancelled.
    async fn pump(&mut self, progress: &mut Progress) -> Result<bool> {
        let token = self.cancel_token.clone().unwrap_or_default();
        let mut header_pending = true;

        loop {
            debug!("Fetching batch #{}", progress.batches + 1);

            let next = tokio::select! {
                biased;
                _ = token.cancelled() => {
                    info!("Export operation cancelled by user");
                    // A cancelled overwrite still leaves a well-formed file.
                    if header_pending {
                        self.sink.write_header().await?;
                    }
                    return Ok(true);
                }
                batch = self.source.next_batch() => batch?,
            };

            let Some(records) = next else {
                debug!("No more records available");
                return Ok(false);
            };

            if header_pending {
                self.sink.write_header().await?;
                header_pending = false;
            }

            self.sink.write_records(&records).await?;

            progress.exported += records.len() as u64;
            progress.batches += 1;
            self.tracker.update(progress.exported);

            if progress.batches % 10 == 0 {
                info!(
                    "Progress: {} records exported ({} batches)",
                    progress.exported, progress.batches
                );
            }
        }
    }
}
