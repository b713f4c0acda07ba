//! Export plans
//!
//! An [`ExportPlan`] is everything one run needs once arguments and
//! configuration are merged: which retrieval mode, which log group and window,
//! where the CSV goes, and how to treat bad records. Executing it wires a
//! retriever and a CSV sink into an [`ExportCoordinator`].

use std::sync::Arc;

use chrono::Local;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::client::LogsApi;
use crate::error::Result;
use crate::retrieval::{
    Clock, MalformedRecordPolicy, QueryRequest, QueryRetriever, QuerySettings, RecordSource,
    ScanRetriever, ScanSettings, TimeWindow,
};

use super::coordinator::{ExportCoordinator, ExportResult};
use super::progress::ProgressTracker;
use super::writers::{CsvSink, SinkMode, TimestampZone};

/// Default output file for query mode.
pub const DEFAULT_QUERY_OUTPUT: &str = "output.csv";

/// How records are pulled from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalMode {
    /// One asynchronous query, capped at `limit` rows.
    Query { limit: Option<u32> },
    /// Cursor-paginated scan of every event in the window.
    Scan,
}

impl RetrievalMode {
    /// Query output replaces the file; scan output is appended to it.
    pub fn sink_mode(&self) -> SinkMode {
        match self {
            RetrievalMode::Query { .. } => SinkMode::Overwrite,
            RetrievalMode::Scan => SinkMode::Append,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RetrievalMode::Query { .. } => "query",
            RetrievalMode::Scan => "scan",
        }
    }
}

/// A fully resolved export run.
#[derive(Debug, Clone)]
pub struct ExportPlan {
    pub mode: RetrievalMode,
    pub log_group: String,
    pub window: TimeWindow,
    pub output: String,
    pub query: QuerySettings,
    pub scan: ScanSettings,
    pub policy: MalformedRecordPolicy,
    pub timezone: TimestampZone,
    /// Show a spinner while exporting.
    pub progress: bool,
}

impl ExportPlan {
    /// Build the record source for this plan's mode.
    fn source(&self, api: Arc<dyn LogsApi>, clock: Arc<dyn Clock>) -> Box<dyn RecordSource> {
        match self.mode {
            RetrievalMode::Query { limit } => {
                let request = QueryRequest {
                    log_group: self.log_group.clone(),
                    window: self.window,
                    limit,
                };
                Box::new(QueryRetriever::new(
                    api,
                    clock,
                    request,
                    self.query.clone(),
                    self.policy,
                ))
            }
            RetrievalMode::Scan => Box::new(ScanRetriever::new(
                api,
                self.log_group.clone(),
                self.window,
                self.scan.clone(),
                self.policy,
            )),
        }
    }

    /// Run the export to completion.
    ///
    /// # Arguments
    /// * `api` - Service client
    /// * `clock` - Time source for the query poll loop
    /// * `cancel` - Stops the run between batches when triggered
    ///
    /// # Returns
    /// * `Result<ExportResult>` - Export statistics or the first error
    pub async fn execute(
        self,
        api: Arc<dyn LogsApi>,
        clock: Arc<dyn Clock>,
        cancel: CancellationToken,
    ) -> Result<ExportResult> {
        info!(
            mode = self.mode.name(),
            log_group = %self.log_group,
            window = %self.window,
            output = %self.output,
            "starting export"
        );

        let sink = CsvSink::open(&self.output, self.mode.sink_mode(), self.timezone).await?;
        let source = self.source(api, clock);
        let tracker = ProgressTracker::new(self.progress);

        let mut coordinator =
            ExportCoordinator::new(source, tracker, Box::new(sink)).with_cancellation(cancel);
        coordinator.execute().await
    }
}

/// Generate a timestamped default file name for scan mode.
pub fn default_scan_filename() -> String {
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    format!("logs-{}.csv", timestamp)
}
