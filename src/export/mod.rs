//! Export pipeline
//!
//! Records flow from a retriever into a CSV file one batch at a time:
//!
//! 1. **RecordSource** (see [`crate::retrieval`]): yields normalized batches
//! 2. **ProgressTracker**: spinner with the running record count
//! 3. **RecordSink**: writes batches to the output file and flushes them
//!
//! The **ExportCoordinator** drives the three, and an **ExportPlan** builds the
//! right source and sink for a run.
//!
//! # Example
//!
//! ```no_run
//! # async fn demo(plan: cwlogs_export::export::ExportPlan) -> cwlogs_export::Result<()> {
//! use std::sync::Arc;
//!
//! use cwlogs_export::config::AwsConfig;
//! use cwlogs_export::client::CloudWatchLogsApi;
//! use cwlogs_export::retrieval::TokioClock;
//! use tokio_util::sync::CancellationToken;
//!
//! let api = CloudWatchLogsApi::connect(&AwsConfig::default()).await;
//! let result = plan
//!     .execute(Arc::new(api), Arc::new(TokioClock), CancellationToken::new())
//!     .await?;
//! println!("{} records written to {}", result.records_exported, result.path);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod plan;
pub mod progress;
pub mod writers;

pub use coordinator::{ExportCoordinator, ExportResult};
pub use plan::{DEFAULT_QUERY_OUTPUT, ExportPlan, RetrievalMode, default_scan_filename};
pub use progress::ProgressTracker;
pub use writers::{CsvSink, RecordSink, SinkMode, TimestampZone};
