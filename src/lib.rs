//! cwlogs-export library
//!
//! Core of the `cwlogs-export` tool: pulls log events out of a CloudWatch Logs
//! group for a time window and streams them into a CSV file.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `client`: Remote log service abstraction and the CloudWatch Logs client
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Export pipeline (coordinator, sinks, progress)
//! - `retrieval`: Query and scan retrievers, record normalization
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cwlogs_export::client::CloudWatchLogsApi;
//! use cwlogs_export::config::Config;
//! use cwlogs_export::export::{ExportPlan, RetrievalMode, TimestampZone};
//! use cwlogs_export::retrieval::{MalformedRecordPolicy, TimeWindow, TokioClock};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let plan = ExportPlan {
//!         mode: RetrievalMode::Query { limit: Some(100) },
//!         log_group: "/app/api".to_string(),
//!         window: TimeWindow::parse_local("2024-01-01T00:00:00", "2024-01-01T01:00:00")?,
//!         output: "output.csv".to_string(),
//!         query: config.query_settings(),
//!         scan: config.scan_settings(),
//!         policy: MalformedRecordPolicy::Abort,
//!         timezone: TimestampZone::Local,
//!         progress: false,
//!     };
//!
//!     let api = CloudWatchLogsApi::connect(&config.aws).await;
//!     let result = plan
//!         .execute(Arc::new(api), Arc::new(TokioClock), CancellationToken::new())
//!         .await?;
//!     println!("Saved {} records to {}", result.records_exported, result.path);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod retrieval;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportError, Result};
pub use export::{ExportPlan, ExportResult, RetrievalMode};
pub use retrieval::{LogRecord, TimeWindow};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}
