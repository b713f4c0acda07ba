//! Retrieval engine
//!
//! Two retrievers share one shape: issue a request, iterate until the service
//! reports exhaustion, hand normalized batches to the caller.
//!
//! - [`QueryRetriever`]: submits an asynchronous analytic query, polls it to a
//!   terminal state and yields the whole result set as a single batch.
//! - [`ScanRetriever`]: walks cursor-linked pages and yields one batch per page.
//!
//! Both implement [`RecordSource`], the pull interface the export coordinator
//! drives.

use async_trait::async_trait;

use crate::error::Result;

pub mod clock;
pub mod normalize;
pub mod query;
pub mod scan;
pub mod types;

pub use clock::{Clock, TokioClock};
pub use normalize::MalformedRecordPolicy;
pub use query::{QueryRetriever, QuerySettings};
pub use scan::{ScanRetriever, ScanSettings};
pub use types::{
    Cursor, LogRecord, QueryJob, QueryRequest, QueryStatus, TimeResolution, TimeWindow,
};

/// Pull-based source of normalized record batches.
#[async_trait]
pub trait RecordSource: Send {
    /// Fetch the next batch of records.
    ///
    /// # Returns
    /// * `Result<Option<Vec<LogRecord>>>` - Next batch (possibly empty), or None if exhausted
    async fn next_batch(&mut self) -> Result<Option<Vec<LogRecord>>>;

    /// Release remote resources held by the source.
    async fn close(&mut self) -> Result<()>;

    /// Number of records dropped under [`MalformedRecordPolicy::Skip`].
    fn skipped(&self) -> u64;
}
