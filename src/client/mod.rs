//! Boundary to the remote log service.
//!
//! [`LogsApi`] is the only seam the retrievers talk through. It carries raw,
//! loosely structured payloads ([`QueryRow`], [`RawEvent`]); turning those into
//! [`LogRecord`](crate::retrieval::LogRecord)s is the retrievers' job.
//!
//! Window bounds cross this boundary as plain epoch numbers. The caller picks
//! the unit, so the inputs below say nothing about seconds or milliseconds.

use std::fmt;

use async_trait::async_trait;

use crate::retrieval::{Cursor, QueryStatus};

pub mod cloudwatch;

pub use cloudwatch::CloudWatchLogsApi;

/// One `{field, value}` pair of an analytic query result row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultField {
    pub field: Option<String>,
    pub value: Option<String>,
}

impl ResultField {
    pub fn new(field: &str, value: &str) -> Self {
        Self {
            field: Some(field.to_string()),
            value: Some(value.to_string()),
        }
    }
}

/// Positional result row as returned by the query API.
pub type QueryRow = Vec<ResultField>;

/// A raw event returned by the scan API.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawEvent {
    /// Milliseconds since the epoch.
    pub timestamp: Option<i64>,
    pub message: Option<String>,
}

/// One page of scan results.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    pub events: Vec<RawEvent>,
    pub next_cursor: Option<Cursor>,
}

/// Parameters for starting an analytic query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StartQueryInput {
    pub log_group: String,
    pub start_time: i64,
    pub end_time: i64,
    pub query_string: String,
    pub limit: Option<u32>,
}

/// Parameters for fetching one scan page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInput {
    pub log_group: String,
    pub start_time: i64,
    pub end_time: i64,
    pub cursor: Option<Cursor>,
}

/// Failure reported by the remote service or the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub message: String,
}

impl ApiError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ApiError {}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Remote log-query service.
#[async_trait]
pub trait LogsApi: Send + Sync {
    /// Submit an analytic query and return its job id.
    async fn start_query(&self, input: &StartQueryInput) -> ApiResult<String>;

    /// Current status of a submitted query.
    async fn query_status(&self, job_id: &str) -> ApiResult<QueryStatus>;

    /// Result rows of a completed query.
    async fn query_results(&self, job_id: &str) -> ApiResult<Vec<QueryRow>>;

    /// Ask the service to stop a running query.
    async fn stop_query(&self, job_id: &str) -> ApiResult<()>;

    /// Fetch one page of raw events.
    async fn scan_events(&self, input: &ScanInput) -> ApiResult<ScanPage>;
}
